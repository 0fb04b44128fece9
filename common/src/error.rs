//! Error taxonomy shared by the daemon and the feed tools.

use std::{io, path::PathBuf};

use thiserror::Error;

/// A station tag outside the known set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown station tag `{0}`")]
pub struct UnknownStation(pub String);

/// Why a feed file could not produce a usable input on this tick.
///
/// The control loop turns every variant into an absent input, which the
/// controller resolves to heating off.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed {path} unavailable: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("feed {path} malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("feed {path} is stale: observed {age_secs}s ago (limit {limit_secs}s)")]
    Stale {
        path: PathBuf,
        age_secs: i64,
        limit_secs: i64,
    },

    #[error("feed {path} value {value}°F outside valid range [{min}, {max}]")]
    OutOfRange {
        path: PathBuf,
        value: f32,
        min: f32,
        max: f32,
    },
}

impl FeedError {
    pub fn unavailable(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Malformed { .. } => "malformed",
            Self::Stale { .. } => "stale",
            Self::OutOfRange { .. } => "out_of_range",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("setpoint {value}°F must lie within [{min}, {max}]")]
    SetpointOutOfRange { value: f32, min: f32, max: f32 },

    #[error("hysteresis {0}°F must be a finite, non-negative value")]
    InvalidHysteresis(f32),

    #[error("operating hours [{start}, {end}) must satisfy start < end <= 24")]
    InvalidHours { start: u32, end: u32 },

    #[error("invalid configuration: {what}")]
    Invalid { what: String },

    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),

    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay device {path} I/O failed")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("relay already released")]
    Released,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("status record is missing field `{0}`")]
    MissingField(&'static str),

    #[error("status record field `{field}` has invalid value `{value}`")]
    InvalidField { field: &'static str, value: String },
}
