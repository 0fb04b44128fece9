use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::UnknownStation;

/// Timestamp layout shared by every flat file: `Sun, 18 Oct 2026 10:53:00 -0500`.
pub const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

pub fn format_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceTag {
    Indoor,
    Outdoor,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Indoor => "INDOOR",
            Self::Outdoor => "OUTDOOR",
        }
    }
}

/// Measurement stations known to the feed producers. The tag is written as
/// the optional third field of a sensor feed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Station {
    Main,
    George,
    Mbr,
    Mdw,
}

impl Station {
    pub const ALL: [Station; 4] = [Self::Main, Self::George, Self::Mbr, Self::Mdw];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "MAIN",
            Self::George => "GEORGE",
            Self::Mbr => "MBR",
            Self::Mdw => "MDW",
        }
    }

    pub fn source(self) -> SourceTag {
        match self {
            Self::Main | Self::George | Self::Mbr => SourceTag::Indoor,
            Self::Mdw => SourceTag::Outdoor,
        }
    }

    /// Environment variable naming the feed file this station writes.
    pub fn env_key(self) -> &'static str {
        match self {
            Self::Main => crate::files::ENV_MAIN_FILE,
            Self::George => crate::files::ENV_GEORGE_FILE,
            Self::Mbr => crate::files::ENV_MBR_FILE,
            Self::Mdw => crate::files::ENV_MDW_FILE,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Station {
    type Err = UnknownStation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|station| station.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStation(s.trim().to_string()))
    }
}

/// One validated temperature observation. Built fresh from a feed file on
/// every tick and dropped after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub value_f: f32,
    pub observed_at: DateTime<FixedOffset>,
    pub source: SourceTag,
    pub station: Option<Station>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyState {
    pub home: bool,
}

/// Snapshot written to the state file once per tick, and once more with
/// `daemon_running == false` on shutdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "heatingOn")]
    pub heating_on: bool,
    #[serde(rename = "indoorTemp")]
    pub indoor_temp_f: Option<f32>,
    #[serde(rename = "outdoorTemp")]
    pub outdoor_temp_f: Option<f32>,
    #[serde(rename = "setpoint")]
    pub setpoint_f: f32,
    #[serde(rename = "daemonRunning")]
    pub daemon_running: bool,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<FixedOffset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_tags_map_to_sources() {
        assert_eq!(Station::Mdw.source(), SourceTag::Outdoor);
        for station in [Station::Main, Station::George, Station::Mbr] {
            assert_eq!(station.source(), SourceTag::Indoor);
        }
    }

    #[test]
    fn station_parse_is_case_insensitive_and_closed() {
        assert_eq!("mdw".parse::<Station>(), Ok(Station::Mdw));
        assert_eq!(" MAIN\n".parse::<Station>(), Ok(Station::Main));
        assert_eq!(
            "ORD".parse::<Station>(),
            Err(UnknownStation("ORD".to_string()))
        );
    }
}
