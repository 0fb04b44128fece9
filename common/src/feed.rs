//! Flat-file feeds exchanged with the data-collection processes.
//!
//! Every feed is a single line. Producers write a sibling `.tmp` file and
//! rename it over the destination, so a reader sees either the previous
//! record or the new one. Only the first line is ever read.

use std::{
    ffi::OsString,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, FixedOffset};

use crate::{
    error::FeedError,
    types::{format_timestamp, OccupancyState, SensorReading, SourceTag, Station, TIMESTAMP_FORMAT},
};

const HOME_PREFIX: &str = "Home: ";

/// Acceptance bounds applied to every temperature feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingLimits {
    pub min_valid_f: f32,
    pub max_valid_f: f32,
    pub expiration: Duration,
}

pub fn read_sensor_feed(
    path: &Path,
    source: SourceTag,
    now: &DateTime<FixedOffset>,
    limits: &ReadingLimits,
) -> Result<SensorReading, FeedError> {
    let line = read_first_line(path)?;
    parse_sensor_line(path, &line, source, now, limits)
}

/// Parses `<timestamp>\t<value>[\t<station>]`.
///
/// Age is the difference of the two local wall-clock times; the offsets are
/// not reconciled. A reading from the future therefore has a negative age and
/// is accepted.
pub fn parse_sensor_line(
    path: &Path,
    line: &str,
    source: SourceTag,
    now: &DateTime<FixedOffset>,
    limits: &ReadingLimits,
) -> Result<SensorReading, FeedError> {
    let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
    let (Some(raw_timestamp), Some(raw_value)) = (fields.next(), fields.next()) else {
        return Err(FeedError::Unavailable {
            path: path.to_path_buf(),
            reason: "expected at least two tab-separated fields".to_string(),
        });
    };

    let raw_timestamp = raw_timestamp.trim();
    let observed_at =
        DateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT).map_err(|err| {
            FeedError::Malformed {
                path: path.to_path_buf(),
                reason: format!("timestamp `{raw_timestamp}`: {err}"),
            }
        })?;

    let value_f = raw_value
        .trim()
        .parse::<f32>()
        .map_err(|err| FeedError::Malformed {
            path: path.to_path_buf(),
            reason: format!("value `{}`: {err}", raw_value.trim()),
        })?;

    // Unknown station tags are dropped rather than rejecting a good reading.
    let station = fields.next().and_then(|tag| tag.parse::<Station>().ok());

    let age = now.naive_local() - observed_at.naive_local();
    if age > limits.expiration {
        return Err(FeedError::Stale {
            path: path.to_path_buf(),
            age_secs: age.num_seconds(),
            limit_secs: limits.expiration.num_seconds(),
        });
    }

    if !(limits.min_valid_f..=limits.max_valid_f).contains(&value_f) {
        return Err(FeedError::OutOfRange {
            path: path.to_path_buf(),
            value: value_f,
            min: limits.min_valid_f,
            max: limits.max_valid_f,
        });
    }

    Ok(SensorReading {
        value_f,
        observed_at,
        source,
        station,
    })
}

/// Occupancy carries no freshness check; only its shape is validated.
pub fn read_occupancy(path: &Path) -> Result<OccupancyState, FeedError> {
    let line = read_first_line(path)?;
    parse_occupancy_line(path, &line)
}

pub fn parse_occupancy_line(path: &Path, line: &str) -> Result<OccupancyState, FeedError> {
    let malformed = |reason: String| FeedError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let field = line
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .nth(1)
        .ok_or_else(|| malformed("home status not found".to_string()))?
        .trim();

    let value = field
        .strip_prefix(HOME_PREFIX)
        .ok_or_else(|| malformed(format!("expected `{HOME_PREFIX}<True|False>`, got `{field}`")))?;

    match value {
        "True" => Ok(OccupancyState { home: true }),
        "False" => Ok(OccupancyState { home: false }),
        other => Err(malformed(format!("invalid home status `{other}`"))),
    }
}

pub fn sensor_line(
    value_f: f32,
    observed_at: &DateTime<FixedOffset>,
    station: Option<Station>,
) -> String {
    match station {
        Some(station) => format!(
            "{}\t{value_f:.1}\t{station}\n",
            format_timestamp(observed_at)
        ),
        None => format!("{}\t{value_f:.1}\n", format_timestamp(observed_at)),
    }
}

pub fn occupancy_line(state: OccupancyState, at: &DateTime<FixedOffset>) -> String {
    let value = if state.home { "True" } else { "False" };
    format!("{}\t{HOME_PREFIX}{value}\n", format_timestamp(at))
}

pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `line` to `<path>.tmp` and renames it over `path`. A leftover
/// temporary file is removed first; failure to remove it is ignored.
pub fn write_line_atomic(path: &Path, line: &str) -> io::Result<()> {
    let tmp = temp_path(path);
    let _ = std::fs::remove_file(&tmp);
    std::fs::write(&tmp, line)?;
    std::fs::rename(&tmp, path)
}

fn read_first_line(path: &Path) -> Result<String, FeedError> {
    let file = File::open(path).map_err(|err| FeedError::unavailable(path, &err))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|err| FeedError::unavailable(path, &err))?;

    if line.trim().is_empty() {
        return Err(FeedError::Unavailable {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(line)
}
