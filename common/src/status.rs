//! The published state record.
//!
//! ```text
//! <timestamp>\tDaemon is: Running, Heating is: ON, Indoor temperature: 68.5°F, Outdoor temperature: N/A, Setpoint temperature: 70.0°F
//! ```
//!
//! The bridge matches this line with a fixed regular expression, so labels
//! and field order are frozen.

use std::{fmt, str::FromStr};

use chrono::DateTime;

use crate::{
    error::StatusParseError,
    types::{format_timestamp, ControllerStatus, TIMESTAMP_FORMAT},
};

const DAEMON_LABEL: &str = "Daemon is: ";
const HEATING_LABEL: &str = "Heating is: ";
const INDOOR_LABEL: &str = "Indoor temperature: ";
const OUTDOOR_LABEL: &str = "Outdoor temperature: ";
const SETPOINT_LABEL: &str = "Setpoint temperature: ";
const NOT_AVAILABLE: &str = "N/A";
const FAHRENHEIT: &str = "°F";

impl ControllerStatus {
    /// The full record including the trailing newline.
    pub fn to_record(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let daemon = if self.daemon_running { "Running" } else { "Stopped" };
        let heating = if self.heating_on { "ON" } else { "OFF" };
        write!(f, "{}\t", format_timestamp(&self.generated_at))?;
        write!(f, "{DAEMON_LABEL}{daemon}, {HEATING_LABEL}{heating}, ")?;
        write!(f, "{INDOOR_LABEL}{}, ", render_temp(self.indoor_temp_f))?;
        write!(f, "{OUTDOOR_LABEL}{}, ", render_temp(self.outdoor_temp_f))?;
        write!(f, "{SETPOINT_LABEL}{:.1}{FAHRENHEIT}", self.setpoint_f)
    }
}

fn render_temp(value: Option<f32>) -> String {
    match value {
        Some(value) => format!("{value:.1}{FAHRENHEIT}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

impl FromStr for ControllerStatus {
    type Err = StatusParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (raw_timestamp, body) = line
            .split_once('\t')
            .ok_or(StatusParseError::MissingField("timestamp"))?;

        let generated_at = DateTime::parse_from_str(raw_timestamp.trim(), TIMESTAMP_FORMAT)
            .map_err(|_| invalid("timestamp", raw_timestamp))?;

        let mut parts = body.split(", ");
        let daemon = labelled(&mut parts, DAEMON_LABEL, "daemon")?;
        let heating = labelled(&mut parts, HEATING_LABEL, "heating")?;
        let indoor = labelled(&mut parts, INDOOR_LABEL, "indoor")?;
        let outdoor = labelled(&mut parts, OUTDOOR_LABEL, "outdoor")?;
        let setpoint = labelled(&mut parts, SETPOINT_LABEL, "setpoint")?;

        let daemon_running = match daemon {
            "Running" => true,
            "Stopped" => false,
            other => return Err(invalid("daemon", other)),
        };
        let heating_on = match heating {
            "ON" => true,
            "OFF" => false,
            other => return Err(invalid("heating", other)),
        };

        Ok(Self {
            heating_on,
            indoor_temp_f: parse_temp(indoor, "indoor")?,
            outdoor_temp_f: parse_temp(outdoor, "outdoor")?,
            setpoint_f: parse_temp(setpoint, "setpoint")?
                .ok_or_else(|| invalid("setpoint", setpoint))?,
            daemon_running,
            generated_at,
        })
    }
}

fn labelled<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    label: &'static str,
    field: &'static str,
) -> Result<&'a str, StatusParseError> {
    let part = parts.next().ok_or(StatusParseError::MissingField(field))?;
    part.strip_prefix(label)
        .map(str::trim)
        .ok_or_else(|| invalid(field, part))
}

fn parse_temp(raw: &str, field: &'static str) -> Result<Option<f32>, StatusParseError> {
    if raw == NOT_AVAILABLE {
        return Ok(None);
    }
    raw.strip_suffix(FAHRENHEIT)
        .and_then(|value| value.parse::<f32>().ok())
        .map(Some)
        .ok_or_else(|| invalid(field, raw))
}

fn invalid(field: &'static str, value: &str) -> StatusParseError {
    StatusParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}
