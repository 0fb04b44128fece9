use std::{io::ErrorKind, path::Path};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, feed::ReadingLimits, schedule::OperatingHours};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub loop_interval_ms: u64,
    pub data_expiration_ms: u64,
    pub settle_delay_ms: u64,
    pub shutdown_drain_ms: u64,
    pub min_valid_temp_f: f32,
    pub max_valid_temp_f: f32,
    pub min_setpoint_f: f32,
    pub max_setpoint_f: f32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: 60_000,
            data_expiration_ms: 10_800_000,
            settle_delay_ms: 5_000,
            shutdown_drain_ms: 3_000,
            min_valid_temp_f: -20.0,
            max_valid_temp_f: 110.0,
            min_setpoint_f: 60.0,
            max_setpoint_f: 75.0,
        }
    }
}

impl ThermostatConfig {
    pub fn reading_limits(&self) -> ReadingLimits {
        ReadingLimits {
            min_valid_f: self.min_valid_temp_f,
            max_valid_f: self.max_valid_temp_f,
            expiration: Duration::milliseconds(
                i64::try_from(self.data_expiration_ms).unwrap_or(i64::MAX),
            ),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_valid_temp_f.is_finite()
            && self.max_valid_temp_f.is_finite()
            && self.min_valid_temp_f < self.max_valid_temp_f)
        {
            return Err(ConfigError::Invalid {
                what: format!(
                    "valid temperature range [{}, {}] is empty",
                    self.min_valid_temp_f, self.max_valid_temp_f
                ),
            });
        }
        if !(self.min_setpoint_f.is_finite()
            && self.max_setpoint_f.is_finite()
            && self.min_setpoint_f <= self.max_setpoint_f)
        {
            return Err(ConfigError::Invalid {
                what: format!(
                    "setpoint bounds [{}, {}] are empty",
                    self.min_setpoint_f, self.max_setpoint_f
                ),
            });
        }
        if self.loop_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                what: "loop_interval_ms must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub setpoint_f: f32,
    pub hysteresis_f: f32,
    pub start_hour: u32,
    pub end_hour: u32,
    pub outdoor_disable_f: f32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            setpoint_f: 70.0,
            hysteresis_f: 1.0,
            start_hour: 9,
            end_hour: 23,
            outdoor_disable_f: 45.0,
        }
    }
}

impl ControlSettings {
    pub fn operating_hours(&self) -> OperatingHours {
        OperatingHours {
            start_hour: self.start_hour,
            end_hour: self.end_hour,
        }
    }

    /// Rejects settings the controller cannot run with. Nothing is clamped:
    /// a setpoint outside the configured bounds stops startup.
    pub fn validate(&self, limits: &ThermostatConfig) -> Result<(), ConfigError> {
        if !self.setpoint_f.is_finite()
            || !(limits.min_setpoint_f..=limits.max_setpoint_f).contains(&self.setpoint_f)
        {
            return Err(ConfigError::SetpointOutOfRange {
                value: self.setpoint_f,
                min: limits.min_setpoint_f,
                max: limits.max_setpoint_f,
            });
        }
        if !self.hysteresis_f.is_finite() || self.hysteresis_f < 0.0 {
            return Err(ConfigError::InvalidHysteresis(self.hysteresis_f));
        }
        if !self.operating_hours().is_valid() {
            return Err(ConfigError::InvalidHours {
                start: self.start_hour,
                end: self.end_hour,
            });
        }
        if !self.outdoor_disable_f.is_finite() {
            return Err(ConfigError::Invalid {
                what: "outdoor_disable_f must be finite".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    pub gpio_pin: u32,
    pub active_low: bool,
    pub sysfs_root: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gpio_pin: 23,
            active_low: true,
            sysfs_root: "/sys/class/gpio".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub settings: ControlSettings,
    pub relay: RelayConfig,
    pub timezone: Option<String>,
}

impl RuntimeConfig {
    pub fn from_json(raw: &[u8], path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_slice(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read(path) {
            Ok(raw) => Self::from_json(&raw, path),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thermostat.validate()?;
        self.settings.validate(&self.thermostat)
    }
}
