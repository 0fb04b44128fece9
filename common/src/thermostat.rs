use chrono::{DateTime, FixedOffset};

use crate::{
    config::{ControlSettings, ThermostatConfig},
    error::ConfigError,
    types::{ControllerStatus, SensorReading},
};

/// Why `evaluate` landed where it did. The first five are fail-safe
/// outcomes and always leave heating off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    InputsMissing,
    OccupancyUnknown,
    Away,
    OutsideHours,
    OutdoorTooWarm,
    BelowBand,
    AboveBand,
    Deadband,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputsMissing => "INPUTS_MISSING",
            Self::OccupancyUnknown => "OCCUPANCY_UNKNOWN",
            Self::Away => "AWAY",
            Self::OutsideHours => "OUTSIDE_HOURS",
            Self::OutdoorTooWarm => "OUTDOOR_TOO_WARM",
            Self::BelowBand => "BELOW_BAND",
            Self::AboveBand => "ABOVE_BAND",
            Self::Deadband => "DEADBAND",
        }
    }

    pub fn is_fail_safe(self) -> bool {
        matches!(
            self,
            Self::InputsMissing
                | Self::OccupancyUnknown
                | Self::Away
                | Self::OutsideHours
                | Self::OutdoorTooWarm
        )
    }
}

/// Work for the caller, executed in order. `Settle` blocks further relay
/// commands for the given milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    HeatOn,
    HeatOff,
    Settle(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub reason: DecisionReason,
    pub heating_on: bool,
    pub actions: Vec<EngineAction>,
}

impl Decision {
    pub fn transitioned(&self) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, EngineAction::HeatOn | EngineAction::HeatOff))
    }
}

#[derive(Debug, Clone)]
pub struct ThermostatController {
    pub config: ThermostatConfig,
    settings: ControlSettings,

    heating_on: bool,
    indoor_temp_f: Option<f32>,
    outdoor_temp_f: Option<f32>,
    last_reason: Option<DecisionReason>,
}

impl ThermostatController {
    pub fn new(config: ThermostatConfig, settings: ControlSettings) -> Result<Self, ConfigError> {
        config.validate()?;
        settings.validate(&config)?;
        Ok(Self {
            config,
            settings,
            heating_on: false,
            indoor_temp_f: None,
            outdoor_temp_f: None,
            last_reason: None,
        })
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn is_heating_on(&self) -> bool {
        self.heating_on
    }

    pub fn indoor_temp_f(&self) -> Option<f32> {
        self.indoor_temp_f
    }

    pub fn outdoor_temp_f(&self) -> Option<f32> {
        self.outdoor_temp_f
    }

    pub fn last_reason(&self) -> Option<DecisionReason> {
        self.last_reason
    }

    /// One control decision. Conditions are checked in a fixed order and the
    /// first match wins; anything missing or disallowed turns heating off.
    /// Inside the band heating keeps whatever state it had.
    pub fn evaluate(
        &mut self,
        indoor: Option<&SensorReading>,
        outdoor: Option<&SensorReading>,
        home: Option<bool>,
        now: &DateTime<FixedOffset>,
    ) -> Decision {
        self.indoor_temp_f = indoor.map(|reading| reading.value_f);
        self.outdoor_temp_f = outdoor.map(|reading| reading.value_f);

        let (Some(indoor), Some(outdoor)) = (indoor, outdoor) else {
            return self.decide_off(DecisionReason::InputsMissing);
        };

        match home {
            None => return self.decide_off(DecisionReason::OccupancyUnknown),
            Some(false) => return self.decide_off(DecisionReason::Away),
            Some(true) => {}
        }

        if !self.settings.operating_hours().contains(now) {
            return self.decide_off(DecisionReason::OutsideHours);
        }

        if outdoor.value_f >= self.settings.outdoor_disable_f {
            return self.decide_off(DecisionReason::OutdoorTooWarm);
        }

        let lower_bound = self.settings.setpoint_f - self.settings.hysteresis_f;
        let upper_bound = self.settings.setpoint_f + self.settings.hysteresis_f;

        if indoor.value_f < lower_bound {
            let actions = self.turn_on();
            self.decided(DecisionReason::BelowBand, actions)
        } else if indoor.value_f > upper_bound {
            self.decide_off(DecisionReason::AboveBand)
        } else {
            self.decided(DecisionReason::Deadband, Vec::new())
        }
    }

    /// Idempotent: an empty list when heating is already on.
    pub fn turn_on(&mut self) -> Vec<EngineAction> {
        if self.heating_on {
            return Vec::new();
        }
        self.heating_on = true;
        vec![
            EngineAction::HeatOn,
            EngineAction::Settle(self.config.settle_delay_ms),
        ]
    }

    /// Idempotent: an empty list when heating is already off.
    pub fn turn_off(&mut self) -> Vec<EngineAction> {
        if !self.heating_on {
            return Vec::new();
        }
        self.heating_on = false;
        vec![
            EngineAction::HeatOff,
            EngineAction::Settle(self.config.settle_delay_ms),
        ]
    }

    /// The relay could not carry out a command; stop claiming heat.
    pub fn relay_faulted(&mut self) {
        self.heating_on = false;
    }

    pub fn status(
        &self,
        daemon_running: bool,
        generated_at: DateTime<FixedOffset>,
    ) -> ControllerStatus {
        ControllerStatus {
            heating_on: self.heating_on,
            indoor_temp_f: self.indoor_temp_f,
            outdoor_temp_f: self.outdoor_temp_f,
            setpoint_f: self.settings.setpoint_f,
            daemon_running,
            generated_at,
        }
    }

    fn decide_off(&mut self, reason: DecisionReason) -> Decision {
        let actions = self.turn_off();
        self.decided(reason, actions)
    }

    fn decided(&mut self, reason: DecisionReason, actions: Vec<EngineAction>) -> Decision {
        self.last_reason = Some(reason);
        Decision {
            reason,
            heating_on: self.heating_on,
            actions,
        }
    }
}
