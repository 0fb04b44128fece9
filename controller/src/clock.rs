use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use chrono_tz::Tz;

use heatd_common::ConfigError;

/// Wall-clock source for operating hours, reading age and published timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy)]
pub enum SystemClock {
    Local,
    Zoned(Tz),
}

impl SystemClock {
    pub fn from_timezone(timezone: Option<&str>) -> Result<Self, ConfigError> {
        match timezone.map(str::trim).filter(|name| !name.is_empty()) {
            None => Ok(Self::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(Self::Zoned)
                .map_err(|_| ConfigError::UnknownTimezone(name.to_string())),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self {
            Self::Local => Local::now().fixed_offset(),
            Self::Zoned(tz) => now_in_timezone(tz),
        }
    }
}

fn now_in_timezone(tz: &Tz) -> DateTime<FixedOffset> {
    let local = Utc::now().with_timezone(tz);
    local.with_timezone(&local.offset().fix())
}

#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
