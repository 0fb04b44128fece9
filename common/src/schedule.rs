use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

/// Half-open `[start_hour, end_hour)` window of local wall-clock hours in
/// which heating may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl OperatingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_hour < self.end_hour && self.end_hour <= 24
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }

    /// Uses the local hour of `now` as carried by its offset.
    pub fn contains(&self, now: &DateTime<FixedOffset>) -> bool {
        self.contains_hour(now.hour())
    }
}
