pub mod config;
pub mod error;
pub mod feed;
pub mod files;
pub mod relay;
pub mod schedule;
pub mod status;
pub mod thermostat;
pub mod types;

pub use config::{ControlSettings, RelayConfig, RuntimeConfig, ThermostatConfig};
pub use error::{ConfigError, FeedError, RelayError, StatusParseError, UnknownStation};
pub use feed::ReadingLimits;
pub use files::FeedPaths;
pub use relay::{MemoryRelay, Relay};
pub use schedule::OperatingHours;
pub use thermostat::{Decision, DecisionReason, EngineAction, ThermostatController};
pub use types::{
    ControllerStatus, OccupancyState, SensorReading, SourceTag, Station, TIMESTAMP_FORMAT,
};
