//! Layered configuration

use crate::MissionConfig;
use block_storage::StorageConfig;
use cycle_scheduler::{SchedulerConfig, SchedulerError};
use encoder::EncoderConfig;
use gps_protocol::ProjectionConfig;
use heading_sensor::HeadingSensorConfig;
use mobility::{MobilityConfig, MobilityError};
use navigation::EstimatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "ROVER";

/// Default configuration file stem, looked up next to the working directory
pub const DEFAULT_FILE: &str = "rover";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Mobility: {0}")]
    Mobility(#[from] MobilityError),

    #[error("Mission: start delay {start_delay_s}s must be non-negative and before stop time {stop_time_s}s")]
    Mission { start_delay_s: f32, stop_time_s: f32 },

    #[error("Estimator: meters per tick must be finite and positive, got {0}")]
    MetersPerTick(f32),
}

/// Tracing output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Every tunable of the vehicle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    pub scheduler: SchedulerConfig,
    pub projection: ProjectionConfig,
    pub heading: HeadingSensorConfig,
    pub encoder: EncoderConfig,
    pub estimator: EstimatorConfig,
    pub mobility: MobilityConfig,
    pub storage: StorageConfig,
    pub mission: MissionConfig,
    pub logging: LoggingConfig,
}

impl RoverConfig {
    /// Load defaults, then the optional file, then `ROVER__*` variables.
    ///
    /// Without an explicit path, `rover.{toml,json,...}` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_FILE).required(false),
        };
        let loaded: RoverConfig = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        self.mobility.validate()?;

        let mission = &self.mission;
        if !(mission.start_delay_s >= 0.0 && mission.start_delay_s < mission.stop_time_s) {
            return Err(ConfigError::Mission {
                start_delay_s: mission.start_delay_s,
                stop_time_s: mission.stop_time_s,
            });
        }

        let meters_per_tick = self.estimator.meters_per_tick;
        if !(meters_per_tick.is_finite() && meters_per_tick > 0.0) {
            return Err(ConfigError::MetersPerTick(meters_per_tick));
        }
        Ok(())
    }
}
