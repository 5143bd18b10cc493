//! Rover Control Stack
//!
//! Wires the acquisition, estimation, guidance, actuation and logging
//! crates into one fixed-order control cycle, and provides configuration
//! loading, logging setup and a simulated board for host runs.

mod board;
mod mission;
mod rover;
mod settings;
mod sim;

pub use board::{Board, Peripherals};
pub use mission::{MissionConfig, MissionGate, MissionPhase, StartSignal};
pub use rover::{CycleReport, InterruptHandles, Rover};
pub use settings::{ConfigError, LoggingConfig, RoverConfig};
pub use sim::{gga_sentence, SimBoard, SimVehicle, Simulation};

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level: Level = config
        .level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    if config.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;
    }
    Ok(())
}
