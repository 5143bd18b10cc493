//! Rover Control Stack - Host Simulation
//!
//! Runs the control stack against the simulated board. The card image is
//! loaded if it exists, so repeated runs append after earlier ones.

use anyhow::Context;
use block_storage::MockCard;
use clap::Parser;
use rover::{init_logging, RoverConfig, Simulation};
use std::path::{Path, PathBuf};
use tracing::info;

/// Simulated card size field: 8192 blocks
const SIM_C_SIZE: u32 = 15;

/// Run the control loop on simulated hardware and save the card image
#[derive(Debug, Parser)]
#[command(name = "rover-sim", version)]
struct Args {
    /// Card image to resume from and write back
    #[arg(default_value = "card.img")]
    image: PathBuf,

    /// Control cycles to run
    #[arg(short, long, default_value_t = 4800)]
    cycles: u32,

    /// Configuration file layered under `ROVER__*` variables
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = RoverConfig::load(args.config.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Rover Simulation v{} ===", env!("CARGO_PKG_VERSION"));

    let card = load_card(&args.image)?;
    let mut sim = Simulation::new(&config, card);
    match sim.start_up() {
        Some(cursor) => info!(
            "Logging to block {} of {}",
            cursor.next_block, cursor.capacity_blocks
        ),
        None => info!("Running without block logging"),
    }
    sim.press_start();

    for _ in 0..args.cycles {
        let report = sim.step();
        if report.loop_counter % 400 == 0 {
            info!(
                "Cycle {}: {:?} at ({:.1}, {:.1}), waypoint {}",
                report.loop_counter, report.phase, report.pose.x, report.pose.y, report.waypoint_index
            );
        }
    }

    let vehicle = sim.vehicle();
    info!("Vehicle finished at ({:.1}, {:.1})", vehicle.x, vehicle.y);

    let image = sim.finish().image();
    std::fs::write(&args.image, &image)
        .with_context(|| format!("Failed to write card image {}", args.image.display()))?;
    info!("Wrote {} blocks to {}", image.len() / telemetry::BLOCK_SIZE, args.image.display());
    Ok(())
}

fn load_card(path: &Path) -> anyhow::Result<MockCard> {
    if !path.exists() {
        return Ok(MockCard::new(SIM_C_SIZE));
    }
    let image = std::fs::read(path)
        .with_context(|| format!("Failed to read card image {}", path.display()))?;
    info!("Loaded {} bytes from {}", image.len(), path.display());
    Ok(MockCard::from_image(SIM_C_SIZE, &image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_help_is_not_an_image_path() {
        let err = Args::try_parse_from(["rover-sim", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["rover-sim"]).unwrap();
        assert_eq!(args.image, PathBuf::from("card.img"));
        assert_eq!(args.cycles, 4800);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_flags() {
        let args =
            Args::try_parse_from(["rover-sim", "run.img", "--cycles", "40", "--config", "rover.toml"])
                .unwrap();
        assert_eq!(args.image, PathBuf::from("run.img"));
        assert_eq!(args.cycles, 40);
        assert_eq!(args.config, Some(PathBuf::from("rover.toml")));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = Args::try_parse_from(["rover-sim", "--cylces", "40"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
