//! Rover Control Stack - Card Image Dump
//!
//! Prints one JSON line per logged cycle, stopping at the first block
//! without the guard prefix.

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use telemetry::{SharedRecord, BLOCK_SIZE, GUARD_PREFIX_BYTES};

/// Decode a card image into JSON lines
#[derive(Debug, Parser)]
#[command(name = "log-dump", version)]
struct Args {
    /// Card image written by the logger
    image: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let image = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read {}", args.image.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (index, chunk) in image.chunks_exact(BLOCK_SIZE).enumerate() {
        if chunk[..GUARD_PREFIX_BYTES.len()] != GUARD_PREFIX_BYTES {
            break;
        }
        let block: &[u8; BLOCK_SIZE] = chunk
            .try_into()
            .context("Block slice has the wrong length")?;
        let record = SharedRecord::decode(block)
            .with_context(|| format!("Block {} is corrupt", index))?;
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}
