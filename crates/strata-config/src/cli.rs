//! Command-line argument parsing for the `strata` binary.

use std::path::PathBuf;

use clap::Parser;
use strata_mesh::ChunkSize;

use crate::Config;

/// strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Headless procedural terrain streaming")]
pub struct CliArgs {
    /// Noise seed.
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i32>,

    /// Chunk size in cells (48, 72, 96, 120, 144, 168, 192, 216 or 240).
    #[arg(long, value_parser = parse_chunk_size)]
    pub chunk_size: Option<ChunkSize>,

    /// Use flat shading.
    #[arg(long)]
    pub flat_shading: Option<bool>,

    /// Worker threads (0 = one per CPU).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Ticks to simulate.
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Viewer speed in world units per second.
    #[arg(long)]
    pub speed: Option<f32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_chunk_size(value: &str) -> Result<ChunkSize, String> {
    let cells: u32 = value
        .parse()
        .map_err(|e| format!("invalid chunk size '{value}': {e}"))?;
    ChunkSize::try_from(cells).map_err(|e| e.to_string())
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    ///
    /// `--chunk-size` sets the size for whichever shading mode ends up active.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.noise.seed = seed;
        }
        if let Some(flat) = args.flat_shading {
            self.terrain.mesh.flat_shading = flat;
        }
        if let Some(size) = args.chunk_size {
            if self.terrain.mesh.flat_shading {
                self.terrain.mesh.flat_chunk_size = size;
            } else {
                self.terrain.mesh.chunk_size = size;
            }
        }
        if let Some(threads) = args.threads {
            self.workers.threads = threads;
        }
        if let Some(ticks) = args.ticks {
            self.demo.ticks = ticks;
        }
        if let Some(speed) = args.speed {
            self.demo.speed = speed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
