//! Configuration for the terrain streamer.
//!
//! Settings persist to disk as `config.ron`, are created with defaults when
//! missing, accept CLI overrides via clap, and are validated into the typed
//! settings the runtime crates consume.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, DemoConfig, TerrainConfig, ValidatedTerrain, WorkerConfig,
    default_config_dir,
};
pub use error::ConfigError;
