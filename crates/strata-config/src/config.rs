//! Configuration structs with defaults, RON persistence and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_lod::{LodInfo, LodTable};
use strata_mesh::MeshSettings;
use strata_stream::{StreamSettings, TextureSettings};
use strata_terrain::{Elevation, HeightSettings, NoiseSettings};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Terrain shape, meshing and streaming policy.
    pub terrain: TerrainConfig,
    /// Background worker pool.
    pub workers: WorkerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
    /// Headless fly-through run by the `strata` binary.
    pub demo: DemoConfig,
}

/// Everything that decides what terrain is generated and how it streams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    pub noise: NoiseSettings,
    pub elevation: Elevation,
    pub mesh: MeshSettings,
    pub texture: TextureSettings,
    /// `(lod, visible_distance)` rows, finest first.
    pub lod_levels: Vec<LodInfo>,
    /// Row of `lod_levels` whose mesh is used for collision.
    pub collider_lod_index: usize,
    /// Distance from chunk bounds at which the collider is attached.
    pub collider_activation_distance: f32,
    /// Viewer travel that triggers a window refresh.
    pub move_threshold: f32,
    /// Eviction distance as a multiple of the view distance (`inf` disables).
    pub eviction_distance_factor: f32,
    /// Ticks a hidden chunk survives before eviction.
    pub eviction_grace_ticks: u64,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker thread count (0 = one per CPU).
    pub threads: usize,
    /// Jobs the worker channel holds before the backlog takes over.
    pub queue_capacity: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "strata_stream=trace").
    pub log_level: String,
}

/// Scripted viewer path for the headless binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Fixed-step ticks to simulate.
    pub ticks: u32,
    /// Viewer speed in world units per second.
    pub speed: f32,
    /// Heading in degrees, 0 = +x, counter-clockwise towards +z.
    pub heading_degrees: f32,
    /// Log stream statistics every this many ticks (0 = never).
    pub stats_interval: u32,
}

/// Terrain configuration checked and converted into runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTerrain {
    pub height: HeightSettings,
    pub mesh: MeshSettings,
    pub texture: TextureSettings,
    pub stream: StreamSettings,
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            elevation: Elevation::default(),
            mesh: MeshSettings::default(),
            texture: TextureSettings::default(),
            lod_levels: vec![
                LodInfo::new(0, 200.0),
                LodInfo::new(1, 400.0),
                LodInfo::new(2, 600.0),
            ],
            collider_lod_index: 0,
            collider_activation_distance: StreamSettings::DEFAULT_COLLIDER_ACTIVATION_DISTANCE,
            move_threshold: StreamSettings::DEFAULT_MOVE_THRESHOLD,
            eviction_distance_factor: StreamSettings::DEFAULT_EVICTION_FACTOR,
            eviction_grace_ticks: StreamSettings::DEFAULT_EVICTION_GRACE_TICKS,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            queue_capacity: 256,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            ticks: 1_200,
            speed: 80.0,
            heading_degrees: 0.0,
            stats_interval: 120,
        }
    }
}

// --- Validation ---

fn require_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be finite, got {value}"),
        })
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    require_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive, got {value}"),
        })
    }
}

impl TerrainConfig {
    /// Check the configuration and build the runtime settings.
    ///
    /// Out-of-range noise parameters are clamped (scale to a small positive
    /// value, lacunarity to at least 1, persistence into `[0, 1]`); values
    /// that cannot be clamped meaningfully are rejected.
    pub fn validate(&self) -> Result<ValidatedTerrain, ConfigError> {
        let noise = &self.noise;
        require_finite("terrain.noise.scale", noise.scale)?;
        require_finite("terrain.noise.persistence", noise.persistence)?;
        require_finite("terrain.noise.lacunarity", noise.lacunarity)?;
        require_finite("terrain.noise.offset.x", noise.offset.x)?;
        require_finite("terrain.noise.offset.y", noise.offset.y)?;
        require_finite("terrain.elevation.height_multiplier", self.elevation.height_multiplier)?;

        self.mesh.validate()?;
        let lod_table = LodTable::new(self.lod_levels.clone())?;

        if self.collider_lod_index >= lod_table.len() {
            return Err(ConfigError::Invalid {
                field: "terrain.collider_lod_index",
                reason: format!(
                    "{} is out of range for {} LOD levels",
                    self.collider_lod_index,
                    lod_table.len()
                ),
            });
        }
        require_positive(
            "terrain.collider_activation_distance",
            self.collider_activation_distance,
        )?;
        require_positive("terrain.move_threshold", self.move_threshold)?;

        let factor = self.eviction_distance_factor;
        if factor.is_nan() || factor < 1.0 {
            return Err(ConfigError::Invalid {
                field: "terrain.eviction_distance_factor",
                reason: format!("must be at least 1, got {factor}"),
            });
        }

        let eviction_distance = lod_table.max_view_distance() * factor;
        let stream = StreamSettings {
            collider_lod_index: self.collider_lod_index,
            collider_activation_distance: self.collider_activation_distance,
            move_threshold: self.move_threshold,
            eviction_distance,
            eviction_grace_ticks: self.eviction_grace_ticks,
            ..StreamSettings::new(lod_table)
        };

        Ok(ValidatedTerrain {
            height: HeightSettings {
                noise: self.noise.clone().validated(),
                elevation: self.elevation.clone(),
            },
            mesh: self.mesh.clone(),
            texture: self.texture.clone(),
            stream,
        })
    }
}

// --- Load / Save / Reload ---

/// Platform config directory for strata, e.g. `~/.config/strata`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("strata"))
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(false)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
