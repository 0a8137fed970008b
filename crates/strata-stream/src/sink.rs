//! The renderer-facing side of the stream.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_mesh::{LodLevel, MeshData, MeshSettings};
use strata_terrain::{HeightSettings, NoiseSettings};

use crate::coord::ChunkCoord;

/// One painted band of the terrain material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureLayer {
    pub tint: [f32; 3],
    pub tint_strength: f32,
    /// Normalized height where the layer starts.
    pub start_height: f32,
    pub blend_strength: f32,
    pub texture_scale: f32,
}

impl Default for TextureLayer {
    fn default() -> Self {
        Self {
            tint: [1.0, 1.0, 1.0],
            tint_strength: 0.0,
            start_height: 0.0,
            blend_strength: 0.1,
            texture_scale: 10.0,
        }
    }
}

/// Material parameters consumed by the renderer only; the stream never
/// looks inside.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    pub layers: Vec<TextureLayer>,
}

impl Default for TextureSettings {
    fn default() -> Self {
        let layer = |tint: [f32; 3], start_height: f32| TextureLayer {
            tint,
            tint_strength: 0.6,
            start_height,
            ..Default::default()
        };
        Self {
            layers: vec![
                layer([0.16, 0.34, 0.62], 0.0),
                layer([0.84, 0.78, 0.55], 0.3),
                layer([0.33, 0.55, 0.22], 0.4),
                layer([0.45, 0.42, 0.40], 0.6),
                layer([0.95, 0.95, 0.97], 0.8),
            ],
        }
    }
}

/// A settings change pushed into the stream by the owner.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsUpdate {
    Mesh(MeshSettings),
    Noise(NoiseSettings),
    Texture(TextureSettings),
    /// Noise and elevation together.
    Terrain(HeightSettings),
}

impl SettingsUpdate {
    /// Whether existing chunk geometry is invalidated by this change.
    pub fn invalidates_chunks(&self) -> bool {
        !matches!(self, SettingsUpdate::Texture(_))
    }
}

/// Receives everything the stream wants displayed. Called only from the
/// thread that ticks the [`ChunkStore`](crate::ChunkStore).
pub trait TerrainSink {
    /// Show `mesh` as the render mesh of `coord`, replacing any previous one.
    fn attach_mesh(&mut self, coord: ChunkCoord, lod: LodLevel, mesh: Arc<MeshData>);

    /// Install the collision mesh of `coord`. Called at most once per chunk.
    fn attach_collision_mesh(&mut self, coord: ChunkCoord, mesh: Arc<MeshData>);

    fn set_visible(&mut self, coord: ChunkCoord, visible: bool);

    /// The chunk was dropped; free anything held for it.
    fn release(&mut self, _coord: ChunkCoord) {}

    fn settings_changed(&mut self, _update: &SettingsUpdate) {}
}
