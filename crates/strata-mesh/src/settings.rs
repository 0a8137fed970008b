//! Mesh parameters: supported chunk sizes, world scale and LOD levels.

use serde::{Deserialize, Serialize};

/// Coarsest supported level of detail.
pub const MAX_LOD: u8 = 4;

/// Every chunk size the mesher supports, in grid cells per side.
pub const SUPPORTED_CHUNK_SIZES: [ChunkSize; 9] = [
    ChunkSize::S48,
    ChunkSize::S72,
    ChunkSize::S96,
    ChunkSize::S120,
    ChunkSize::S144,
    ChunkSize::S168,
    ChunkSize::S192,
    ChunkSize::S216,
    ChunkSize::S240,
];

/// Flat shading duplicates every triangle corner, so only the smaller sizes
/// stay within a 16-bit-friendly vertex budget.
pub const FLAT_SHADED_CHUNK_SIZES: [ChunkSize; 3] =
    [ChunkSize::S48, ChunkSize::S72, ChunkSize::S96];

const fn skip_for(lod: u8) -> u32 {
    if lod == 0 { 1 } else { lod as u32 * 2 }
}

const fn every_size_supports_every_lod() -> bool {
    let mut i = 0;
    while i < SUPPORTED_CHUNK_SIZES.len() {
        let mut lod = 0;
        while lod <= MAX_LOD {
            if SUPPORTED_CHUNK_SIZES[i] as u32 % skip_for(lod) != 0 {
                return false;
            }
            lod += 1;
        }
        i += 1;
    }
    true
}

static_assertions::const_assert!(every_size_supports_every_lod());

/// Errors from mesh settings that cannot be meshed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshSettingsError {
    #[error("unsupported chunk size {0} (expected one of 48, 72, 96, 120, 144, 168, 192, 216, 240)")]
    UnsupportedChunkSize(u32),
    #[error("chunk size {0} is too large for flat shading (expected one of 48, 72, 96)")]
    FlatShadedTooLarge(u32),
    #[error("mesh scale must be positive and finite, got {0}")]
    InvalidScale(f32),
    #[error("unsupported level of detail {0} (maximum is {MAX_LOD})")]
    UnsupportedLod(u8),
}

/// A supported chunk size. Each value is divisible by every LOD skip
/// increment, so every LOD lattice lands exactly on the chunk edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum ChunkSize {
    S48 = 48,
    S72 = 72,
    S96 = 96,
    S120 = 120,
    S144 = 144,
    S168 = 168,
    S192 = 192,
    S216 = 216,
    S240 = 240,
}

impl ChunkSize {
    /// Grid cells per side.
    pub fn cells(self) -> usize {
        self as u32 as usize
    }

    pub fn supports_flat_shading(self) -> bool {
        FLAT_SHADED_CHUNK_SIZES.contains(&self)
    }
}

impl TryFrom<u32> for ChunkSize {
    type Error = MeshSettingsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        SUPPORTED_CHUNK_SIZES
            .iter()
            .copied()
            .find(|size| *size as u32 == value)
            .ok_or(MeshSettingsError::UnsupportedChunkSize(value))
    }
}

impl From<ChunkSize> for u32 {
    fn from(size: ChunkSize) -> Self {
        size as u32
    }
}

/// Level of detail, `0` (full resolution) through [`MAX_LOD`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LodLevel(u8);

impl LodLevel {
    pub const FULL: LodLevel = LodLevel(0);

    pub fn new(level: u8) -> Result<Self, MeshSettingsError> {
        if level > MAX_LOD {
            return Err(MeshSettingsError::UnsupportedLod(level));
        }
        Ok(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Stride in grid cells between kept vertices: `1` at LOD 0, `2 * lod` above.
    pub fn skip_increment(self) -> usize {
        skip_for(self.0) as usize
    }
}

impl TryFrom<u8> for LodLevel {
    type Error = MeshSettingsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LodLevel> for u8 {
    fn from(lod: LodLevel) -> Self {
        lod.0
    }
}

/// How height fields are turned into chunk meshes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// World units per grid cell.
    pub mesh_scale: f32,
    pub flat_shading: bool,
    /// Chunk size used with smooth shading.
    pub chunk_size: ChunkSize,
    /// Chunk size used with flat shading.
    pub flat_chunk_size: ChunkSize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 2.5,
            flat_shading: false,
            chunk_size: ChunkSize::S96,
            flat_chunk_size: ChunkSize::S48,
        }
    }
}

impl MeshSettings {
    pub fn validate(&self) -> Result<(), MeshSettingsError> {
        if !(self.mesh_scale.is_finite() && self.mesh_scale > 0.0) {
            return Err(MeshSettingsError::InvalidScale(self.mesh_scale));
        }
        if self.flat_shading && !self.flat_chunk_size.supports_flat_shading() {
            return Err(MeshSettingsError::FlatShadedTooLarge(
                self.flat_chunk_size as u32,
            ));
        }
        Ok(())
    }

    /// The chunk size in effect for the current shading mode.
    pub fn active_chunk_size(&self) -> ChunkSize {
        if self.flat_shading {
            self.flat_chunk_size
        } else {
            self.chunk_size
        }
    }

    /// Renderable vertices per line at LOD 0.
    pub fn vertices_per_line(&self) -> usize {
        self.active_chunk_size().cells() + 3
    }

    /// Height samples per line: the renderable vertices plus one border
    /// sample on each side, used only for normals.
    pub fn vertices_per_line_with_border(&self) -> usize {
        self.active_chunk_size().cells() + 5
    }

    /// Height samples between the centers of two adjacent chunks.
    pub fn sample_span(&self) -> usize {
        self.active_chunk_size().cells() + 2
    }

    /// Side length of a chunk in world units.
    pub fn mesh_world_size(&self) -> f32 {
        self.sample_span() as f32 * self.mesh_scale
    }
}
