//! Distance-based LOD selection over an ordered table of thresholds.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use strata_mesh::{LodLevel, MAX_LOD};

/// Errors produced when building a [`LodTable`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodTableError {
    #[error("LOD table must have at least one level")]
    Empty,
    #[error("LOD visible distances must be strictly increasing (level {index})")]
    NotIncreasing { index: usize },
    #[error("LOD visible distance must be positive and finite (level {index})")]
    NonPositive { index: usize },
    #[error("level {index} uses LOD {lod}, maximum is {MAX_LOD}")]
    UnsupportedLod { index: usize, lod: u8 },
}

/// One row of the LOD table: the mesh detail to use for chunks no farther
/// than `visible_distance` from the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    /// Raw level; checked against [`MAX_LOD`] by [`LodTable::new`].
    pub lod: u8,
    pub visible_distance: f32,
}

impl LodInfo {
    pub fn new(lod: u8, visible_distance: f32) -> Self {
        Self {
            lod,
            visible_distance,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Level {
    lod: LodLevel,
    visible_distance: f32,
}

/// Validated, ordered LOD thresholds.
///
/// Index `i` covers distances up to `visible_distance[i]`; the last entry's
/// threshold is the maximum view distance.
#[derive(Clone, Debug, PartialEq)]
pub struct LodTable {
    levels: Vec<Level>,
}

impl LodTable {
    pub fn new(levels: Vec<LodInfo>) -> Result<Self, LodTableError> {
        if levels.is_empty() {
            return Err(LodTableError::Empty);
        }

        let mut checked = Vec::with_capacity(levels.len());
        for (index, info) in levels.iter().enumerate() {
            let lod = LodLevel::new(info.lod)
                .map_err(|_| LodTableError::UnsupportedLod { index, lod: info.lod })?;
            if !(info.visible_distance.is_finite() && info.visible_distance > 0.0) {
                return Err(LodTableError::NonPositive { index });
            }
            if index > 0 && info.visible_distance <= levels[index - 1].visible_distance {
                return Err(LodTableError::NotIncreasing { index });
            }
            checked.push(Level {
                lod,
                visible_distance: info.visible_distance,
            });
        }

        Ok(Self { levels: checked })
    }

    /// Index of the level to use at `distance`: the first whose threshold is
    /// not exceeded, or the coarsest level past the last threshold.
    pub fn select(&self, distance: f32) -> usize {
        self.levels
            .iter()
            .position(|level| distance <= level.visible_distance)
            .unwrap_or(self.levels.len() - 1)
    }

    pub fn max_view_distance(&self) -> f32 {
        self.levels[self.levels.len() - 1].visible_distance
    }

    /// Mesh detail of level `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn lod(&self, index: usize) -> LodLevel {
        self.levels[index].lod
    }

    pub fn visible_distance(&self, index: usize) -> f32 {
        self.levels[index].visible_distance
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> impl Iterator<Item = LodInfo> + '_ {
        self.levels
            .iter()
            .map(|level| LodInfo::new(level.lod.get(), level.visible_distance))
    }
}

/// Squared distance from `point` to the closest point of the axis-aligned
/// square centered on `center`. Zero when the point is inside.
pub fn sqr_distance_to_bounds(center: Vec2, half_extent: f32, point: Vec2) -> f32 {
    let outside = ((point - center).abs() - Vec2::splat(half_extent)).max(Vec2::ZERO);
    outside.length_squared()
}
