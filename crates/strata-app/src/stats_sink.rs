//! A [`TerrainSink`] that keeps counts instead of GPU resources.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_mesh::{LodLevel, MeshData};
use strata_stream::{ChunkCoord, SettingsUpdate, TerrainSink};
use strata_terrain::Elevation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Attached {
    lod: LodLevel,
    vertices: usize,
    triangles: usize,
}

/// Totals reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SinkSummary {
    pub resident_meshes: usize,
    pub visible: usize,
    pub colliders: usize,
    pub resident_vertices: usize,
    pub resident_triangles: usize,
    pub mesh_attachments: u64,
    pub lod_swaps: u64,
    pub releases: u64,
    pub settings_changes: u64,
    /// Elevation of the lowest and highest possible height sample.
    pub elevation_range: (f32, f32),
}

#[derive(Debug)]
pub struct StatsSink {
    meshes: FxHashMap<ChunkCoord, Attached>,
    visible: FxHashSet<ChunkCoord>,
    colliders: FxHashSet<ChunkCoord>,
    mesh_attachments: u64,
    lod_swaps: u64,
    releases: u64,
    settings_changes: u64,
    elevation_range: (f32, f32),
}

fn elevation_range(elevation: &Elevation) -> (f32, f32) {
    (elevation.min_height(), elevation.max_height())
}

impl StatsSink {
    /// `elevation` is the remap the stream starts with; terrain updates
    /// replace it.
    pub fn new(elevation: &Elevation) -> Self {
        Self {
            meshes: FxHashMap::default(),
            visible: FxHashSet::default(),
            colliders: FxHashSet::default(),
            mesh_attachments: 0,
            lod_swaps: 0,
            releases: 0,
            settings_changes: 0,
            elevation_range: elevation_range(elevation),
        }
    }

    pub fn summary(&self) -> SinkSummary {
        SinkSummary {
            resident_meshes: self.meshes.len(),
            visible: self.visible.len(),
            colliders: self.colliders.len(),
            resident_vertices: self.meshes.values().map(|m| m.vertices).sum(),
            resident_triangles: self.meshes.values().map(|m| m.triangles).sum(),
            mesh_attachments: self.mesh_attachments,
            lod_swaps: self.lod_swaps,
            releases: self.releases,
            settings_changes: self.settings_changes,
            elevation_range: self.elevation_range,
        }
    }

    /// LOD currently shown for `coord`.
    pub fn attached_lod(&self, coord: ChunkCoord) -> Option<LodLevel> {
        self.meshes.get(&coord).map(|m| m.lod)
    }
}

impl TerrainSink for StatsSink {
    fn attach_mesh(&mut self, coord: ChunkCoord, lod: LodLevel, mesh: Arc<MeshData>) {
        let attached = Attached {
            lod,
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
        };
        if let Some(previous) = self.meshes.insert(coord, attached)
            && previous.lod != lod
        {
            self.lod_swaps += 1;
        }
        self.mesh_attachments += 1;
    }

    fn attach_collision_mesh(&mut self, coord: ChunkCoord, _mesh: Arc<MeshData>) {
        if !self.colliders.insert(coord) {
            tracing::warn!(%coord, "collision mesh attached twice");
        }
    }

    fn set_visible(&mut self, coord: ChunkCoord, visible: bool) {
        if visible {
            self.visible.insert(coord);
        } else {
            self.visible.remove(&coord);
        }
    }

    fn release(&mut self, coord: ChunkCoord) {
        self.meshes.remove(&coord);
        self.visible.remove(&coord);
        self.colliders.remove(&coord);
        self.releases += 1;
    }

    fn settings_changed(&mut self, update: &SettingsUpdate) {
        if let SettingsUpdate::Terrain(height) = update {
            self.elevation_range = elevation_range(&height.elevation);
        }
        self.settings_changes += 1;
    }
}
