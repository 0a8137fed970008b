//! Per-chunk bookkeeping owned by the store.

use std::sync::Arc;

use glam::Vec2;
use strata_mesh::MeshData;
use strata_terrain::HeightField;

use crate::coord::ChunkCoord;

pub(crate) enum HeightStatus {
    Unrequested,
    Requested,
    Ready(Arc<HeightField>),
}

pub(crate) enum LodMesh {
    Unrequested,
    Pending,
    Ready(Arc<MeshData>),
}

impl LodMesh {
    pub(crate) fn mesh(&self) -> Option<&Arc<MeshData>> {
        match self {
            LodMesh::Ready(mesh) => Some(mesh),
            _ => None,
        }
    }
}

pub(crate) struct TerrainChunk {
    pub(crate) epoch: u64,
    /// World-space center on the x/z plane.
    pub(crate) center: Vec2,
    pub(crate) height: HeightStatus,
    /// One slot per LOD table entry.
    pub(crate) lod_meshes: Vec<LodMesh>,
    /// Index of the LOD last handed to the sink.
    pub(crate) attached_lod: Option<usize>,
    pub(crate) visible: bool,
    /// Terminal once set.
    pub(crate) collider_set: bool,
    /// Tick at which the chunk was created or last hidden.
    pub(crate) hidden_since: u64,
}

impl TerrainChunk {
    pub(crate) fn new(
        coord: ChunkCoord,
        epoch: u64,
        chunk_world_size: f32,
        lod_count: usize,
        tick: u64,
    ) -> Self {
        Self {
            epoch,
            center: coord.as_vec2() * chunk_world_size,
            height: HeightStatus::Unrequested,
            lod_meshes: (0..lod_count).map(|_| LodMesh::Unrequested).collect(),
            attached_lod: None,
            visible: false,
            collider_set: false,
            hidden_since: tick,
        }
    }

    pub(crate) fn height_field(&self) -> Option<&Arc<HeightField>> {
        match &self.height {
            HeightStatus::Ready(field) => Some(field),
            _ => None,
        }
    }
}
