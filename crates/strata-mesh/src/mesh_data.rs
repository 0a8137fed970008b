//! Renderable mesh buffers handed to the renderer.

use glam::{Vec2, Vec3};

use crate::settings::LodLevel;

/// Interleaved vertex layout for GPU upload (32 bytes).
///
/// Layout:
///   - `[0..12]`  position `[f32; 3]`, chunk-local with the chunk centered on the origin
///   - `[12..24]` normal `[f32; 3]`, unit length
///   - `[24..32]` uv `[f32; 2]`, percent across the chunk
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

static_assertions::assert_eq_size!(TerrainVertex, [u8; 32]);

/// Vertex, UV, normal and index buffers for one chunk at one LOD.
///
/// Border-ring vertices used while computing normals are never present here.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    /// Triangle list, 3 indices per face, counter-clockwise seen from above.
    pub indices: Vec<u32>,
    lod: LodLevel,
    flat_shaded: bool,
}

impl MeshData {
    pub(crate) fn new(
        positions: Vec<Vec3>,
        uvs: Vec<Vec2>,
        normals: Vec<Vec3>,
        indices: Vec<u32>,
        lod: LodLevel,
        flat_shaded: bool,
    ) -> Self {
        debug_assert_eq!(positions.len(), uvs.len());
        debug_assert_eq!(positions.len(), normals.len());
        debug_assert_eq!(indices.len() % 3, 0);
        Self {
            positions,
            uvs,
            normals,
            indices,
            lod,
            flat_shaded,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn lod(&self) -> LodLevel {
        self.lod
    }

    pub fn is_flat_shaded(&self) -> bool {
        self.flat_shaded
    }

    /// Interleave the buffers into [`TerrainVertex`]s for upload.
    pub fn to_vertices(&self) -> Vec<TerrainVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| TerrainVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    /// Raw bytes of the index buffer.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
