//! Terrain meshing: LOD-decimated grids with stitched edges, border-ring
//! normals, and smooth or flat shading.

pub mod builder;
pub mod mesh_data;
pub mod settings;

pub use builder::build_terrain_mesh;
pub use mesh_data::{MeshData, TerrainVertex};
pub use settings::{
    ChunkSize, FLAT_SHADED_CHUNK_SIZES, LodLevel, MAX_LOD, MeshSettings, MeshSettingsError,
    SUPPORTED_CHUNK_SIZES,
};
