//! Chunk streaming around a moving viewer: which chunks exist, which are
//! visible, at which LOD, and when each one gets its collision mesh.

mod chunk;
mod coord;
pub mod requests;
pub mod settings;
pub mod sink;
mod store;

pub use coord::ChunkCoord;
pub use requests::TerrainRequests;
pub use settings::StreamSettings;
pub use sink::{SettingsUpdate, TerrainSink, TextureLayer, TextureSettings};
pub use store::{ChunkStore, ChunkView, StreamState, StreamStats};
