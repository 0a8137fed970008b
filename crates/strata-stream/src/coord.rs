use std::fmt;

use glam::Vec2;

/// Integer chunk coordinate on the x/z plane. Chunk `(x, y)` is centered on
/// world `(x * size, y * size)` where `size` is the mesh world size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The chunk whose center is nearest to `position`.
    pub fn containing(position: Vec2, chunk_world_size: f32) -> Self {
        let c = (position / chunk_world_size).round();
        Self::new(c.x as i32, c.y as i32)
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance in chunks: the radius of the smallest square
    /// window around `self` that contains `other`.
    pub fn ring_distance(self, other: ChunkCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
