use strata_lod::LodTable;

/// Streaming policy: LOD thresholds, collider policy and eviction.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSettings {
    pub lod_table: LodTable,
    /// Index into `lod_table` whose mesh doubles as the collision mesh.
    /// Out-of-range values fall back to the coarsest level.
    pub collider_lod_index: usize,
    /// World distance from chunk bounds within which the collider is attached.
    pub collider_activation_distance: f32,
    /// The window is rebuilt once the viewer has moved this far since the
    /// last rebuild.
    pub move_threshold: f32,
    /// Hidden chunks farther than this are dropped, except those inside the
    /// window of the last refresh. `f32::INFINITY` keeps every chunk forever.
    pub eviction_distance: f32,
    /// Ticks a chunk must stay hidden before it may be evicted.
    pub eviction_grace_ticks: u64,
}

impl StreamSettings {
    pub const DEFAULT_COLLIDER_ACTIVATION_DISTANCE: f32 = 5.0;
    pub const DEFAULT_MOVE_THRESHOLD: f32 = 25.0;
    pub const DEFAULT_EVICTION_FACTOR: f32 = 1.5;
    pub const DEFAULT_EVICTION_GRACE_TICKS: u64 = 120;

    /// Default policy for `lod_table`: collider from the finest level,
    /// eviction at one and a half times the view distance.
    pub fn new(lod_table: LodTable) -> Self {
        debug_assert!(!lod_table.is_empty());
        let eviction_distance = lod_table.max_view_distance() * Self::DEFAULT_EVICTION_FACTOR;
        Self {
            lod_table,
            collider_lod_index: 0,
            collider_activation_distance: Self::DEFAULT_COLLIDER_ACTIVATION_DISTANCE,
            move_threshold: Self::DEFAULT_MOVE_THRESHOLD,
            eviction_distance,
            eviction_grace_ticks: Self::DEFAULT_EVICTION_GRACE_TICKS,
        }
    }

    pub fn max_view_distance(&self) -> f32 {
        self.lod_table.max_view_distance()
    }

    pub(crate) fn collider_index(&self) -> usize {
        self.collider_lod_index.min(self.lod_table.len() - 1)
    }
}
