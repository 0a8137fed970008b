//! The chunk store: the streaming state machine driven once per frame.

use std::sync::Arc;

use glam::Vec2;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_lod::sqr_distance_to_bounds;
use strata_mesh::{MeshData, MeshSettings};
use strata_terrain::{HeightField, HeightSettings};
use strata_work::{TaskError, WorkQueue};

use crate::chunk::{HeightStatus, LodMesh, TerrainChunk};
use crate::coord::ChunkCoord;
use crate::requests::TerrainRequests;
use crate::settings::StreamSettings;
use crate::sink::{SettingsUpdate, TerrainSink};

/// Read-only snapshot of one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkView {
    pub coord: ChunkCoord,
    pub visible: bool,
    pub height_ready: bool,
    /// LOD table index currently shown.
    pub attached_lod: Option<usize>,
    pub ready_lods: Vec<usize>,
    pub pending_lods: Vec<usize>,
    pub collider_set: bool,
}

/// Counters for tools and logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: usize,
    pub visible: usize,
    pub in_flight: usize,
    pub backlog: usize,
    pub height_fields_generated: u64,
    pub meshes_generated: u64,
    pub colliders_attached: u64,
    pub chunks_evicted: u64,
    pub failed_deliveries: u64,
}

#[derive(Default)]
struct Counters {
    height_fields: u64,
    meshes: u64,
    colliders: u64,
    evicted: u64,
    failed: u64,
}

/// Everything a work delivery may touch. Deliveries run on the ticking
/// thread during [`ChunkStore::tick`].
pub struct StreamState<S> {
    chunks: FxHashMap<ChunkCoord, TerrainChunk>,
    /// Visible chunks in the order they became visible.
    visible: Vec<ChunkCoord>,
    sink: S,
    requests: TerrainRequests<StreamState<S>>,
    settings: StreamSettings,
    viewer: Vec2,
    tick: u64,
    next_epoch: u64,
    /// Center and radius of the window built by the last refresh.
    window: Option<(ChunkCoord, i32)>,
    counters: Counters,
}

impl<S: TerrainSink + 'static> StreamState<S> {
    fn chunk_world_size(&self) -> f32 {
        self.requests.mesh_settings().mesh_world_size()
    }

    fn distance_to(&self, center: Vec2) -> f32 {
        sqr_distance_to_bounds(center, self.chunk_world_size() / 2.0, self.viewer).sqrt()
    }

    fn create_chunk(&mut self, coord: ChunkCoord) {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let chunk = TerrainChunk::new(
            coord,
            epoch,
            self.chunk_world_size(),
            self.settings.lod_table.len(),
            self.tick,
        );
        self.chunks.insert(coord, chunk);
        tracing::debug!(%coord, epoch, "chunk created");
        self.update_chunk(coord);
    }

    /// Re-evaluate visibility and LOD of one chunk against the viewer.
    fn update_chunk(&mut self, coord: ChunkCoord) {
        let Some(center) = self.chunks.get(&coord).map(|c| c.center) else {
            return;
        };
        let distance = self.distance_to(center);
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };

        if chunk.height_field().is_none() {
            if matches!(chunk.height, HeightStatus::Unrequested) {
                Self::request_height_field(&self.requests, coord, chunk);
            }
            return;
        }

        let visible = distance <= self.settings.max_view_distance();
        if visible {
            let index = self.settings.lod_table.select(distance);
            if chunk.attached_lod != Some(index) {
                if let Some(mesh) = chunk.lod_meshes[index].mesh().cloned() {
                    tracing::trace!(%coord, from = ?chunk.attached_lod, to = index, "lod swap");
                    chunk.attached_lod = Some(index);
                    self.sink
                        .attach_mesh(coord, self.settings.lod_table.lod(index), mesh);
                } else if matches!(chunk.lod_meshes[index], LodMesh::Unrequested) {
                    Self::request_lod_mesh(&self.requests, &self.settings, coord, chunk, index);
                }
            }
        }

        if chunk.visible != visible {
            chunk.visible = visible;
            if !visible {
                chunk.hidden_since = self.tick;
            }
            self.sink.set_visible(coord, visible);
            if visible {
                self.visible.push(coord);
            } else {
                self.visible.retain(|c| *c != coord);
            }
        }
    }

    /// Prewarm the collider LOD once strictly inside its visible distance,
    /// attach it once strictly inside the activation distance.
    fn update_collider(&mut self, coord: ChunkCoord) {
        let index = self.settings.collider_index();
        let Some(center) = self.chunks.get(&coord).map(|c| c.center) else {
            return;
        };
        let distance = self.distance_to(center);
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        if chunk.collider_set || chunk.height_field().is_none() {
            return;
        }

        if distance < self.settings.lod_table.visible_distance(index)
            && matches!(chunk.lod_meshes[index], LodMesh::Unrequested)
        {
            Self::request_lod_mesh(&self.requests, &self.settings, coord, chunk, index);
        }

        if distance < self.settings.collider_activation_distance
            && let Some(mesh) = chunk.lod_meshes[index].mesh().cloned()
        {
            chunk.collider_set = true;
            self.counters.colliders += 1;
            tracing::debug!(%coord, lod = index, "collider attached");
            self.sink.attach_collision_mesh(coord, mesh);
        }
    }

    fn request_height_field(
        requests: &TerrainRequests<Self>,
        coord: ChunkCoord,
        chunk: &mut TerrainChunk,
    ) {
        let epoch = chunk.epoch;
        let sample_center = coord.as_vec2() * requests.mesh_settings().sample_span() as f32;
        let deliver = move |state: &mut Self, result: Result<Arc<HeightField>, TaskError>| {
            state.on_height_field(coord, epoch, result)
        };
        match requests.request_height_field(sample_center, deliver) {
            Ok(()) => chunk.height = HeightStatus::Requested,
            Err(err) => tracing::warn!(%coord, %err, "height field request rejected"),
        }
    }

    fn request_lod_mesh(
        requests: &TerrainRequests<Self>,
        settings: &StreamSettings,
        coord: ChunkCoord,
        chunk: &mut TerrainChunk,
        index: usize,
    ) {
        let Some(field) = chunk.height_field().cloned() else {
            return;
        };
        let epoch = chunk.epoch;
        let deliver = move |state: &mut Self, result: Result<Arc<MeshData>, TaskError>| {
            state.on_mesh(coord, epoch, index, result)
        };
        match requests.request_mesh(field, settings.lod_table.lod(index), deliver) {
            Ok(()) => chunk.lod_meshes[index] = LodMesh::Pending,
            Err(err) => tracing::warn!(%coord, %err, "mesh request rejected"),
        }
    }

    fn on_height_field(
        &mut self,
        coord: ChunkCoord,
        epoch: u64,
        result: Result<Arc<HeightField>, TaskError>,
    ) {
        let Some(chunk) = self.chunks.get_mut(&coord).filter(|c| c.epoch == epoch) else {
            tracing::trace!(%coord, epoch, "stale height field dropped");
            return;
        };
        match result {
            Ok(field) => {
                chunk.height = HeightStatus::Ready(field);
                self.counters.height_fields += 1;
                tracing::debug!(%coord, "height field ready");
            }
            Err(err) => {
                chunk.height = HeightStatus::Unrequested;
                self.counters.failed += 1;
                tracing::warn!(%coord, %err, "height field generation failed, retrying");
            }
        }
        self.update_chunk(coord);
    }

    fn on_mesh(
        &mut self,
        coord: ChunkCoord,
        epoch: u64,
        index: usize,
        result: Result<Arc<MeshData>, TaskError>,
    ) {
        let Some(chunk) = self.chunks.get_mut(&coord).filter(|c| c.epoch == epoch) else {
            tracing::trace!(%coord, epoch, lod = index, "stale mesh dropped");
            return;
        };
        match result {
            Ok(mesh) => {
                chunk.lod_meshes[index] = LodMesh::Ready(mesh);
                self.counters.meshes += 1;
                tracing::debug!(%coord, lod = index, "mesh ready");
            }
            Err(err) => {
                chunk.lod_meshes[index] = LodMesh::Unrequested;
                self.counters.failed += 1;
                tracing::warn!(%coord, lod = index, %err, "mesh generation failed");
            }
        }
        self.update_chunk(coord);
        if index == self.settings.collider_index() {
            self.update_collider(coord);
        }
    }

    /// Re-evaluate the visible chunks against the live viewer position.
    ///
    /// Hidden chunks are only looked at by [`refresh_window`](Self::refresh_window),
    /// so a chunk that comes into range between refreshes shows up at the
    /// next refresh.
    fn update_visible(&mut self) {
        for coord in self.visible.clone() {
            self.update_chunk(coord);
        }
    }

    fn update_colliders(&mut self) {
        for coord in self.visible.clone() {
            self.update_collider(coord);
        }
    }

    /// Visible chunks first, then every coordinate of the square window
    /// around the viewer, creating what is missing.
    fn refresh_window(&mut self) {
        let mut updated = FxHashSet::default();
        for coord in self.visible.clone() {
            updated.insert(coord);
            self.update_chunk(coord);
        }

        let world_size = self.chunk_world_size();
        let radius = (self.settings.max_view_distance() / world_size).ceil() as i32;
        let current = ChunkCoord::containing(self.viewer, world_size);
        self.window = Some((current, radius));

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coord = current.offset(dx, dy);
                if updated.contains(&coord) {
                    continue;
                }
                if self.chunks.contains_key(&coord) {
                    self.update_chunk(coord);
                } else {
                    self.create_chunk(coord);
                }
            }
        }
    }

    /// Drop hidden chunks that are far away, have been hidden long enough and
    /// lie outside the window of the last refresh.
    fn evict(&mut self) {
        let grace = self.settings.eviction_grace_ticks;
        let limit = self.settings.eviction_distance;
        let in_window = |coord: ChunkCoord| {
            self.window
                .is_some_and(|(center, radius)| center.ring_distance(coord) <= radius as u32)
        };
        let expired: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(coord, chunk)| {
                !chunk.visible
                    && !in_window(**coord)
                    && self.tick.saturating_sub(chunk.hidden_since) >= grace
                    && self.distance_to(chunk.center) > limit
            })
            .map(|(coord, _)| *coord)
            .collect();

        for coord in expired {
            self.chunks.remove(&coord);
            self.counters.evicted += 1;
            tracing::debug!(%coord, "chunk evicted");
            self.sink.release(coord);
        }
    }

    fn release_all(&mut self) {
        for coord in self.chunks.keys() {
            self.sink.release(*coord);
        }
        tracing::debug!(count = self.chunks.len(), "all chunks released");
        self.chunks.clear();
        self.visible.clear();
        self.window = None;
    }
}

/// Tracks the chunks around a viewer and keeps a [`TerrainSink`] supplied
/// with meshes, visibility and collision meshes.
///
/// All generation runs on the [`WorkQueue`]; the store itself only runs on
/// the thread calling [`tick`](Self::tick).
pub struct ChunkStore<S> {
    state: StreamState<S>,
    queue: WorkQueue<StreamState<S>>,
    last_viewer: Option<Vec2>,
    last_refresh: Option<Vec2>,
}

impl<S: TerrainSink + 'static> ChunkStore<S> {
    pub fn new(
        settings: StreamSettings,
        height: HeightSettings,
        mesh: MeshSettings,
        sink: S,
        queue: WorkQueue<StreamState<S>>,
    ) -> Self {
        let requests = TerrainRequests::new(queue.clone(), height, mesh);
        Self {
            state: StreamState {
                chunks: FxHashMap::default(),
                visible: Vec::new(),
                sink,
                requests,
                settings,
                viewer: Vec2::ZERO,
                tick: 0,
                next_epoch: 0,
                window: None,
                counters: Counters::default(),
            },
            queue,
            last_viewer: None,
            last_refresh: None,
        }
    }

    /// Advance one frame with the viewer at `viewer` (world x/z).
    pub fn tick(&mut self, viewer: Vec2) {
        self.state.tick += 1;
        self.state.viewer = viewer;

        // --- Deliveries from the workers ---
        self.queue.drain(&mut self.state);

        // --- Collider policy whenever the viewer moved ---
        if self.last_viewer.is_some_and(|last| last != viewer) {
            self.state.update_colliders();
        }
        self.last_viewer = Some(viewer);

        // --- Window refresh or live visibility update ---
        let threshold = self.state.settings.move_threshold;
        let refresh = self
            .last_refresh
            .is_none_or(|last| last.distance_squared(viewer) > threshold * threshold);
        if refresh {
            self.last_refresh = Some(viewer);
            self.state.refresh_window();
        } else {
            self.state.update_visible();
        }

        // --- Eviction ---
        self.state.evict();
    }

    /// Push a settings change. Anything but a texture change drops every
    /// chunk; they are rebuilt on the next tick.
    pub fn apply_settings(&mut self, update: SettingsUpdate) {
        let requests = &mut self.state.requests;
        match &update {
            SettingsUpdate::Mesh(mesh) => requests.set_mesh_settings(mesh.clone()),
            SettingsUpdate::Noise(noise) => {
                let mut height = requests.height_settings().clone();
                height.noise = noise.clone();
                requests.set_height_settings(height);
            }
            SettingsUpdate::Terrain(height) => requests.set_height_settings(height.clone()),
            SettingsUpdate::Texture(_) => {}
        }

        if update.invalidates_chunks() {
            tracing::info!("terrain settings changed, rebuilding chunks");
            self.state.release_all();
            self.last_refresh = None;
        }
        self.state.sink.settings_changed(&update);
    }

    pub fn chunk_count(&self) -> usize {
        self.state.chunks.len()
    }

    pub fn visible_chunks(&self) -> &[ChunkCoord] {
        &self.state.visible
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.state.chunks.keys().copied()
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<ChunkView> {
        let chunk = self.state.chunks.get(&coord)?;
        let lods_where = |pred: fn(&LodMesh) -> bool| -> Vec<usize> {
            chunk
                .lod_meshes
                .iter()
                .enumerate()
                .filter(|(_, slot)| pred(slot))
                .map(|(i, _)| i)
                .collect()
        };
        Some(ChunkView {
            coord,
            visible: chunk.visible,
            height_ready: chunk.height_field().is_some(),
            attached_lod: chunk.attached_lod,
            ready_lods: lods_where(|slot| matches!(slot, LodMesh::Ready(_))),
            pending_lods: lods_where(|slot| matches!(slot, LodMesh::Pending)),
            collider_set: chunk.collider_set,
        })
    }

    pub fn stats(&self) -> StreamStats {
        let counters = &self.state.counters;
        StreamStats {
            chunks: self.state.chunks.len(),
            visible: self.state.visible.len(),
            in_flight: self.queue.in_flight(),
            backlog: self.queue.backlog_len(),
            height_fields_generated: counters.height_fields,
            meshes_generated: counters.meshes,
            colliders_attached: counters.colliders,
            chunks_evicted: counters.evicted,
            failed_deliveries: counters.failed,
        }
    }

    /// No generation submitted and undelivered.
    pub fn is_idle(&self) -> bool {
        self.queue.in_flight() == 0
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.state.settings
    }

    pub fn height_settings(&self) -> &HeightSettings {
        self.state.requests.height_settings()
    }

    pub fn mesh_settings(&self) -> &MeshSettings {
        self.state.requests.mesh_settings()
    }

    pub fn sink(&self) -> &S {
        &self.state.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.state.sink
    }

    pub fn queue(&self) -> &WorkQueue<StreamState<S>> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use strata_lod::{LodInfo, LodTable};
    use strata_mesh::{ChunkSize, LodLevel};
    use strata_terrain::NoiseSettings;

    use crate::sink::TextureSettings;

    #[derive(Default)]
    struct RecordingSink {
        attached: FxHashMap<ChunkCoord, Vec<LodLevel>>,
        colliders: Vec<ChunkCoord>,
        visible: FxHashSet<ChunkCoord>,
        released: Vec<ChunkCoord>,
        updates: Vec<SettingsUpdate>,
    }

    impl TerrainSink for RecordingSink {
        fn attach_mesh(&mut self, coord: ChunkCoord, lod: LodLevel, mesh: Arc<MeshData>) {
            assert_eq!(mesh.lod(), lod, "attached mesh matches its LOD");
            self.attached.entry(coord).or_default().push(lod);
        }

        fn attach_collision_mesh(&mut self, coord: ChunkCoord, _mesh: Arc<MeshData>) {
            self.colliders.push(coord);
        }

        fn set_visible(&mut self, coord: ChunkCoord, visible: bool) {
            if visible {
                self.visible.insert(coord);
            } else {
                self.visible.remove(&coord);
            }
        }

        fn release(&mut self, coord: ChunkCoord) {
            self.visible.remove(&coord);
            self.released.push(coord);
        }

        fn settings_changed(&mut self, update: &SettingsUpdate) {
            self.updates.push(update.clone());
        }
    }

    const ORIGIN: ChunkCoord = ChunkCoord::new(0, 0);

    /// 48-cell chunks at scale 2: every chunk is 100 world units across.
    fn mesh_settings() -> MeshSettings {
        MeshSettings {
            mesh_scale: 2.0,
            chunk_size: ChunkSize::S48,
            ..Default::default()
        }
    }

    fn height_settings() -> HeightSettings {
        HeightSettings {
            noise: NoiseSettings {
                seed: 7,
                scale: 40.0,
                octaves: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn stream_settings() -> StreamSettings {
        let table = LodTable::new(vec![
            LodInfo::new(0, 200.0),
            LodInfo::new(1, 400.0),
            LodInfo::new(2, 500.0),
        ])
        .unwrap();
        StreamSettings {
            eviction_distance: f32::INFINITY,
            eviction_grace_ticks: 3,
            ..StreamSettings::new(table)
        }
    }

    fn store_with(settings: StreamSettings) -> ChunkStore<RecordingSink> {
        ChunkStore::new(
            settings,
            height_settings(),
            mesh_settings(),
            RecordingSink::default(),
            WorkQueue::new(4, 64).unwrap(),
        )
    }

    fn store() -> ChunkStore<RecordingSink> {
        store_with(stream_settings())
    }

    /// Tick at `viewer` until no generation is outstanding.
    fn settle(store: &mut ChunkStore<RecordingSink>, viewer: Vec2) {
        let deadline = Instant::now() + Duration::from_secs(30);
        store.tick(viewer);
        while !store.is_idle() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
            store.tick(viewer);
        }
        assert!(store.is_idle(), "stream did not settle at {viewer}");
    }

    fn bounds_distance(coord: ChunkCoord, viewer: Vec2) -> f32 {
        sqr_distance_to_bounds(coord.as_vec2() * 100.0, 50.0, viewer).sqrt()
    }

    fn window(cx: i32, cy: i32, radius: i32) -> FxHashSet<ChunkCoord> {
        (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| ChunkCoord::new(cx + dx, cy + dy)))
            .collect()
    }

    #[test]
    fn test_first_tick_tracks_square_window() {
        let mut store = store();
        store.tick(Vec2::ZERO);

        let coords: FxHashSet<ChunkCoord> = store.coords().collect();
        assert_eq!(coords, window(0, 0, 5), "500 / 100 gives an 11x11 window");
        assert_eq!(store.chunk_count(), 121);
        assert!(
            store.visible_chunks().is_empty(),
            "nothing is visible before its height field arrives"
        );
    }

    #[test]
    fn test_visibility_and_lod_follow_distance() {
        let mut store = store();
        settle(&mut store, Vec2::ZERO);

        let table = &store.settings().lod_table;
        for coord in store.coords() {
            let view = store.chunk(coord).unwrap();
            let distance = bounds_distance(coord, Vec2::ZERO);
            assert!(view.height_ready);
            assert_eq!(view.visible, distance <= 500.0, "visibility of {coord}");
            if view.visible {
                let index = table.select(distance);
                assert_eq!(view.attached_lod, Some(index), "LOD of {coord}");
                let shown = store.sink().attached[&coord].last().copied();
                assert_eq!(shown, Some(table.lod(index)));
            } else {
                assert_eq!(view.attached_lod, None);
            }
        }

        let visible: FxHashSet<ChunkCoord> = store.visible_chunks().iter().copied().collect();
        assert_eq!(visible, store.sink().visible);
        assert!(visible.contains(&ChunkCoord::new(5, 0)));
        assert!(!visible.contains(&ChunkCoord::new(5, 5)), "corner is out of range");
    }

    #[test]
    fn test_lod_swap_uses_cached_meshes() {
        let mut store = store();
        let far = ChunkCoord::new(3, 0);
        settle(&mut store, Vec2::ZERO);
        assert_eq!(store.chunk(far).unwrap().attached_lod, Some(1));

        // Approaching: the coarse mesh stays attached while the fine one builds.
        store.tick(Vec2::new(300.0, 0.0));
        let view = store.chunk(far).unwrap();
        assert_eq!(view.attached_lod, Some(1));
        assert!(view.pending_lods.contains(&0));

        settle(&mut store, Vec2::new(300.0, 0.0));
        let view = store.chunk(far).unwrap();
        assert_eq!(view.attached_lod, Some(0));
        assert_eq!(view.ready_lods, vec![0, 1]);

        // Retreating: both meshes are cached, so nothing new is requested.
        let meshes_before = store.stats().meshes_generated;
        store.tick(Vec2::ZERO);
        assert_eq!(store.chunk(far).unwrap().attached_lod, Some(1));
        assert_eq!(store.queue().in_flight(), 0, "no regeneration on LOD swap");
        assert_eq!(store.stats().meshes_generated, meshes_before);

        let lods: Vec<u8> = store.sink().attached[&far].iter().map(|l| l.get()).collect();
        assert_eq!(lods, vec![1, 0, 1]);
    }

    #[test]
    fn test_collider_attached_exactly_once() {
        let mut store = store();

        // Cross the origin chunk three times.
        let sweep: Vec<f32> = (-25..=25).map(|i| i as f32 * 10.0).collect();
        let path = sweep
            .iter()
            .chain(sweep.iter().rev())
            .chain(sweep.iter())
            .copied();
        for x in path {
            settle(&mut store, Vec2::new(x, 0.0));
        }

        let colliders = &store.sink().colliders;
        let mut counts: FxHashMap<ChunkCoord, usize> = FxHashMap::default();
        for coord in colliders {
            *counts.entry(*coord).or_default() += 1;
        }
        assert_eq!(counts.get(&ORIGIN), Some(&1), "origin collider set once");
        assert!(counts.values().all(|n| *n == 1), "no collider set twice: {counts:?}");
        for x in -2..=2 {
            assert!(counts.contains_key(&ChunkCoord::new(x, 0)), "path chunk {x}");
        }
        assert!(
            !counts.contains_key(&ChunkCoord::new(0, 1)),
            "chunks 50 units off the path stay without collider"
        );
        assert_eq!(store.stats().colliders_attached, colliders.len() as u64);
    }

    #[test]
    fn test_collider_needs_viewer_strictly_inside_activation_distance() {
        let mut store = store();

        // Exactly 5 units (the activation distance) east of the origin chunk.
        settle(&mut store, Vec2::new(55.0, 0.0));
        settle(&mut store, Vec2::new(55.0, 1.0));
        assert_eq!(bounds_distance(ORIGIN, Vec2::new(55.0, 1.0)), 5.0);
        assert!(
            !store.sink().colliders.contains(&ORIGIN),
            "no collider at exactly the activation distance"
        );
        assert!(store.sink().colliders.contains(&ChunkCoord::new(1, 0)));

        settle(&mut store, Vec2::new(54.0, 1.0));
        assert!(store.sink().colliders.contains(&ORIGIN), "attached once inside");
    }

    #[test]
    fn test_failed_height_field_is_retried() {
        let mut store = store();
        store.tick(Vec2::ZERO);
        let epoch = store.state.chunks[&ORIGIN].epoch;

        // A delivery for an older incarnation of the chunk is ignored.
        store
            .state
            .on_height_field(ORIGIN, epoch + 1_000, Err(TaskError::Panicked("stale".into())));
        assert_eq!(store.stats().failed_deliveries, 0);

        store
            .state
            .on_height_field(ORIGIN, epoch, Err(TaskError::Panicked("injected".into())));
        assert_eq!(store.stats().failed_deliveries, 1);

        settle(&mut store, Vec2::ZERO);
        let view = store.chunk(ORIGIN).unwrap();
        assert!(view.visible);
        assert_eq!(view.attached_lod, Some(0));
        assert_eq!(
            store.stats().height_fields_generated,
            122,
            "one extra height field for the retry"
        );
    }

    #[test]
    fn test_failed_mesh_is_requested_again() {
        let mut store = store();
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            store.tick(Vec2::ZERO);
            let view = store.chunk(ORIGIN).unwrap();
            if view.height_ready && view.pending_lods.contains(&0) {
                break;
            }
            assert!(Instant::now() < deadline, "origin height field never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }

        let epoch = store.state.chunks[&ORIGIN].epoch;
        store
            .state
            .on_mesh(ORIGIN, epoch, 0, Err(TaskError::Panicked("injected".into())));
        assert_eq!(store.stats().failed_deliveries, 1);
        assert!(store.chunk(ORIGIN).unwrap().pending_lods.contains(&0));

        settle(&mut store, Vec2::ZERO);
        assert_eq!(store.chunk(ORIGIN).unwrap().attached_lod, Some(0));
    }

    #[test]
    fn test_small_moves_do_not_refresh_window() {
        let mut store = store_with(StreamSettings {
            move_threshold: 100.0,
            ..stream_settings()
        });
        settle(&mut store, Vec2::ZERO);
        assert_eq!(store.chunk_count(), 121);

        store.tick(Vec2::new(90.0, 0.0));
        assert_eq!(store.chunk_count(), 121, "no refresh below the threshold");

        store.tick(Vec2::new(110.0, 0.0));
        assert_eq!(store.chunk_count(), 132, "one new column after the refresh");
        assert!(store.chunk(ChunkCoord::new(6, 0)).is_some());
    }

    #[test]
    fn test_hidden_chunks_wait_for_next_refresh() {
        let mut store = store_with(StreamSettings {
            move_threshold: 100.0,
            ..stream_settings()
        });
        let edge = ChunkCoord::new(5, 3);
        settle(&mut store, Vec2::ZERO);
        assert!(bounds_distance(edge, Vec2::ZERO) > 500.0);
        assert!(!store.chunk(edge).unwrap().visible);

        // In range now, but below the move threshold nothing re-checks it.
        let near = Vec2::new(60.0, 0.0);
        assert!(bounds_distance(edge, near) < 500.0);
        store.tick(near);
        assert!(!store.chunk(edge).unwrap().visible, "hidden until the next refresh");

        store.tick(Vec2::new(120.0, 0.0));
        assert!(store.chunk(edge).unwrap().visible, "picked up by the refresh");
    }

    #[test]
    fn test_hidden_far_chunks_are_evicted_after_grace() {
        let mut store = store_with(StreamSettings {
            eviction_distance: 750.0,
            ..stream_settings()
        });
        settle(&mut store, Vec2::ZERO);
        assert!(store.chunk(ORIGIN).unwrap().visible);

        let far = Vec2::new(2_000.0, 0.0);
        store.tick(far);
        let view = store.chunk(ORIGIN).expect("kept during the grace period");
        assert!(!view.visible);

        for _ in 0..3 {
            store.tick(far);
        }
        assert!(store.chunk(ORIGIN).is_none());
        assert!(store.sink().released.contains(&ORIGIN));
        assert!(store.stats().chunks_evicted >= 121);

        // Hidden window corners are closer than the eviction distance.
        assert!(store.chunk(ChunkCoord::new(25, 5)).is_some());
        let coords: FxHashSet<ChunkCoord> = store.coords().collect();
        assert_eq!(coords, window(20, 0, 5));
    }

    #[test]
    fn test_default_settings_never_evict_inside_window() {
        // 96-cell chunks at scale 2.5 span 245 units: ceil(600 / 245) = 3.
        let table = LodTable::new(vec![
            LodInfo::new(0, 200.0),
            LodInfo::new(1, 400.0),
            LodInfo::new(2, 600.0),
        ])
        .unwrap();
        let settings = StreamSettings {
            eviction_grace_ticks: 2,
            ..StreamSettings::new(table)
        };
        let mut store = ChunkStore::new(
            settings,
            height_settings(),
            MeshSettings::default(),
            RecordingSink::default(),
            WorkQueue::new(4, 64).unwrap(),
        );

        // Off-center in the origin chunk: the far window corner lies beyond
        // the 900-unit eviction distance.
        let viewer = Vec2::new(-120.0, -120.0);
        let corner = ChunkCoord::new(3, 3);
        assert!(sqr_distance_to_bounds(corner.as_vec2() * 245.0, 122.5, viewer).sqrt() > 900.0);

        settle(&mut store, viewer);
        for _ in 0..5 {
            store.tick(viewer);
        }
        assert_eq!(store.chunk_count(), 49, "the whole 7x7 window is kept");
        assert!(store.chunk(corner).is_some());
        assert_eq!(store.stats().chunks_evicted, 0);

        // Small moves around the same spot never churn the window.
        for step in 0..6 {
            let wobble = Vec2::new(if step % 2 == 0 { 26.0 } else { 0.0 }, 0.0);
            for _ in 0..4 {
                store.tick(viewer + wobble);
            }
        }
        assert_eq!(store.stats().chunks_evicted, 0);
        assert_eq!(store.stats().height_fields_generated, 49, "no chunk was re-created");
    }

    #[test]
    fn test_settings_updates_invalidate_chunks() {
        let mut store = store();
        settle(&mut store, Vec2::ZERO);
        assert_eq!(store.chunk_count(), 121);

        store.apply_settings(SettingsUpdate::Texture(TextureSettings::default()));
        assert_eq!(store.chunk_count(), 121, "texture changes keep geometry");
        assert!(store.sink().released.is_empty());
        assert_eq!(store.sink().updates.len(), 1);

        let noise = NoiseSettings {
            seed: 99,
            ..height_settings().noise
        };
        store.apply_settings(SettingsUpdate::Noise(noise));
        assert_eq!(store.chunk_count(), 0);
        assert!(store.visible_chunks().is_empty());
        assert_eq!(store.sink().released.len(), 121);
        assert!(store.sink().visible.is_empty());
        assert_eq!(store.height_settings().noise.seed, 99);
        assert_eq!(store.sink().updates.len(), 2);

        settle(&mut store, Vec2::ZERO);
        assert_eq!(store.chunk_count(), 121);
        assert_eq!(store.stats().height_fields_generated, 242);

        // 72-cell chunks at scale 2 span 148 units: ceil(500 / 148) = 4.
        store.apply_settings(SettingsUpdate::Mesh(MeshSettings {
            chunk_size: ChunkSize::S72,
            ..mesh_settings()
        }));
        settle(&mut store, Vec2::ZERO);
        assert_eq!(store.chunk_count(), 81);
        assert!(matches!(store.sink().updates[2], SettingsUpdate::Mesh(_)));
    }
}
