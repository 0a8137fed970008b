//! Height-field and mesh requests bound to the current terrain settings.

use std::sync::Arc;

use glam::Vec2;
use strata_mesh::{LodLevel, MeshData, MeshSettings, build_terrain_mesh};
use strata_terrain::{HeightField, HeightSettings, generate_height_field};
use strata_work::{SubmitError, TaskError, WorkQueue};

/// Submits terrain generation to a [`WorkQueue`] using a shared snapshot of
/// the settings. Replacing the settings only affects later requests.
pub struct TerrainRequests<C> {
    queue: WorkQueue<C>,
    height: Arc<HeightSettings>,
    mesh: Arc<MeshSettings>,
}

impl<C: 'static> TerrainRequests<C> {
    pub fn new(queue: WorkQueue<C>, height: HeightSettings, mesh: MeshSettings) -> Self {
        Self {
            queue,
            height: Arc::new(validated(height)),
            mesh: Arc::new(mesh),
        }
    }

    /// Generate the bordered height field centered on `sample_center`.
    pub fn request_height_field<D>(
        &self,
        sample_center: Vec2,
        deliver: D,
    ) -> Result<(), SubmitError>
    where
        D: FnOnce(&mut C, Result<Arc<HeightField>, TaskError>) + Send + 'static,
    {
        let height = Arc::clone(&self.height);
        let n = self.mesh.vertices_per_line_with_border();
        self.queue.submit(
            move || Arc::new(generate_height_field(n, n, &height.noise, sample_center)),
            deliver,
        )
    }

    /// Mesh `field` at `lod`.
    pub fn request_mesh<D>(
        &self,
        field: Arc<HeightField>,
        lod: LodLevel,
        deliver: D,
    ) -> Result<(), SubmitError>
    where
        D: FnOnce(&mut C, Result<Arc<MeshData>, TaskError>) + Send + 'static,
    {
        let height = Arc::clone(&self.height);
        let mesh = Arc::clone(&self.mesh);
        self.queue.submit(
            move || Arc::new(build_terrain_mesh(&field, lod, &mesh, &height.elevation)),
            deliver,
        )
    }

    pub fn height_settings(&self) -> &HeightSettings {
        &self.height
    }

    pub fn mesh_settings(&self) -> &MeshSettings {
        &self.mesh
    }

    pub fn set_height_settings(&mut self, height: HeightSettings) {
        self.height = Arc::new(validated(height));
    }

    pub fn set_mesh_settings(&mut self, mesh: MeshSettings) {
        self.mesh = Arc::new(mesh);
    }

    pub fn queue(&self) -> &WorkQueue<C> {
        &self.queue
    }
}

fn validated(mut height: HeightSettings) -> HeightSettings {
    height.noise = height.noise.validated();
    height
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use strata_mesh::ChunkSize;

    #[derive(Default)]
    struct Received {
        fields: Vec<Arc<HeightField>>,
        meshes: Vec<Arc<MeshData>>,
    }

    fn requests() -> TerrainRequests<Received> {
        let mesh = MeshSettings {
            chunk_size: ChunkSize::S48,
            ..Default::default()
        };
        TerrainRequests::new(WorkQueue::new(2, 8).unwrap(), HeightSettings::default(), mesh)
    }

    fn drain_until(
        requests: &TerrainRequests<Received>,
        ctx: &mut Received,
        done: impl Fn(&Received) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(ctx) && Instant::now() < deadline {
            requests.queue().drain(ctx);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_height_field_then_mesh() {
        let requests = requests();
        let mut received = Received::default();

        requests
            .request_height_field(Vec2::new(50.0, -50.0), |ctx: &mut Received, r| {
                ctx.fields.push(r.unwrap())
            })
            .unwrap();
        drain_until(&requests, &mut received, |r| !r.fields.is_empty());

        let field = Arc::clone(&received.fields[0]);
        let n = requests.mesh_settings().vertices_per_line_with_border();
        assert_eq!((field.width(), field.height()), (n, n));
        let expected = generate_height_field(
            n,
            n,
            &requests.height_settings().noise,
            Vec2::new(50.0, -50.0),
        );
        assert_eq!(*field, expected, "worker output matches a direct call");

        requests
            .request_mesh(field, LodLevel::new(2).unwrap(), |ctx: &mut Received, r| {
                ctx.meshes.push(r.unwrap())
            })
            .unwrap();
        drain_until(&requests, &mut received, |r| !r.meshes.is_empty());
        assert_eq!(received.meshes[0].lod().get(), 2);
    }

    #[test]
    fn test_settings_are_clamped_on_replace() {
        let mut requests = requests();
        let mut height = HeightSettings::default();
        height.noise.scale = -3.0;
        height.noise.lacunarity = 0.2;
        requests.set_height_settings(height);
        assert!(requests.height_settings().noise.scale > 0.0);
        assert_eq!(requests.height_settings().noise.lacunarity, 1.0);
    }
}
