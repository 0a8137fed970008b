//! Height field to chunk mesh conversion with LOD decimation and seam stitching.
//!
//! The height field carries `n = size + 5` samples per line. Grid points are
//! classified by ring:
//!
//! ```text
//! ring 0   border           off-mesh, only feeds normals
//! ring 1   mesh edge        always full resolution, shared with neighbours
//! ring 2   edge connection  full resolution, heights interpolated along the
//!                           coarse lattice so the fine strip meets it exactly
//! inner    main / skipped   kept only on the `skip` lattice
//! ```
//!
//! Because ring 1 is identical at every LOD, two neighbouring chunks meet
//! without cracks whatever LOD each of them is drawn at.

use glam::{Vec2, Vec3};
use strata_terrain::{Elevation, HeightField};

use crate::mesh_data::MeshData;
use crate::settings::{LodLevel, MeshSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PointKind {
    Border,
    MeshEdge,
    EdgeConnection,
    Main,
    Skipped,
}

/// Where a grid point's vertex lives: the renderable buffer or the border
/// ring used only for normals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexSlot {
    Interior(u32),
    Border(u32),
    Skipped,
}

struct Grid {
    n: usize,
    skip: usize,
}

impl Grid {
    fn classify(&self, x: usize, y: usize) -> PointKind {
        let last = self.n - 1;
        if x == 0 || y == 0 || x == last || y == last {
            return PointKind::Border;
        }
        if x == 1 || y == 1 || x == last - 1 || y == last - 1 {
            return PointKind::MeshEdge;
        }
        if (x - 2) % self.skip == 0 && (y - 2) % self.skip == 0 {
            return PointKind::Main;
        }
        if x == 2 || y == 2 || x == last - 2 || y == last - 2 {
            return PointKind::EdgeConnection;
        }
        PointKind::Skipped
    }

    /// Slots in row-major order, numbering interior and border vertices
    /// independently.
    fn assign_slots(&self) -> Vec<VertexSlot> {
        let mut slots = Vec::with_capacity(self.n * self.n);
        let mut interior = 0;
        let mut border = 0;
        for y in 0..self.n {
            for x in 0..self.n {
                let slot = match self.classify(x, y) {
                    PointKind::Skipped => VertexSlot::Skipped,
                    PointKind::Border => {
                        border += 1;
                        VertexSlot::Border(border - 1)
                    }
                    _ => {
                        interior += 1;
                        VertexSlot::Interior(interior - 1)
                    }
                };
                slots.push(slot);
            }
        }
        slots
    }

    /// Elevation of a ring-2 point, linearly interpolated between the two
    /// lattice points bracketing it along its edge.
    fn edge_connection_elevation(
        &self,
        field: &HeightField,
        elevation: &Elevation,
        x: usize,
        y: usize,
    ) -> f32 {
        let vertical = x == 2 || x == self.n - 3;
        let along = if vertical { y } else { x };
        let to_a = (along - 2) % self.skip;
        let to_b = self.skip - to_a;
        let t = to_a as f32 / self.skip as f32;

        let (a, b) = if vertical {
            (field.get(x, y - to_a), field.get(x, y + to_b))
        } else {
            (field.get(x - to_a, y), field.get(x + to_b, y))
        };
        let a = elevation.evaluate(a);
        let b = elevation.evaluate(b);
        a * (1.0 - t) + b * t
    }
}

#[derive(Default)]
struct MeshAssembly {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    border_positions: Vec<Vec3>,
    border_triangles: Vec<[VertexSlot; 3]>,
}

impl MeshAssembly {
    fn push_vertex(&mut self, slot: VertexSlot, position: Vec3, uv: Vec2) {
        match slot {
            VertexSlot::Interior(i) => {
                debug_assert_eq!(i as usize, self.positions.len());
                self.positions.push(position);
                self.uvs.push(uv);
            }
            VertexSlot::Border(i) => {
                debug_assert_eq!(i as usize, self.border_positions.len());
                self.border_positions.push(position);
            }
            VertexSlot::Skipped => debug_assert!(false, "skipped grid points have no vertex"),
        }
    }

    fn add_triangle(&mut self, a: VertexSlot, b: VertexSlot, c: VertexSlot) {
        let corners = [a, b, c];
        debug_assert!(!corners.contains(&VertexSlot::Skipped));
        match corners {
            [
                VertexSlot::Interior(a),
                VertexSlot::Interior(b),
                VertexSlot::Interior(c),
            ] => self.triangles.extend_from_slice(&[a, b, c]),
            // Triangles entirely outside the mesh cannot affect any normal.
            _ if corners.iter().any(|s| matches!(s, VertexSlot::Interior(_))) => {
                self.border_triangles.push(corners)
            }
            _ => {}
        }
    }

    fn position(&self, slot: VertexSlot) -> Vec3 {
        match slot {
            VertexSlot::Interior(i) => self.positions[i as usize],
            VertexSlot::Border(i) => self.border_positions[i as usize],
            VertexSlot::Skipped => Vec3::ZERO,
        }
    }

    /// Area-weighted normals over interior and border triangles.
    fn smooth_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for tri in self.triangles.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let n = face_normal(self.positions[a], self.positions[b], self.positions[c]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }

        for tri in &self.border_triangles {
            let n = face_normal(
                self.position(tri[0]),
                self.position(tri[1]),
                self.position(tri[2]),
            );
            for slot in tri {
                if let VertexSlot::Interior(i) = *slot {
                    normals[i as usize] += n;
                }
            }
        }

        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        normals
    }

    fn into_smooth_mesh(self, lod: LodLevel) -> MeshData {
        let normals = self.smooth_normals();
        MeshData::new(self.positions, self.uvs, normals, self.triangles, lod, false)
    }

    /// One vertex per triangle corner so each face carries its own normal.
    fn into_flat_mesh(self, lod: LodLevel) -> MeshData {
        let corner_count = self.triangles.len();
        let mut positions = Vec::with_capacity(corner_count);
        let mut uvs = Vec::with_capacity(corner_count);
        let mut normals = Vec::with_capacity(corner_count);

        for tri in self.triangles.chunks_exact(3) {
            let corners = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = face_normal(
                self.positions[corners[0]],
                self.positions[corners[1]],
                self.positions[corners[2]],
            )
            .normalize_or_zero();
            for i in corners {
                positions.push(self.positions[i]);
                uvs.push(self.uvs[i]);
                normals.push(n);
            }
        }

        let indices = (0..corner_count as u32).collect();
        MeshData::new(positions, uvs, normals, indices, lod, true)
    }
}

/// Unnormalized face normal; its length is twice the triangle's area.
#[inline]
fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

fn assemble(
    field: &HeightField,
    lod: LodLevel,
    settings: &MeshSettings,
    elevation: &Elevation,
) -> MeshAssembly {
    let n = settings.vertices_per_line_with_border();
    debug_assert!(
        field.width() == n && field.height() == n,
        "height field is {}x{}, mesh settings expect {n}x{n}",
        field.width(),
        field.height()
    );

    let grid = Grid {
        n,
        skip: lod.skip_increment(),
    };
    let slots = grid.assign_slots();
    let slot = |x: usize, y: usize| slots[y * n + x];

    let world_size = settings.mesh_world_size();
    let top_left = Vec2::new(-world_size / 2.0, world_size / 2.0);
    let span = (n - 3) as f32;

    let mut assembly = MeshAssembly::default();

    for y in 0..n {
        for x in 0..n {
            let kind = grid.classify(x, y);
            if kind == PointKind::Skipped {
                continue;
            }

            let percent = Vec2::new((x as f32 - 1.0) / span, (y as f32 - 1.0) / span);
            let height = if kind == PointKind::EdgeConnection {
                grid.edge_connection_elevation(field, elevation, x, y)
            } else {
                elevation.evaluate(field.get(x, y))
            };
            let position = Vec3::new(
                top_left.x + percent.x * world_size,
                height,
                top_left.y - percent.y * world_size,
            );
            assembly.push_vertex(slot(x, y), position, percent);

            // Ring-2 points on the top and left edges would reach into skipped
            // points; their quads are emitted from the ring-1 strip instead.
            let emits_quad = x < n - 1
                && y < n - 1
                && (kind != PointKind::EdgeConnection || (x != 2 && y != 2));
            if emits_quad {
                let step = if kind == PointKind::Main && x != n - 3 && y != n - 3 {
                    grid.skip
                } else {
                    1
                };
                let a = slot(x, y);
                let b = slot(x + step, y);
                let c = slot(x, y + step);
                let d = slot(x + step, y + step);
                assembly.add_triangle(a, d, c);
                assembly.add_triangle(d, a, b);
            }
        }
    }

    assembly
}

/// Build the renderable mesh for `field` at `lod`.
///
/// `field` must be `vertices_per_line_with_border()` samples on each side.
pub fn build_terrain_mesh(
    field: &HeightField,
    lod: LodLevel,
    settings: &MeshSettings,
    elevation: &Elevation,
) -> MeshData {
    let assembly = assemble(field, lod, settings, elevation);
    if settings.flat_shading {
        assembly.into_flat_mesh(lod)
    } else {
        assembly.into_smooth_mesh(lod)
    }
}
