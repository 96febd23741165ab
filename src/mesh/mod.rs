//! Procedural cube grid generated by a compute kernel and mirrored into a host mesh.

mod backend;
mod bridge;
mod cpu;
mod gpu;
pub mod obj;
mod target;

// Re-export public types
pub use backend::{GeometryBackend, GeometryReadback, KernelParams};
pub use bridge::{BridgePhase, ProceduralMeshBridge};
pub use cpu::CpuBackend;
pub use gpu::GpuBackend;
pub use target::{MeshStats, MeshTarget};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Corners per cube
pub const VERTICES_PER_CUBE: usize = 8;

/// 6 faces x 2 triangles x 3 indices
pub const INDICES_PER_CUBE: usize = 36;

/// Kernel threads per workgroup along X and Z (must match `@workgroup_size` in the shader)
pub const WORKGROUP_SIZE: u32 = 8;

/// Entries in the indirect draw-args buffer
pub const ARGS_COUNT: usize = 5;

/// Cube height before audio displacement (world units)
pub const BASE_HEIGHT: f32 = 1.0;

/// Spatial scale of the displacement noise (per cube cell)
pub const NOISE_SCALE: f32 = 0.35;

/// Triangle list for one cube, outward-facing and counter-clockwise.
///
/// Corner `k` sits at `(k & 1, (k >> 1) & 1, (k >> 2) & 1)`.
pub const CUBE_INDICES: [u32; INDICES_PER_CUBE] = [
    0, 2, 3, 0, 3, 1, // -Z
    4, 5, 7, 4, 7, 6, // +Z
    0, 4, 6, 0, 6, 2, // -X
    1, 3, 7, 1, 7, 5, // +X
    0, 1, 5, 0, 5, 4, // -Y
    2, 6, 7, 2, 7, 3, // +Y
];

/// Kernel output vertex (position + normal, 6 floats)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Buffer extents derived from the grid dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub width: u32,
    pub length: u32,
    pub cube_count: usize,
    pub vertex_count: usize,
    pub index_count: usize,
}

impl GridLayout {
    pub fn new(width: u32, length: u32) -> Self {
        let cube_count = width as usize * length as usize;
        Self {
            width,
            length,
            cube_count,
            vertex_count: cube_count * VERTICES_PER_CUBE,
            index_count: cube_count * INDICES_PER_CUBE,
        }
    }

    /// Workgroups needed to cover every cell, rounding partial groups up
    pub fn workgroups(&self) -> [u32; 2] {
        [
            self.width.div_ceil(WORKGROUP_SIZE),
            self.length.div_ceil(WORKGROUP_SIZE),
        ]
    }

    pub fn vertex_bytes(&self) -> u64 {
        (self.vertex_count * std::mem::size_of::<Vertex>()) as u64
    }

    pub fn index_bytes(&self) -> u64 {
        (self.index_count * std::mem::size_of::<u32>()) as u64
    }

    /// Indirect draw arguments: index count, one instance, no offsets
    pub fn draw_args(&self) -> [u32; ARGS_COUNT] {
        [self.index_count as u32, 1, 0, 0, 0]
    }
}

/// Host-side renderable rebuilt from kernel output every frame
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub triangles: Vec<u32>,
}

impl Mesh {
    /// Replace the mesh contents with one frame of interleaved kernel output
    pub fn rebuild(&mut self, readback: &GeometryReadback) {
        self.positions.clear();
        self.normals.clear();
        self.triangles.clear();

        self.positions
            .extend(readback.vertices.iter().map(|v| Vec3::from_array(v.position)));
        self.normals
            .extend(readback.vertices.iter().map(|v| Vec3::from_array(v.normal)));
        self.triangles.extend_from_slice(&readback.indices);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Tallest vertex (the audio-driven part of the grid)
    pub fn max_height(&self) -> f32 {
        self.positions
            .iter()
            .map(|p| p.y)
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout_counts() {
        let layout = GridLayout::new(2, 2);

        assert_eq!(layout.cube_count, 4);
        assert_eq!(layout.vertex_count, 32);
        assert_eq!(layout.index_count, 144);
        assert_eq!(layout.vertex_bytes(), 32 * 24);
        assert_eq!(layout.draw_args(), [144, 1, 0, 0, 0]);
    }

    #[test]
    fn test_workgroups_round_up() {
        assert_eq!(GridLayout::new(2, 2).workgroups(), [1, 1]);
        assert_eq!(GridLayout::new(8, 16).workgroups(), [1, 2]);
        assert_eq!(GridLayout::new(10, 10).workgroups(), [2, 2]);
        assert_eq!(GridLayout::new(17, 9).workgroups(), [3, 2]);
    }

    #[test]
    fn test_vertex_is_six_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), 6 * std::mem::size_of::<f32>());
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let corner = |k: u32| {
            Vec3::new(
                (k & 1) as f32,
                ((k >> 1) & 1) as f32,
                ((k >> 2) & 1) as f32,
            )
        };
        let center = Vec3::splat(0.5);

        for tri in CUBE_INDICES.chunks(3) {
            let (a, b, c) = (corner(tri[0]), corner(tri[1]), corner(tri[2]));
            let normal = (b - a).cross(c - a);
            let face_center = (a + b + c) / 3.0;
            assert!(normal.dot(face_center - center) > 0.0, "inward face {:?}", tri);
        }
    }

    #[test]
    fn test_mesh_rebuild_deinterleaves() {
        let readback = GeometryReadback {
            vertices: vec![
                Vertex {
                    position: [1.0, 2.0, 3.0],
                    normal: [0.0, 1.0, 0.0],
                },
                Vertex {
                    position: [4.0, 5.0, 6.0],
                    normal: [1.0, 0.0, 0.0],
                },
            ],
            indices: vec![0, 1, 0],
        };
        let mut mesh = Mesh::default();

        mesh.rebuild(&readback);
        mesh.rebuild(&readback);

        assert_eq!(mesh.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
        assert_eq!(mesh.normals[1], Vec3::X);
        assert_eq!(mesh.triangles, vec![0, 1, 0]);
        assert_eq!(mesh.max_height(), 5.0);
    }
}
