//! CPU reference implementation of the displacement kernel.
//!
//! Follows the same buffer contract as `cube_kernel.wgsl` (cell order, corner
//! order, index list, draw args) so the bridge can run without a GPU. The
//! height field uses OpenSimplex noise and is not bit-identical to the shader.

use glam::Vec3;
use log::debug;
use noise::{NoiseFn, OpenSimplex};

use super::backend::{GeometryBackend, GeometryReadback, KernelParams};
use super::{
    GridLayout, Vertex, ARGS_COUNT, BASE_HEIGHT, CUBE_INDICES, INDICES_PER_CUBE, NOISE_SCALE,
    VERTICES_PER_CUBE, WORKGROUP_SIZE,
};
use crate::error::{Result, VisualizerError};

struct HostBuffers {
    layout: GridLayout,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    args: [u32; ARGS_COUNT],
    params: KernelParams,
}

/// Host-memory geometry backend
pub struct CpuBackend {
    simplex: OpenSimplex,
    buffers: Option<HostBuffers>,
}

impl CpuBackend {
    pub fn new(noise_seed: u32) -> Self {
        Self {
            simplex: OpenSimplex::new(noise_seed),
            buffers: None,
        }
    }

    /// Indirect draw args as last written by the kernel
    pub fn args(&self) -> Option<[u32; ARGS_COUNT]> {
        self.buffers.as_ref().map(|b| b.args)
    }

    /// Displaced height of the cube at cell `(x, z)`
    fn cube_height(&self, x: u32, z: u32, params: &KernelParams) -> f32 {
        let n = self.simplex.get([
            (x as f32 * NOISE_SCALE) as f64,
            (z as f32 * NOISE_SCALE) as f64,
            params.seed as f64,
        ]) as f32;

        // Map [-1, 1] noise to [0, 1]
        let n01 = (n * 0.5 + 0.5).clamp(0.0, 1.0);
        BASE_HEIGHT + n01 * params.amplitude * params.amplitude_buffer
    }

    /// Body of one kernel invocation: write the 8 vertices and 36 indices of a cube
    fn write_cube(&self, buffers: &mut HostBuffers, x: u32, z: u32, params: &KernelParams) {
        let cell = (z * params.width + x) as usize;
        let pitch = 1.0 + params.gap;
        let origin = Vec3::new(x as f32 * pitch, 0.0, z as f32 * pitch);
        let height = self.cube_height(x, z, params).max(0.0);
        let size = Vec3::new(1.0, height, 1.0);
        let center = origin + size * 0.5;

        let first_vertex = cell * VERTICES_PER_CUBE;
        for k in 0..VERTICES_PER_CUBE {
            let corner = Vec3::new(
                (k & 1) as f32,
                ((k >> 1) & 1) as f32,
                ((k >> 2) & 1) as f32,
            );
            let position = origin + corner * size;
            let normal = (position - center).normalize_or_zero();

            buffers.vertices[first_vertex + k] = Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
            };
        }

        let first_index = cell * INDICES_PER_CUBE;
        for (slot, corner) in CUBE_INDICES.iter().enumerate() {
            buffers.indices[first_index + slot] = first_vertex as u32 + corner;
        }
    }
}

impl GeometryBackend for CpuBackend {
    fn allocate(&mut self, layout: &GridLayout, params: &KernelParams) -> Result<()> {
        let mut vertices = Vec::new();
        vertices
            .try_reserve_exact(layout.vertex_count)
            .map_err(|e| VisualizerError::BufferAllocation {
                label: "vertex buffer",
                reason: e.to_string(),
            })?;
        vertices.resize(layout.vertex_count, Vertex::default());

        let mut indices = Vec::new();
        indices
            .try_reserve_exact(layout.index_count)
            .map_err(|e| VisualizerError::BufferAllocation {
                label: "index buffer",
                reason: e.to_string(),
            })?;
        indices.resize(layout.index_count, 0);

        self.buffers = Some(HostBuffers {
            layout: *layout,
            vertices,
            indices,
            args: [0; ARGS_COUNT],
            params: *params,
        });

        debug!(
            "CPU backend allocated {} vertices, {} indices",
            layout.vertex_count, layout.index_count
        );
        Ok(())
    }

    fn dispatch(&mut self, params: &KernelParams, workgroups: [u32; 2]) -> Result<()> {
        let mut buffers = self.buffers.take().ok_or(VisualizerError::InvalidPhase {
            operation: "dispatch",
            phase: "unallocated",
        })?;

        // Static uniforms stay as bound at allocation
        let params = KernelParams {
            width: buffers.params.width,
            length: buffers.params.length,
            gap: buffers.params.gap,
            ..*params
        };

        let threads_x = workgroups[0] * WORKGROUP_SIZE;
        let threads_z = workgroups[1] * WORKGROUP_SIZE;

        for z in 0..threads_z {
            for x in 0..threads_x {
                // Threads past the grid edge do nothing, as in the shader
                if x >= params.width || z >= params.length {
                    continue;
                }
                self.write_cube(&mut buffers, x, z, &params);
                if x == 0 && z == 0 {
                    buffers.args = buffers.layout.draw_args();
                }
            }
        }

        self.buffers = Some(buffers);
        Ok(())
    }

    fn read_back(&mut self) -> Result<GeometryReadback> {
        let buffers = self.buffers.as_ref().ok_or(VisualizerError::InvalidPhase {
            operation: "read back",
            phase: "unallocated",
        })?;

        Ok(GeometryReadback {
            vertices: buffers.vertices.clone(),
            indices: buffers.indices.clone(),
        })
    }

    fn release(&mut self) {
        if self.buffers.take().is_some() {
            debug!("CPU backend buffers released");
        }
    }

    fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}
