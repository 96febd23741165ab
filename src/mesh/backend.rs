//! Buffer contract shared by the GPU kernel and its CPU reference.

use bytemuck::{Pod, Zeroable};

use super::{GridLayout, Vertex};
use crate::error::Result;

/// Uniform block of the displacement kernel (matches `Params` in the shader)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct KernelParams {
    pub width: u32,
    pub length: u32,
    pub gap: f32,
    pub seed: f32,
    pub amplitude: f32,
    pub amplitude_buffer: f32,
    pub _padding: [f32; 2], // Pad to 32 bytes for uniform alignment
}

/// One frame of generated geometry copied back to the host
#[derive(Debug, Clone, Default)]
pub struct GeometryReadback {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Owner of the vertex, index and indirect-args buffers and the kernel that fills them
pub trait GeometryBackend {
    /// Allocate buffers sized exactly to `layout` and bind the static uniforms
    fn allocate(&mut self, layout: &GridLayout, params: &KernelParams) -> Result<()>;

    /// Run the kernel over `workgroups` 8x8 groups with this frame's uniforms
    fn dispatch(&mut self, params: &KernelParams, workgroups: [u32; 2]) -> Result<()>;

    /// Copy the full vertex and index buffers back to the host
    fn read_back(&mut self) -> Result<GeometryReadback>;

    /// Free every buffer; calling it again is a no-op
    fn release(&mut self);

    fn is_allocated(&self) -> bool;

    fn name(&self) -> &'static str;
}
