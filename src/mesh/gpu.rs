//! wgpu compute backend: runs `cube_kernel.wgsl` and maps the results back.

use futures::channel::oneshot;
use log::{debug, info};
use wgpu::util::DeviceExt;

use super::backend::{GeometryBackend, GeometryReadback, KernelParams};
use super::{GridLayout, Vertex, ARGS_COUNT};
use crate::error::{Result, VisualizerError};
use crate::params::ReadbackMode;

/// Pair of host-mappable copies of the geometry buffers
struct StagingSet {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    /// Submission that last copied into this set and has not been read yet
    pending: Option<wgpu::SubmissionIndex>,
}

/// Device-side buffers for one grid, released together
struct GeometryBuffers {
    layout: GridLayout,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    args: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// One set when blocking, two when pipelined
    staging: Vec<StagingSet>,
    /// Staging set the next dispatch copies into
    cursor: usize,
    /// Last readback, served while the pipelined path has nothing older to map
    last: Option<GeometryReadback>,
}

impl GeometryBuffers {
    fn destroy(self) {
        self.vertex.destroy();
        self.index.destroy();
        self.args.destroy();
        self.params.destroy();
        for set in &self.staging {
            set.vertex.destroy();
            set.index.destroy();
        }
    }
}

/// Where a pipelined frame's readback comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelinedRead {
    /// Map this staging set
    Collect(usize),
    /// Re-serve the last readback (its set was already consumed)
    Cached,
}

/// Advance the pipelined cursor after a dispatch into `cursor`.
///
/// Returns the cursor for the next dispatch and where this frame's data comes from.
/// The set just written stays in flight; the other one is read if it holds an
/// unread copy. The very first frame has nothing older, so it reads `cursor` itself.
fn pipelined_step(cursor: usize, pending: [bool; 2], has_last: bool) -> (usize, PipelinedRead) {
    let previous = 1 - cursor;
    let read = if pending[previous] {
        PipelinedRead::Collect(previous)
    } else if has_last {
        PipelinedRead::Cached
    } else {
        PipelinedRead::Collect(cursor)
    };
    (previous, read)
}

/// GPU geometry backend
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    mode: ReadbackMode,
    buffers: Option<GeometryBuffers>,
}

impl GpuBackend {
    /// Open a headless device and build the compute pipeline
    pub async fn new(mode: ReadbackMode) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| VisualizerError::GpuInit("Failed to find GPU adapter".to_string()))?;

        let info = adapter.get_info();
        info!("GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Cube Kernel Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| VisualizerError::GpuInit(format!("Failed to request device: {}", e)))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cube Kernel Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("cube_kernel.wgsl").into()),
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cube Kernel Bind Group Layout"),
            entries: &[
                storage_entry(0),
                storage_entry(1),
                storage_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cube Kernel Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cube Kernel Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(VisualizerError::GpuInit(format!(
                "Cube kernel pipeline rejected: {}",
                error
            )));
        }

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            mode,
            buffers: None,
        })
    }

    /// Blocking constructor for callers outside an async context
    pub fn new_blocking(mode: ReadbackMode) -> Result<Self> {
        pollster::block_on(Self::new(mode))
    }

    /// Device-side vertex, index and args buffers, for drawing straight from GPU memory
    pub fn draw_buffers(&self) -> Option<(&wgpu::Buffer, &wgpu::Buffer, &wgpu::Buffer)> {
        self.buffers
            .as_ref()
            .map(|b| (&b.vertex, &b.index, &b.args))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn check_size(&self, label: &'static str, size: u64) -> Result<()> {
        let limits = self.device.limits();
        let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if size > max {
            return Err(VisualizerError::BufferAllocation {
                label,
                reason: format!("{} bytes exceeds device limit of {} bytes", size, max),
            });
        }
        Ok(())
    }

    fn create_staging(&self, layout: &GridLayout, slot: usize) -> StagingSet {
        let vertex = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(if slot == 0 {
                "Vertex Staging Buffer 0"
            } else {
                "Vertex Staging Buffer 1"
            }),
            size: layout.vertex_bytes(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(if slot == 0 {
                "Index Staging Buffer 0"
            } else {
                "Index Staging Buffer 1"
            }),
            size: layout.index_bytes(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        StagingSet {
            vertex,
            index,
            pending: None,
        }
    }

    /// Wait for the copy into `slot` to land and pull both buffers into host memory
    fn collect(device: &wgpu::Device, set: &mut StagingSet) -> Result<GeometryReadback> {
        let Some(submission) = set.pending.take() else {
            return Err(VisualizerError::Readback(
                "staging set has no pending copy".to_string(),
            ));
        };

        let vertex_slice = set.vertex.slice(..);
        let index_slice = set.index.slice(..);

        let (vertex_tx, vertex_rx) = oneshot::channel();
        let (index_tx, index_rx) = oneshot::channel();
        vertex_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = vertex_tx.send(result);
        });
        index_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = index_tx.send(result);
        });

        // Synchronous stall point: only this submission has to finish
        device.poll(wgpu::Maintain::wait_for(submission));

        for rx in [vertex_rx, index_rx] {
            pollster::block_on(rx)
                .map_err(|_| VisualizerError::Readback("map callback dropped".to_string()))?
                .map_err(|e| VisualizerError::Readback(e.to_string()))?;
        }

        let readback = {
            let vertex_data = vertex_slice.get_mapped_range();
            let index_data = index_slice.get_mapped_range();
            GeometryReadback {
                vertices: bytemuck::cast_slice::<u8, Vertex>(&vertex_data).to_vec(),
                indices: bytemuck::cast_slice::<u8, u32>(&index_data).to_vec(),
            }
        };

        set.vertex.unmap();
        set.index.unmap();

        Ok(readback)
    }
}

impl GeometryBackend for GpuBackend {
    fn allocate(&mut self, layout: &GridLayout, params: &KernelParams) -> Result<()> {
        self.check_size("vertex buffer", layout.vertex_bytes())?;
        self.check_size("index buffer", layout.index_bytes())?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let vertex = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Vertex Buffer"),
            size: layout.vertex_bytes(),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let index = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Index Buffer"),
            size: layout.index_bytes(),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let args = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Args Buffer"),
                contents: bytemuck::cast_slice(&layout.draw_args()),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
            });

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Kernel Params Buffer"),
                contents: bytemuck::cast_slice(&[*params]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let staging_sets = match self.mode {
            ReadbackMode::Blocking => 1,
            ReadbackMode::Pipelined => 2,
        };
        let staging: Vec<StagingSet> = (0..staging_sets)
            .map(|slot| self.create_staging(layout, slot))
            .collect();

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            // Partially created buffers are dropped here
            return Err(VisualizerError::BufferAllocation {
                label: "geometry buffers",
                reason: error.to_string(),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cube Kernel Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: vertex.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: index.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: args.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        info!(
            "GPU buffers: {} vertices ({} KiB), {} indices ({} KiB), {} args",
            layout.vertex_count,
            layout.vertex_bytes() / 1024,
            layout.index_count,
            layout.index_bytes() / 1024,
            ARGS_COUNT
        );

        self.buffers = Some(GeometryBuffers {
            layout: *layout,
            vertex,
            index,
            args,
            params: params_buffer,
            bind_group,
            staging,
            cursor: 0,
            last: None,
        });
        Ok(())
    }

    fn dispatch(&mut self, params: &KernelParams, workgroups: [u32; 2]) -> Result<()> {
        let buffers = self.buffers.as_mut().ok_or(VisualizerError::InvalidPhase {
            operation: "dispatch",
            phase: "unallocated",
        })?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        self.queue
            .write_buffer(&buffers.params, 0, bytemuck::cast_slice(&[*params]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cube Kernel Encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Cube Kernel Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &buffers.bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroups[0], workgroups[1], 1);
        }

        let set = &buffers.staging[buffers.cursor];
        encoder.copy_buffer_to_buffer(
            &buffers.vertex,
            0,
            &set.vertex,
            0,
            buffers.layout.vertex_bytes(),
        );
        encoder.copy_buffer_to_buffer(
            &buffers.index,
            0,
            &set.index,
            0,
            buffers.layout.index_bytes(),
        );

        let submission = self.queue.submit(Some(encoder.finish()));

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(VisualizerError::Dispatch(error.to_string()));
        }

        buffers.staging[buffers.cursor].pending = Some(submission);
        Ok(())
    }

    fn read_back(&mut self) -> Result<GeometryReadback> {
        let buffers = self.buffers.as_mut().ok_or(VisualizerError::InvalidPhase {
            operation: "read back",
            phase: "unallocated",
        })?;

        let readback = match self.mode {
            ReadbackMode::Blocking => {
                Self::collect(&self.device, &mut buffers.staging[buffers.cursor])?
            }
            ReadbackMode::Pipelined => {
                let pending = [
                    buffers.staging[0].pending.is_some(),
                    buffers.staging[1].pending.is_some(),
                ];
                let (next, read) = pipelined_step(buffers.cursor, pending, buffers.last.is_some());
                let current = buffers.cursor;
                buffers.cursor = next;

                match (read, buffers.last.take()) {
                    (PipelinedRead::Cached, Some(last)) => last,
                    (PipelinedRead::Collect(slot), _) => {
                        if slot == current {
                            debug!("Pipelined readback priming with a blocking read");
                        }
                        Self::collect(&self.device, &mut buffers.staging[slot])?
                    }
                    (PipelinedRead::Cached, None) => {
                        return Err(VisualizerError::Readback(
                            "no cached readback to serve".to_string(),
                        ))
                    }
                }
            }
        };

        if self.mode == ReadbackMode::Pipelined {
            buffers.last = Some(readback.clone());
        }

        Ok(readback)
    }

    fn release(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            buffers.destroy();
            info!("GPU geometry buffers released");
        }
    }

    fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{INDICES_PER_CUBE, VERTICES_PER_CUBE, WORKGROUP_SIZE};

    fn params(layout: &GridLayout) -> KernelParams {
        KernelParams {
            width: layout.width,
            length: layout.length,
            gap: 0.5,
            seed: 1.0,
            amplitude: 1.0,
            amplitude_buffer: 0.5,
            ..Default::default()
        }
    }

    fn kernel_module() -> naga::Module {
        let module = naga::front::wgsl::parse_str(include_str!("cube_kernel.wgsl"))
            .expect("cube kernel should parse");
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .expect("cube kernel should validate");
        module
    }

    #[test]
    fn test_kernel_entry_point() {
        let module = kernel_module();

        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.name == "main")
            .expect("main entry point");
        assert_eq!(entry.stage, naga::ShaderStage::Compute);
        assert_eq!(entry.workgroup_size, [WORKGROUP_SIZE, WORKGROUP_SIZE, 1]);
    }

    #[test]
    fn test_kernel_params_layout_matches_host() {
        let module = kernel_module();

        let params = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some("Params"))
            .map(|(_, ty)| &ty.inner)
            .expect("Params struct");
        match params {
            naga::TypeInner::Struct { members, span } => {
                assert_eq!(members.len(), 8);
                assert_eq!(*span as usize, std::mem::size_of::<KernelParams>());
            }
            other => panic!("Params is not a struct: {:?}", other),
        }
    }

    #[test]
    fn test_kernel_bindings() {
        let module = kernel_module();

        let mut bindings: Vec<(String, u32)> = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| {
                let binding = var.binding.as_ref()?;
                assert_eq!(binding.group, 0);
                Some((var.name.clone().unwrap_or_default(), binding.binding))
            })
            .collect();
        bindings.sort_by_key(|(_, slot)| *slot);
        let names: Vec<&str> = bindings.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            ["vertex_buffer", "index_buffer", "args_buffer", "params"]
        );

        let (_, args) = module
            .global_variables
            .iter()
            .find(|(_, var)| var.name.as_deref() == Some("args_buffer"))
            .expect("args buffer");
        match &module.types[args.ty].inner {
            naga::TypeInner::Array {
                size: naga::ArraySize::Constant(len),
                ..
            } => assert_eq!(len.get() as usize, ARGS_COUNT),
            other => panic!("args buffer is not a fixed array: {:?}", other),
        }
    }

    #[test]
    fn test_pipelined_step_lags_one_frame() {
        // Frame 1: nothing older in flight, read the fresh set directly
        assert_eq!(
            pipelined_step(0, [true, false], false),
            (1, PipelinedRead::Collect(0))
        );
        // Frame 2: set 0 was consumed while priming, re-serve the cached frame
        assert_eq!(
            pipelined_step(1, [false, true], true),
            (0, PipelinedRead::Cached)
        );
        // Frame 3 onwards: read the set written one frame earlier
        assert_eq!(
            pipelined_step(0, [true, true], true),
            (1, PipelinedRead::Collect(1))
        );
        assert_eq!(
            pipelined_step(1, [true, true], true),
            (0, PipelinedRead::Collect(0))
        );
    }

    #[test]
    fn test_pipelined_step_alternates_sets() {
        let mut cursor = 0;
        let mut pending = [false; 2];
        let mut has_last = false;
        let mut reads = Vec::new();

        for _ in 0..6 {
            pending[cursor] = true;
            let (next, read) = pipelined_step(cursor, pending, has_last);
            if let PipelinedRead::Collect(slot) = read {
                pending[slot] = false;
            }
            reads.push(read);
            has_last = true;
            cursor = next;
        }

        assert_eq!(
            reads,
            [
                PipelinedRead::Collect(0),
                PipelinedRead::Cached,
                PipelinedRead::Collect(1),
                PipelinedRead::Collect(0),
                PipelinedRead::Collect(1),
                PipelinedRead::Collect(0),
            ]
        );
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_oversized_dispatch_is_an_error() {
        let layout = GridLayout::new(1, 1);
        let params = params(&layout);
        let mut backend = GpuBackend::new_blocking(ReadbackMode::Blocking).unwrap();
        backend.allocate(&layout, &params).unwrap();

        let too_many = backend.device().limits().max_compute_workgroups_per_dimension + 1;
        assert!(matches!(
            backend.dispatch(&params, [too_many, 1]),
            Err(VisualizerError::Dispatch(_))
        ));
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_gpu_kernel_fills_buffers() {
        let layout = GridLayout::new(9, 3);
        let params = params(&layout);
        let mut backend = GpuBackend::new_blocking(ReadbackMode::Blocking).unwrap();

        backend.allocate(&layout, &params).unwrap();
        backend.dispatch(&params, layout.workgroups()).unwrap();
        let readback = backend.read_back().unwrap();

        assert_eq!(readback.vertices.len(), layout.vertex_count);
        assert_eq!(readback.indices.len(), layout.index_count);
        for (cell, cube) in readback.indices.chunks(INDICES_PER_CUBE).enumerate() {
            let first = (cell * VERTICES_PER_CUBE) as u32;
            assert!(cube.iter().all(|&i| i >= first && i < first + 8));
        }

        backend.release();
        backend.release();
        assert!(!backend.is_allocated());
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_pipelined_readback_lags_one_frame() {
        let layout = GridLayout::new(4, 4);
        let mut backend = GpuBackend::new_blocking(ReadbackMode::Pipelined).unwrap();
        backend.allocate(&layout, &params(&layout)).unwrap();

        for seed in 0..4 {
            let frame = KernelParams {
                seed: seed as f32,
                ..params(&layout)
            };
            backend.dispatch(&frame, layout.workgroups()).unwrap();
            let readback = backend.read_back().unwrap();
            assert_eq!(readback.vertices.len(), layout.vertex_count);
        }
    }
}
