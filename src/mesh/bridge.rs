//! Lifecycle of the procedural cube grid: allocate, regenerate every frame, release.

use log::{debug, info, warn};

use super::backend::{GeometryBackend, GeometryReadback, KernelParams};
use super::target::MeshTarget;
use super::{GridLayout, Mesh};
use crate::analysis::AudioSignal;
use crate::error::{Result, VisualizerError};
use crate::params::GridConfig;

/// Init -> SteadyState -> Teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    /// Created, buffers not allocated yet
    Idle,
    /// Buffers allocated, ticking every frame
    Running,
    /// Buffers released; no further use
    Released,
}

impl BridgePhase {
    fn as_str(self) -> &'static str {
        match self {
            BridgePhase::Idle => "idle",
            BridgePhase::Running => "running",
            BridgePhase::Released => "released",
        }
    }
}

/// Drives a geometry backend from the audio signal and mirrors its output into a mesh
pub struct ProceduralMeshBridge<B: GeometryBackend, T: MeshTarget> {
    config: GridConfig,
    layout: GridLayout,
    backend: B,
    target: T,
    mesh: Mesh,
    params: KernelParams,
    seed: f32,
    phase: BridgePhase,
    frames: u64,
}

impl<B: GeometryBackend, T: MeshTarget> ProceduralMeshBridge<B, T> {
    pub fn new(config: GridConfig, backend: B, target: T) -> Result<Self> {
        config.validate()?;
        let layout = GridLayout::new(config.width, config.length);
        let params = KernelParams {
            width: config.width,
            length: config.length,
            gap: config.gap,
            amplitude: config.amplitude,
            ..Default::default()
        };

        Ok(Self {
            config,
            layout,
            backend,
            target,
            mesh: Mesh::default(),
            params,
            seed: 0.0,
            phase: BridgePhase::Idle,
            frames: 0,
        })
    }

    /// Allocate buffers, bind static uniforms and attach an empty mesh to the target
    pub fn init(&mut self) -> Result<()> {
        self.expect_phase(BridgePhase::Idle, "init")?;

        if let Err(e) = self.backend.allocate(&self.layout, &self.params) {
            // No degraded mode: whatever was created goes away with the bridge
            self.backend.release();
            self.phase = BridgePhase::Released;
            return Err(e);
        }

        self.mesh = Mesh::default();
        self.target.attach(&self.mesh);
        self.phase = BridgePhase::Running;

        info!(
            "Cube grid {}x{} on {} backend: {} cubes, {} vertices, {} indices",
            self.layout.width,
            self.layout.length,
            self.backend.name(),
            self.layout.cube_count,
            self.layout.vertex_count,
            self.layout.index_count
        );
        Ok(())
    }

    /// Advance the seed, run the kernel, read its output back and republish the mesh
    pub fn tick(&mut self, delta_s: f32, signal: AudioSignal) -> Result<()> {
        self.expect_phase(BridgePhase::Running, "tick")?;

        if delta_s > 0.0 {
            self.seed += delta_s * self.config.seed_change_speed;
        }

        self.params.seed = self.seed;
        self.params.amplitude_buffer = signal.amplitude_buffer;
        self.params.amplitude = self.config.amplitude;

        self.backend.dispatch(&self.params, self.layout.workgroups())?;
        let readback = self.backend.read_back()?;
        self.verify(&readback)?;

        self.mesh.rebuild(&readback);
        self.target.publish(&self.mesh);
        self.frames += 1;

        debug!(
            "frame {}: seed {:.3}, amplitude buffer {:.3}",
            self.frames, self.seed, signal.amplitude_buffer
        );
        Ok(())
    }

    /// Release every buffer. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.phase == BridgePhase::Released {
            return;
        }
        self.backend.release();
        self.phase = BridgePhase::Released;
        info!("Cube grid released after {} frames", self.frames);
    }

    /// Readback must cover the allocated extents exactly and only reference real vertices
    fn verify(&self, readback: &GeometryReadback) -> Result<()> {
        if readback.vertices.len() != self.layout.vertex_count {
            return Err(VisualizerError::GeometryMismatch {
                what: "vertices",
                expected: self.layout.vertex_count,
                actual: readback.vertices.len(),
            });
        }
        if readback.indices.len() != self.layout.index_count {
            return Err(VisualizerError::GeometryMismatch {
                what: "indices",
                expected: self.layout.index_count,
                actual: readback.indices.len(),
            });
        }
        if let Some(&bad) = readback
            .indices
            .iter()
            .find(|&&i| i as usize >= self.layout.vertex_count)
        {
            return Err(VisualizerError::Readback(format!(
                "index {} out of range for {} vertices",
                bad, self.layout.vertex_count
            )));
        }
        Ok(())
    }

    fn expect_phase(&self, expected: BridgePhase, operation: &'static str) -> Result<()> {
        if self.phase != expected {
            return Err(VisualizerError::InvalidPhase {
                operation,
                phase: self.phase.as_str(),
            });
        }
        Ok(())
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn seed(&self) -> f32 {
        self.seed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<B: GeometryBackend, T: MeshTarget> Drop for ProceduralMeshBridge<B, T> {
    fn drop(&mut self) {
        if self.phase == BridgePhase::Running {
            warn!("Cube grid dropped without shutdown; releasing buffers");
        }
        self.shutdown();
    }
}
