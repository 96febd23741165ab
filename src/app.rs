//! Visualizer: spectrum source -> analyzer -> procedural cube grid.

use std::path::Path;

use log::info;

use crate::analysis::{SpectrumAnalyzer, SpectrumSource};
use crate::error::Result;
use crate::mesh::{obj, GeometryBackend, Mesh, MeshTarget, ProceduralMeshBridge};
use crate::params::{AnalyzerConfig, GridConfig};
use crate::scheduler::FrameHooks;

/// Main application state
pub struct Visualizer<S: SpectrumSource, B: GeometryBackend, T: MeshTarget> {
    /// `None` runs the grid on silence
    source: Option<S>,
    analyzer: SpectrumAnalyzer,
    bridge: ProceduralMeshBridge<B, T>,
}

impl<S: SpectrumSource, B: GeometryBackend, T: MeshTarget> Visualizer<S, B, T> {
    pub fn new(
        source: Option<S>,
        analyzer_config: AnalyzerConfig,
        grid_config: GridConfig,
        backend: B,
        target: T,
    ) -> Result<Self> {
        Ok(Self {
            source,
            analyzer: SpectrumAnalyzer::new(analyzer_config)?,
            bridge: ProceduralMeshBridge::new(grid_config, backend, target)?,
        })
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    pub fn bridge(&self) -> &ProceduralMeshBridge<B, T> {
        &self.bridge
    }

    pub fn mesh(&self) -> &Mesh {
        self.bridge.mesh()
    }

    /// Write the last published mesh as Wavefront OBJ
    pub fn export_obj(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        obj::save_obj(self.mesh(), path)?;
        info!(
            "Exported {} vertices, {} triangles to {}",
            self.mesh().vertex_count(),
            self.mesh().triangle_count(),
            path.display()
        );
        Ok(())
    }
}

impl<S: SpectrumSource, B: GeometryBackend, T: MeshTarget> FrameHooks for Visualizer<S, B, T> {
    fn on_init(&mut self) -> Result<()> {
        self.bridge.init()
    }

    fn on_tick(&mut self, delta_s: f32) -> Result<()> {
        // Missing frames keep the previous band state
        self.analyzer.update(self.source.as_ref());
        self.bridge.tick(delta_s, self.analyzer.signal())
    }

    fn on_shutdown(&mut self) {
        self.bridge.shutdown();
    }
}
