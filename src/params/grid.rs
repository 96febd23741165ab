//! Cube grid dimensions and audio-reactive displacement parameters.

use crate::error::{Result, VisualizerError};

/// How the host copy of the generated geometry is obtained each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadbackMode {
    /// Stall until this frame's dispatch is complete, then copy it
    #[default]
    Blocking,

    /// Dispatch frame N while copying frame N-1 from a second staging set
    Pipelined,
}

/// Procedural cube grid parameters (immutable once the bridge starts)
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Cubes along X
    pub width: u32,

    /// Cubes along Z
    pub length: u32,

    /// Spacing between neighbouring cubes (world units, cube edge = 1.0)
    pub gap: f32,

    /// Seed advance per second of frame time
    pub seed_change_speed: f32,

    /// Static displacement scale, multiplied by the analyzer's amplitude buffer on the GPU
    pub amplitude: f32,

    pub readback: ReadbackMode,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 10,
            length: 10,
            gap: 0.5,
            seed_change_speed: 1.0,
            amplitude: 1.0,
            readback: ReadbackMode::Blocking,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.length == 0 {
            return Err(VisualizerError::Config(format!(
                "Grid must be at least 1x1, got {}x{}",
                self.width, self.length
            )));
        }
        // 36 indices per cube must stay addressable as u32
        let cubes = self.width as u64 * self.length as u64;
        if cubes * 36 > u32::MAX as u64 {
            return Err(VisualizerError::Config(format!(
                "Grid {}x{} exceeds the u32 index range",
                self.width, self.length
            )));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(VisualizerError::Config(format!(
                "Gap must be a finite value >= 0, got {}",
                self.gap
            )));
        }
        if !self.seed_change_speed.is_finite() || self.seed_change_speed < 0.0 {
            return Err(VisualizerError::Config(format!(
                "Seed change speed must be a finite value >= 0, got {}",
                self.seed_change_speed
            )));
        }
        if !self.amplitude.is_finite() {
            return Err(VisualizerError::Config(format!(
                "Amplitude must be finite, got {}",
                self.amplitude
            )));
        }
        Ok(())
    }
}
