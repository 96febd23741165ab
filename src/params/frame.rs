//! Frame loop and export configuration.

use std::time::Duration;

use crate::error::{Result, VisualizerError};

/// Frame loop configuration
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Target ticks per second
    pub tick_rate_hz: f32,

    /// Stop after this many ticks
    pub max_frames: Option<u64>,

    /// Stop after this much wall-clock time (seconds)
    pub duration_secs: Option<f32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            max_frames: None,
            duration_secs: None,
        }
    }
}

impl LoopConfig {
    /// Wall-clock budget of a single tick
    pub fn tick_interval(&self) -> Result<Duration> {
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(VisualizerError::Config(format!(
                "Tick rate must be > 0 Hz, got {}",
                self.tick_rate_hz
            )));
        }
        Duration::try_from_secs_f32(1.0 / self.tick_rate_hz).map_err(|e| {
            VisualizerError::Config(format!(
                "Tick rate {} Hz gives an unrepresentable interval: {}",
                self.tick_rate_hz, e
            ))
        })
    }

    /// Wall-clock limit of the whole run, if any
    pub fn time_limit(&self) -> Result<Option<Duration>> {
        let Some(duration) = self.duration_secs else {
            return Ok(None);
        };
        if !duration.is_finite() || duration < 0.0 {
            return Err(VisualizerError::Config(format!(
                "Duration must be >= 0 seconds, got {}",
                duration
            )));
        }
        Duration::try_from_secs_f32(duration)
            .map(Some)
            .map_err(|e| {
                VisualizerError::Config(format!("Duration {}s is out of range: {}", duration, e))
            })
    }

    pub fn validate(&self) -> Result<()> {
        self.tick_interval()?;
        self.time_limit()?;
        Ok(())
    }
}
