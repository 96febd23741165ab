//! Command-line argument parsing.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::audio::AudioSource;
use crate::error::{Result, VisualizerError};
use crate::params::{AnalyzerConfig, GridConfig, LoopConfig, ReadbackMode};

/// Signal to visualize
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Procedural Glicol composition
    Synth,
    /// Default input device
    Input,
    /// WAV file given with --wav
    File,
    /// No audio at all (flat grid)
    Silent,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "cubewave")]
#[command(about = "Audio-reactive procedural cube grid", long_about = None)]
pub struct Args {
    /// Audio source
    #[arg(long, value_enum, default_value = "synth")]
    pub source: SourceKind,

    /// WAV clip to loop (implies --source file)
    #[arg(long, value_name = "PATH")]
    pub wav: Option<PathBuf>,

    /// Number of logarithmic frequency bands (1-9)
    #[arg(long, default_value = "8")]
    pub bands: usize,

    /// Initial running-peak floor for every band
    #[arg(long, default_value = "0.5")]
    pub profile: f32,

    /// Cubes along X
    #[arg(long, default_value = "10")]
    pub width: u32,

    /// Cubes along Z
    #[arg(long, default_value = "10")]
    pub length: u32,

    /// Space between neighbouring cubes (world units)
    #[arg(long, default_value = "0.5")]
    pub gap: f32,

    /// Noise seed advance per second
    #[arg(long, value_name = "PER_SECOND", default_value = "1.0")]
    pub seed_speed: f32,

    /// Height scale of the audio displacement
    #[arg(long, default_value = "1.0")]
    pub amplitude: f32,

    /// Read back the previous frame's output instead of stalling on the current one
    #[arg(long)]
    pub pipelined: bool,

    /// Generate geometry on the CPU instead of the GPU
    #[arg(long)]
    pub cpu: bool,

    /// OpenSimplex seed for the CPU backend
    #[arg(long, default_value = "0")]
    pub noise_seed: u32,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f32>,

    /// Frame rate of the update loop (Hz)
    #[arg(long, value_name = "HZ", default_value = "60")]
    pub tick_rate: f32,

    /// Write the final mesh to a Wavefront OBJ file
    #[arg(long, value_name = "PATH")]
    pub export_obj: Option<PathBuf>,
}

impl Args {
    /// Resolve the audio source; `None` means run on silence
    pub fn audio_source(&self) -> Result<Option<AudioSource>> {
        match (&self.wav, self.source) {
            (Some(path), SourceKind::Synth | SourceKind::File) => {
                Ok(Some(AudioSource::File(path.clone())))
            }
            (Some(_), other) => Err(VisualizerError::Config(format!(
                "--wav conflicts with --source {:?}",
                other
            ))),
            (None, SourceKind::File) => Err(VisualizerError::Config(
                "--source file needs --wav PATH".to_string(),
            )),
            (None, SourceKind::Synth) => Ok(Some(AudioSource::Synth)),
            (None, SourceKind::Input) => Ok(Some(AudioSource::Input)),
            (None, SourceKind::Silent) => Ok(None),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            band_count: self.bands,
            audio_profile: self.profile,
        }
    }

    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            width: self.width,
            length: self.length,
            gap: self.gap,
            seed_change_speed: self.seed_speed,
            amplitude: self.amplitude,
            readback: if self.pipelined {
                ReadbackMode::Pipelined
            } else {
                ReadbackMode::Blocking
            },
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick_rate_hz: self.tick_rate,
            max_frames: self.frames,
            duration_secs: self.duration,
        }
    }
}
