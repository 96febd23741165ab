//! Where the analyzed signal comes from.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Result, VisualizerError};

/// Audio feeding the spectrum analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Procedural Glicol composition on the default output device
    Synth,
    /// Default input device (microphone or loopback)
    Input,
    /// WAV clip played on a loop through the default output device
    File(PathBuf),
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::Synth => write!(f, "synth"),
            AudioSource::Input => write!(f, "input"),
            AudioSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Decoded mono clip
#[derive(Debug, Clone)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Clip {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)
            .map_err(|e| VisualizerError::Audio(format!("{}: {}", path.display(), e)))?;
        Self::decode(reader)
    }

    /// Decode any PCM or float WAV and average its channels down to mono
    pub fn decode<R: Read>(mut reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>(),
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<_, _>>()
            }
        }
        .map_err(|e| VisualizerError::Audio(format!("WAV decode failed: {}", e)))?;

        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        if samples.is_empty() {
            return Err(VisualizerError::Audio("WAV file contains no samples".to_string()));
        }

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Endless playback cursor over a clip, resampled to the device rate
#[derive(Debug, Clone)]
pub struct Looper {
    clip: Clip,
    position: f64,
    step: f64,
}

impl Looper {
    pub fn new(clip: Clip, device_rate: u32) -> Result<Self> {
        if clip.samples.is_empty() {
            return Err(VisualizerError::Audio("Cannot loop an empty clip".to_string()));
        }
        let step = clip.sample_rate as f64 / device_rate.max(1) as f64;
        Ok(Self {
            clip,
            position: 0.0,
            step,
        })
    }

    /// Next sample (nearest neighbour), wrapping at the end of the clip
    pub fn next_sample(&mut self) -> f32 {
        let len = self.clip.samples.len();
        let sample = self.clip.samples[(self.position as usize).min(len - 1)];
        self.position += self.step;
        if self.position >= len as f64 {
            self.position -= len as f64;
        }
        sample
    }
}
