//! Spectrum analysis: banding, attack/release smoothing and running-peak normalization.

mod analyzer;
mod bands;

pub use analyzer::{BandState, SpectrumAnalyzer};
pub use bands::BandLayout;

use crate::params::audio_constants::SPECTRUM_SIZE;

/// One frame of FFT magnitudes, lowest frequency first
pub type SpectrumFrame = [f32; SPECTRUM_SIZE];

/// Anything that can hand the analyzer the latest magnitude spectrum
pub trait SpectrumSource {
    /// Latest frame, or `None` until the stream has produced one
    fn spectrum(&self) -> Option<SpectrumFrame>;
}

/// Scalar control signal passed from the analyzer to the mesh bridge
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioSignal {
    /// Summed band energy of this frame relative to the loudest frame so far
    pub amplitude: f32,

    /// Same, computed from the smoothed band buffers
    pub amplitude_buffer: f32,
}
