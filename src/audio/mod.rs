//! Host audio adapter.
//!
//! Plays the procedural Glicol composition or a looped WAV clip, or captures
//! the default input device, and turns the stream into magnitude spectra for
//! the analyzer.

mod fft;
mod source;
mod synthesis;
mod system;

// Re-export public types
pub use fft::{blackman_harris, SpectrumFft};
pub use source::{AudioSource, Clip, Looper};
pub use system::AudioSystem;
