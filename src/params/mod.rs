//! Parameter definitions with units and documented semantics.
//!
//! All tunables are collected here with:
//! - Units (Hz, seconds, world units)
//! - Documented ranges and meanings
//! - A `validate()` that rejects values the pipeline cannot run with

mod audio;
mod frame;
mod grid;

// Re-export all types
pub use audio::{audio_constants, AnalyzerConfig, FFTConfig, MAX_BAND_COUNT};
pub use frame::LoopConfig;
pub use grid::{GridConfig, ReadbackMode};
