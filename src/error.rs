//! Error type shared by the analysis, audio and geometry layers.

use thiserror::Error;

/// Root error type for all visualizer failures.
#[derive(Error, Debug)]
pub enum VisualizerError {
    /// Invalid parameter values (band count, grid size, FFT size...).
    #[error("config error: {0}")]
    Config(String),

    /// Audio device, stream or decoder failure.
    #[error("audio error: {0}")]
    Audio(String),

    /// No usable adapter/device, or pipeline creation failed.
    #[error("GPU init error: {0}")]
    GpuInit(String),

    /// A geometry buffer could not be created with the requested size.
    #[error("buffer allocation failed for {label}: {reason}")]
    BufferAllocation { label: &'static str, reason: String },

    /// The device rejected a kernel dispatch.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Mapping a staging buffer back to host memory failed.
    #[error("readback error: {0}")]
    Readback(String),

    /// The kernel output does not match the allocated buffer extents.
    #[error("geometry mismatch: expected {expected} {what}, got {actual}")]
    GeometryMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An operation was attempted in the wrong lifecycle phase.
    #[error("invalid phase: cannot {operation} while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },

    /// Mesh export failure.
    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VisualizerError>;
