//! Cubewave library - audio-reactive procedural cube grid

pub mod analysis;
pub mod app;
pub mod audio;
pub mod cli;
pub mod error;
pub mod mesh;
pub mod params;
pub mod scheduler;
