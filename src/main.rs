//! Cubewave - audio-reactive procedural cube grid
//!
//! Splits the live spectrum into logarithmic bands, normalizes them against
//! their running peaks and lets the resulting amplitude push a grid of cubes
//! generated by a compute kernel every frame.

use clap::Parser;
use log::info;

use cubewave::app::Visualizer;
use cubewave::audio::AudioSystem;
use cubewave::cli::Args;
use cubewave::error::Result;
use cubewave::mesh::{CpuBackend, GeometryBackend, GpuBackend, MeshStats};
use cubewave::params::FFTConfig;
use cubewave::scheduler::FrameLoop;

fn run<B: GeometryBackend>(args: &Args, audio: Option<AudioSystem>, backend: B) -> Result<()> {
    let frame_loop = FrameLoop::new(args.loop_config())?;
    let mut visualizer = Visualizer::new(
        audio,
        args.analyzer_config(),
        args.grid_config(),
        backend,
        MeshStats::default(),
    )?;

    frame_loop.run(&mut visualizer)?;

    if let Some(path) = &args.export_obj {
        visualizer.export_obj(path)?;
    }
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Cubewave - audio-reactive cube grid");

    // Fail on bad parameters before any device is opened
    args.analyzer_config().validate()?;
    args.grid_config().validate()?;
    args.loop_config().validate()?;

    let audio = match args.audio_source()? {
        Some(source) => Some(AudioSystem::new(source, FFTConfig::default())?),
        None => {
            info!("No audio source; running on silence");
            None
        }
    };

    if args.cpu {
        run(&args, audio, CpuBackend::new(args.noise_seed))?;
    } else {
        let backend = GpuBackend::new_blocking(args.grid_config().readback)?;
        run(&args, audio, backend)?;
    }
    Ok(())
}
