//! FFT analysis thread and utilities.

use log::{debug, warn};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::analysis::SpectrumFrame;
use crate::params::{audio_constants::SPECTRUM_SIZE, FFTConfig};

/// Pending samples beyond this many windows are dropped (oldest first)
const MAX_BACKLOG_WINDOWS: usize = 4;

/// Windowed forward FFT producing one magnitude spectrum per call
pub struct SpectrumFft {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl SpectrumFft {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            window: (0..fft_size).map(|i| blackman_harris(i, fft_size)).collect(),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Magnitudes of the first `SPECTRUM_SIZE` bins of `samples[..size]`, scaled by `2 / size`
    pub fn process(&mut self, samples: &[f32]) -> SpectrumFrame {
        let size = self.size();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 2.0 / size as f32;
        let mut frame = [0.0; SPECTRUM_SIZE];
        for (out, bin) in frame.iter_mut().zip(&self.buffer) {
            *out = bin.norm() * scale;
        }
        frame
    }
}

/// Spawn FFT analysis thread.
///
/// Consumes `fft_size` samples at a time with 50% overlap and stores the newest
/// spectrum in `latest`. Exits once `running` is cleared.
pub fn spawn_fft_thread(
    config: FFTConfig,
    sample_buffer: Arc<Mutex<Vec<f32>>>,
    latest: Arc<Mutex<Option<SpectrumFrame>>>,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut analyzer = SpectrumFft::new(config.fft_size);
        let hop = config.fft_size / 2;

        while running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(config.update_interval_ms));

            let frame = {
                let Ok(mut samples) = sample_buffer.lock() else {
                    warn!("Sample buffer poisoned; stopping FFT thread");
                    return;
                };

                let limit = config.fft_size * MAX_BACKLOG_WINDOWS;
                if samples.len() > limit {
                    let excess = samples.len() - limit;
                    samples.drain(0..excess);
                    debug!("FFT backlog trimmed by {} samples", excess);
                }

                if samples.len() < config.fft_size {
                    continue;
                }

                let frame = analyzer.process(&samples[..config.fft_size]);
                samples.drain(0..hop);
                frame
            };

            match latest.lock() {
                Ok(mut slot) => *slot = Some(frame),
                Err(_) => {
                    warn!("Spectrum slot poisoned; stopping FFT thread");
                    return;
                }
            }
        }
    })
}

/// 4-term Blackman-Harris window
pub fn blackman_harris(index: usize, size: usize) -> f32 {
    if size < 2 {
        return 1.0;
    }
    let t = index as f32 / (size as f32 - 1.0);
    0.35875 - 0.48829 * (2.0 * PI * t).cos() + 0.14128 * (4.0 * PI * t).cos()
        - 0.01168 * (6.0 * PI * t).cos()
}
