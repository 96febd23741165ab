//! Audio system managing playback/capture and FFT analysis.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use glicol::Engine;
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use super::fft::spawn_fft_thread;
use super::source::{AudioSource, Clip, Looper};
use super::synthesis::GLICOL_COMPOSITION;
use crate::analysis::{SpectrumFrame, SpectrumSource};
use crate::error::{Result, VisualizerError};
use crate::params::{audio_constants::BLOCK_SIZE, FFTConfig};

/// Output safety limiter (hard clip)
const OUTPUT_LIMIT: f32 = 0.5;

/// Audio system feeding the spectrum analyzer
pub struct AudioSystem {
    /// Newest FFT magnitude frame (thread-safe)
    latest: Arc<Mutex<Option<SpectrumFrame>>>,

    /// Cleared on drop to stop the FFT thread
    running: Arc<AtomicBool>,

    /// Audio stream (kept alive)
    _stream: cpal::Stream,

    /// FFT analysis thread handle
    fft_thread: Option<thread::JoinHandle<()>>,

    source: AudioSource,
}

impl AudioSystem {
    /// Open the device for `source`, start streaming and start the FFT thread
    pub fn new(source: AudioSource, mut fft_config: FFTConfig) -> Result<Self> {
        fft_config.validate()?;

        let host = cpal::default_host();
        let samples = Arc::new(Mutex::new(Vec::<f32>::with_capacity(fft_config.fft_size * 2)));

        let stream = match &source {
            AudioSource::Input => {
                let device = host
                    .default_input_device()
                    .ok_or_else(|| VisualizerError::Audio("No audio input device found".into()))?;
                let config = device
                    .default_input_config()
                    .map_err(|e| VisualizerError::Audio(format!("Failed to get input config: {}", e)))?;
                require_f32(config.sample_format())?;
                log_device(&device, "Input", config.sample_rate().0);
                fft_config.sample_rate_hz = config.sample_rate().0 as usize;

                let channels = config.channels().max(1) as usize;
                let sink = Arc::clone(&samples);
                device
                    .build_input_stream(
                        &config.into(),
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let Ok(mut buffer) = sink.lock() else {
                                return;
                            };
                            buffer.extend(
                                data.chunks(channels)
                                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                            );
                        },
                        |err| error!("Audio input stream error: {}", err),
                        None,
                    )
                    .map_err(|e| VisualizerError::Audio(format!("Failed to build input stream: {}", e)))?
            }
            AudioSource::Synth | AudioSource::File(_) => {
                let device = host
                    .default_output_device()
                    .ok_or_else(|| VisualizerError::Audio("No audio output device found".into()))?;
                let config = device
                    .default_output_config()
                    .map_err(|e| VisualizerError::Audio(format!("Failed to get output config: {}", e)))?;
                require_f32(config.sample_format())?;
                log_device(&device, "Output", config.sample_rate().0);
                fft_config.sample_rate_hz = config.sample_rate().0 as usize;

                let channels = config.channels().max(1) as usize;
                let mut voice = Voice::new(&source, config.sample_rate().0)?;
                let sink = Arc::clone(&samples);
                device
                    .build_output_stream(
                        &config.into(),
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let Ok(mut buffer) = sink.lock() else {
                                data.fill(0.0);
                                return;
                            };
                            for frame in data.chunks_mut(channels) {
                                let (left, right) = voice.next_frame();
                                let left = left.clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);
                                let right = right.clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT);
                                for (c, out) in frame.iter_mut().enumerate() {
                                    *out = if c % 2 == 0 { left } else { right };
                                }
                                buffer.push((left + right) * 0.5);
                            }
                        },
                        |err| error!("Audio output stream error: {}", err),
                        None,
                    )
                    .map_err(|e| VisualizerError::Audio(format!("Failed to build output stream: {}", e)))?
            }
        };

        stream
            .play()
            .map_err(|e| VisualizerError::Audio(format!("Failed to start audio stream: {}", e)))?;

        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let fft_thread = spawn_fft_thread(
            fft_config.clone(),
            samples,
            Arc::clone(&latest),
            Arc::clone(&running),
        );

        info!(
            "Audio source {} analyzed with {}-point FFT ({:.1} Hz per bin)",
            source,
            fft_config.fft_size,
            fft_config.bin_width_hz()
        );

        Ok(Self {
            latest,
            running,
            _stream: stream,
            fft_thread: Some(fft_thread),
            source,
        })
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }
}

impl SpectrumSource for AudioSystem {
    fn spectrum(&self) -> Option<SpectrumFrame> {
        match self.latest.lock() {
            Ok(slot) => *slot,
            Err(_) => None,
        }
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.fft_thread.take() {
            if handle.join().is_err() {
                warn!("FFT thread panicked");
            }
        }
    }
}

/// Sample generator behind the output stream
enum Voice {
    Synth {
        engine: Box<Engine<BLOCK_SIZE>>,
        block: Vec<(f32, f32)>,
        cursor: usize,
    },
    Clip(Looper),
}

impl Voice {
    fn new(source: &AudioSource, sample_rate: u32) -> Result<Self> {
        match source {
            AudioSource::File(path) => {
                let clip = Clip::load(path)?;
                info!(
                    "Looping {} ({} samples @ {}Hz)",
                    path.display(),
                    clip.samples.len(),
                    clip.sample_rate
                );
                Ok(Voice::Clip(Looper::new(clip, sample_rate)?))
            }
            _ => {
                let mut engine = Engine::<BLOCK_SIZE>::new();
                engine.set_sr(sample_rate as usize);
                engine.update_with_code(GLICOL_COMPOSITION);
                engine
                    .update()
                    .map_err(|e| VisualizerError::Audio(format!("Glicol engine init failed: {:?}", e)))?;
                Ok(Voice::Synth {
                    engine: Box::new(engine),
                    block: Vec::with_capacity(BLOCK_SIZE),
                    cursor: 0,
                })
            }
        }
    }

    /// Next stereo frame
    fn next_frame(&mut self) -> (f32, f32) {
        match self {
            Voice::Clip(looper) => {
                let s = looper.next_sample();
                (s, s)
            }
            Voice::Synth {
                engine,
                block,
                cursor,
            } => {
                if *cursor >= block.len() {
                    let (buffers, _) = engine.next_block(vec![]);
                    block.clear();
                    for i in 0..BLOCK_SIZE {
                        let left = buffers[0][i];
                        let right = buffers.get(1).map_or(left, |b| b[i]);
                        block.push((left, right));
                    }
                    *cursor = 0;
                }
                let frame = block[*cursor];
                *cursor += 1;
                frame
            }
        }
    }
}

fn require_f32(format: cpal::SampleFormat) -> Result<()> {
    if format != cpal::SampleFormat::F32 {
        return Err(VisualizerError::Audio(format!(
            "Unsupported sample format {:?} (need f32)",
            format
        )));
    }
    Ok(())
}

fn log_device(device: &cpal::Device, role: &str, sample_rate: u32) {
    info!(
        "{}: {} @ {}Hz",
        role,
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        sample_rate
    );
}
