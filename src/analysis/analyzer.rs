//! Per-frame band smoothing and adaptive normalization.

use log::debug;

use super::bands::BandLayout;
use super::{AudioSignal, SpectrumFrame, SpectrumSource};
use crate::error::Result;
use crate::params::AnalyzerConfig;

/// Energy bookkeeping for one frequency band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandState {
    /// Raw energy of the current frame
    pub frequency_band: f32,

    /// Fast-attack, slow-release copy of `frequency_band`
    pub band_buffer: f32,

    /// Last decay step subtracted from `band_buffer`
    pub buffer_reduction: f32,

    /// Running peak of `frequency_band`, never below the audio profile
    pub frequency_band_highest: f32,
}

impl BandState {
    fn seeded(audio_profile: f32) -> Self {
        Self {
            frequency_band: 0.0,
            band_buffer: 0.0,
            buffer_reduction: 0.0,
            frequency_band_highest: audio_profile,
        }
    }
}

/// Turns raw magnitude spectra into normalized band energies and an overall amplitude
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    layout: BandLayout,
    bands: Vec<BandState>,
    audio_band: Vec<f32>,
    audio_band_buffer: Vec<f32>,
    amplitude: f32,
    amplitude_buffer: f32,
    amplitude_highest: f32,
    frames: u64,
}

impl SpectrumAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let layout = BandLayout::new(config.band_count)?;
        let band_count = config.band_count;

        Ok(Self {
            bands: vec![BandState::seeded(config.audio_profile); band_count],
            audio_band: vec![0.0; band_count],
            audio_band_buffer: vec![0.0; band_count],
            amplitude: 0.0,
            amplitude_buffer: 0.0,
            amplitude_highest: 0.0,
            frames: 0,
            layout,
            config,
        })
    }

    /// Pull the latest spectrum from `source` and run the pipeline on it.
    ///
    /// Without a source, or before the source has produced a frame, nothing
    /// changes and the previous outputs stay visible. Returns whether a frame
    /// was processed.
    pub fn update<S: SpectrumSource + ?Sized>(&mut self, source: Option<&S>) -> bool {
        let Some(frame) = source.and_then(|s| s.spectrum()) else {
            return false;
        };
        self.process(&frame);
        true
    }

    /// Run the full pipeline on one frame of magnitudes
    pub fn process(&mut self, samples: &SpectrumFrame) {
        self.generate_frequency_bands(samples);
        self.calculate_band_buffers();
        self.generate_audio_bands();
        self.calculate_amplitude();
        self.frames += 1;

        debug!(
            "frame {}: amplitude {:.3}, buffer {:.3}",
            self.frames, self.amplitude, self.amplitude_buffer
        );
    }

    /// Restore the freshly seeded state (peaks back to the audio profile)
    pub fn reset(&mut self) {
        self.bands.fill(BandState::seeded(self.config.audio_profile));
        self.audio_band.fill(0.0);
        self.audio_band_buffer.fill(0.0);
        self.amplitude = 0.0;
        self.amplitude_buffer = 0.0;
        self.amplitude_highest = 0.0;
        self.frames = 0;
    }

    fn generate_frequency_bands(&mut self, samples: &SpectrumFrame) {
        for (i, band) in self.bands.iter_mut().enumerate() {
            band.frequency_band = self.layout.band_energy(i, samples);
        }
    }

    fn calculate_band_buffers(&mut self) {
        let band_count = self.bands.len() as f32;

        for band in &mut self.bands {
            let frequency_band = band.frequency_band;
            let band_buffer = band.band_buffer;

            if frequency_band > band_buffer {
                band.band_buffer = frequency_band;
            } else if frequency_band < band_buffer && frequency_band > 0.0 {
                // More bands means a slower release per band
                band.buffer_reduction = (band_buffer - frequency_band) / band_count;
                band.band_buffer -= band.buffer_reduction;
            }
            // Silence (or no change) freezes the buffer
        }
    }

    fn generate_audio_bands(&mut self) {
        for (i, band) in self.bands.iter_mut().enumerate() {
            if band.frequency_band > band.frequency_band_highest {
                band.frequency_band_highest = band.frequency_band;
            }
            self.audio_band[i] = normalize(band.frequency_band, band.frequency_band_highest);
            self.audio_band_buffer[i] = normalize(band.band_buffer, band.frequency_band_highest);
        }
    }

    fn calculate_amplitude(&mut self) {
        let current: f32 = self.audio_band.iter().sum();
        let current_buffer: f32 = self.audio_band_buffer.iter().sum();

        if current > self.amplitude_highest {
            self.amplitude_highest = current;
        }

        self.amplitude = normalize(current, self.amplitude_highest);
        self.amplitude_buffer = normalize(current_buffer, self.amplitude_highest);
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    pub fn bands(&self) -> &[BandState] {
        &self.bands
    }

    /// Per-band energy normalized against its running peak, in `[0, 1]`
    pub fn audio_band(&self) -> &[f32] {
        &self.audio_band
    }

    /// Per-band smoothed energy normalized against its running peak, in `[0, 1]`
    pub fn audio_band_buffer(&self) -> &[f32] {
        &self.audio_band_buffer
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn amplitude_buffer(&self) -> f32 {
        self.amplitude_buffer
    }

    pub fn amplitude_highest(&self) -> f32 {
        self.amplitude_highest
    }

    /// Frames processed since creation or the last reset
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn signal(&self) -> AudioSignal {
        AudioSignal {
            amplitude: self.amplitude,
            amplitude_buffer: self.amplitude_buffer,
        }
    }
}

/// `value / peak` clamped to `[0, 1]`; a zero peak or non-finite quotient yields 0
fn normalize(value: f32, peak: f32) -> f32 {
    if peak <= 0.0 {
        return 0.0;
    }
    let ratio = value / peak;
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::audio_constants::SPECTRUM_SIZE;
    use approx::assert_relative_eq;

    fn analyzer() -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap()
    }

    /// Deterministic pseudo-random spectra (xorshift) so runs are reproducible
    fn noisy_frames(count: usize) -> Vec<SpectrumFrame> {
        let mut state: u32 = 0x9e37_79b9;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 0.05
        };

        (0..count)
            .map(|frame_idx| {
                let mut frame = [0.0f32; SPECTRUM_SIZE];
                // Every fourth frame is silent to exercise the decay freeze
                if frame_idx % 4 != 3 {
                    for sample in frame.iter_mut() {
                        *sample = next();
                    }
                }
                frame
            })
            .collect()
    }

    struct FixedSource(Option<SpectrumFrame>);

    impl SpectrumSource for FixedSource {
        fn spectrum(&self) -> Option<SpectrumFrame> {
            self.0
        }
    }

    #[test]
    fn test_single_frame_scenario() {
        let mut analyzer = analyzer();
        let mut samples = [0.0f32; SPECTRUM_SIZE];
        samples[0] = 1.0;
        samples[1] = 1.0;

        analyzer.process(&samples);

        let band0 = analyzer.bands()[0];
        assert_relative_eq!(band0.frequency_band, 30.0);
        assert_relative_eq!(band0.frequency_band_highest, 30.0);
        assert_relative_eq!(analyzer.audio_band()[0], 1.0);
        assert_relative_eq!(analyzer.audio_band_buffer()[0], 1.0);

        // Untouched bands keep their seeded peak
        assert_relative_eq!(analyzer.bands()[3].frequency_band_highest, 0.5);
        assert_eq!(analyzer.audio_band()[3], 0.0);

        // Only band 0 contributes, so this frame is its own peak
        assert_relative_eq!(analyzer.amplitude(), 1.0);
        assert_relative_eq!(analyzer.amplitude_highest(), 1.0);
    }

    #[test]
    fn test_highest_tracks_and_never_decreases() {
        let mut analyzer = analyzer();
        let mut previous: Vec<f32> = analyzer
            .bands()
            .iter()
            .map(|b| b.frequency_band_highest)
            .collect();

        for frame in noisy_frames(200) {
            analyzer.process(&frame);

            for (band, prev) in analyzer.bands().iter().zip(previous.iter_mut()) {
                assert!(band.frequency_band_highest >= band.frequency_band);
                assert!(band.frequency_band_highest >= 0.5);
                assert!(band.frequency_band_highest >= *prev);
                *prev = band.frequency_band_highest;
            }
        }
    }

    #[test]
    fn test_outputs_stay_normalized() {
        let mut analyzer = analyzer();

        for frame in noisy_frames(200) {
            analyzer.process(&frame);

            for &v in analyzer.audio_band().iter().chain(analyzer.audio_band_buffer()) {
                assert!((0.0..=1.0).contains(&v), "band value {} out of range", v);
            }
            assert!((0.0..=1.0).contains(&analyzer.amplitude()));
            assert!((0.0..=1.0).contains(&analyzer.amplitude_buffer()));
        }
    }

    #[test]
    fn test_attack_is_instant_and_release_is_gradual() {
        let mut analyzer = analyzer();
        let mut loud = [0.0f32; SPECTRUM_SIZE];
        loud[0] = 1.0;
        loud[1] = 1.0;
        let mut quiet = [0.0f32; SPECTRUM_SIZE];
        quiet[0] = 0.5;
        quiet[1] = 0.5;

        analyzer.process(&loud);
        assert_relative_eq!(analyzer.bands()[0].band_buffer, 30.0);

        analyzer.process(&quiet);
        let band = analyzer.bands()[0];
        assert_relative_eq!(band.frequency_band, 15.0);
        // (30 - 15) / 8 bands
        assert_relative_eq!(band.buffer_reduction, 1.875);
        assert_relative_eq!(band.band_buffer, 28.125);
        assert!(analyzer.audio_band_buffer()[0] > analyzer.audio_band()[0]);
    }

    #[test]
    fn test_release_slows_with_more_bands() {
        let mut few = SpectrumAnalyzer::new(AnalyzerConfig {
            band_count: 2,
            ..Default::default()
        })
        .unwrap();
        let mut many = analyzer();

        let mut loud = [0.0f32; SPECTRUM_SIZE];
        loud[0] = 1.0;
        let mut quiet = [0.0f32; SPECTRUM_SIZE];
        quiet[0] = 0.2;

        for analyzer in [&mut few, &mut many] {
            analyzer.process(&loud);
            analyzer.process(&quiet);
        }

        assert!(few.bands()[0].band_buffer < many.bands()[0].band_buffer);
    }

    #[test]
    fn test_buffer_freezes_on_silence() {
        let mut analyzer = analyzer();
        let mut loud = [0.0f32; SPECTRUM_SIZE];
        loud[0] = 1.0;
        loud[1] = 1.0;
        let mut quiet = [0.0f32; SPECTRUM_SIZE];
        quiet[0] = 0.5;
        quiet[1] = 0.5;
        let silence = [0.0f32; SPECTRUM_SIZE];

        analyzer.process(&loud);
        analyzer.process(&quiet);
        let frozen = analyzer.bands()[0].band_buffer;

        for _ in 0..50 {
            analyzer.process(&silence);
            assert_eq!(analyzer.bands()[0].frequency_band, 0.0);
            assert_eq!(analyzer.bands()[0].band_buffer, frozen);
        }
    }

    #[test]
    fn test_silence_never_produces_nan() {
        let mut analyzer = analyzer();
        let silence = [0.0f32; SPECTRUM_SIZE];

        for _ in 0..100 {
            analyzer.process(&silence);
            assert_eq!(analyzer.amplitude(), 0.0);
            assert_eq!(analyzer.amplitude_buffer(), 0.0);
            assert!(analyzer.audio_band().iter().all(|v| *v == 0.0));
        }
        assert_eq!(analyzer.amplitude_highest(), 0.0);
    }

    #[test]
    fn test_zero_profile_is_guarded() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig {
            audio_profile: 0.0,
            ..Default::default()
        })
        .unwrap();

        analyzer.process(&[0.0f32; SPECTRUM_SIZE]);

        assert!(analyzer.audio_band().iter().all(|v| *v == 0.0));
        assert!(analyzer.audio_band_buffer().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_update_without_source_is_noop() {
        let mut analyzer = analyzer();
        let mut samples = [0.0f32; SPECTRUM_SIZE];
        samples[0] = 1.0;
        analyzer.process(&samples);
        let before = analyzer.bands().to_vec();

        assert!(!analyzer.update::<FixedSource>(None));
        assert!(!analyzer.update(Some(&FixedSource(None))));

        assert_eq!(analyzer.bands(), before.as_slice());
        assert_eq!(analyzer.frames(), 1);

        assert!(analyzer.update(Some(&FixedSource(Some(samples)))));
        assert_eq!(analyzer.frames(), 2);
    }

    #[test]
    fn test_reset_restores_seeded_state() {
        let mut analyzer = analyzer();
        for frame in noisy_frames(20) {
            analyzer.process(&frame);
        }

        analyzer.reset();

        assert_eq!(analyzer.frames(), 0);
        assert_eq!(analyzer.amplitude_highest(), 0.0);
        for band in analyzer.bands() {
            assert_eq!(*band, BandState::seeded(0.5));
        }
    }
}
