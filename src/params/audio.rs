//! Audio capture, FFT and spectrum analysis configuration.

use crate::error::{Result, VisualizerError};

use audio_constants::SPECTRUM_SIZE;

/// Highest band count whose doubling partition still fits in the spectrum.
/// Bands `0..n-1` take `2^(n) - 2` samples, which must leave at least one for the last band.
pub const MAX_BAND_COUNT: usize = 9;

/// FFT analysis configuration for the host audio adapter
#[derive(Debug, Clone)]
pub struct FFTConfig {
    /// Audio sample rate (Hz), replaced by the device rate once a stream is open
    pub sample_rate_hz: usize,

    /// FFT window size (must be power of 2, and at least twice the spectrum size)
    /// 1024 yields exactly 512 usable magnitude bins
    pub fft_size: usize,

    /// FFT update interval (milliseconds)
    /// 16 ms keeps one fresh spectrum per 60 Hz frame
    pub update_interval_ms: u64,
}

impl Default for FFTConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            fft_size: 1024,
            update_interval_ms: 16,
        }
    }
}

impl FFTConfig {
    /// Frequency resolution of one magnitude bin (Hz)
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate_hz as f32 / self.fft_size as f32
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() {
            return Err(VisualizerError::Config(format!(
                "FFT size must be power of 2, got {}",
                self.fft_size
            )));
        }
        if self.fft_size < SPECTRUM_SIZE * 2 {
            return Err(VisualizerError::Config(format!(
                "FFT size must be at least {} to fill the spectrum, got {}",
                SPECTRUM_SIZE * 2,
                self.fft_size
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(VisualizerError::Config("Sample rate must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Band partitioning and normalization parameters for the spectrum analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Number of logarithmic bands (1..=9, default 8)
    pub band_count: usize,

    /// Initial floor for every per-band running maximum.
    /// Keeps early frames from dividing by a near-zero peak.
    pub audio_profile: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            band_count: 8,
            audio_profile: 0.5,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.band_count == 0 || self.band_count > MAX_BAND_COUNT {
            return Err(VisualizerError::Config(format!(
                "Band count must be in 1..={}, got {}",
                MAX_BAND_COUNT, self.band_count
            )));
        }
        if !self.audio_profile.is_finite() || self.audio_profile < 0.0 {
            return Err(VisualizerError::Config(format!(
                "Audio profile must be a finite value >= 0, got {}",
                self.audio_profile
            )));
        }
        Ok(())
    }
}

/// Audio constants (compile-time, match Glicol engine setup)
pub mod audio_constants {
    /// Audio block size (samples per buffer)
    /// 128 = 2.9ms @ 44.1kHz
    pub const BLOCK_SIZE: usize = 128;

    /// Magnitude samples handed to the analyzer every frame
    pub const SPECTRUM_SIZE: usize = 512;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fft_fills_spectrum() {
        let config = FFTConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fft_size / 2, SPECTRUM_SIZE);

        // 44100 / 1024 ≈ 43.07 Hz per bin
        assert!((config.bin_width_hz() - 43.07).abs() < 0.01);
    }

    #[test]
    fn test_fft_size_rejected() {
        let config = FFTConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FFTConfig {
            fft_size: 512,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_band_count_bounds() {
        for band_count in 1..=MAX_BAND_COUNT {
            let config = AnalyzerConfig {
                band_count,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "band_count {}", band_count);
        }

        let zero = AnalyzerConfig {
            band_count: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let too_many = AnalyzerConfig {
            band_count: MAX_BAND_COUNT + 1,
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
    }
}
