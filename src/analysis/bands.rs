//! Logarithmic partition of the magnitude spectrum into frequency bands.

use std::ops::Range;

use crate::error::{Result, VisualizerError};
use crate::params::audio_constants::SPECTRUM_SIZE;

/// Gain applied to every band average
const BAND_GAIN: f32 = 10.0;

/// Contiguous sample ranges, one per band, tiling `0..SPECTRUM_SIZE`
///
/// Band `i` spans `2^i * 2` samples; the last band absorbs whatever remains,
/// so with 8 bands the sizes are `[2, 4, 8, 16, 32, 64, 128, 258]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLayout {
    ranges: Vec<Range<usize>>,
}

impl BandLayout {
    pub fn new(band_count: usize) -> Result<Self> {
        if band_count == 0 {
            return Err(VisualizerError::Config(
                "Band layout needs at least one band".to_string(),
            ));
        }

        let mut ranges = Vec::with_capacity(band_count);
        let mut start = 0;

        for i in 0..band_count - 1 {
            let len = 2usize << i;
            if start + len >= SPECTRUM_SIZE {
                return Err(VisualizerError::Config(format!(
                    "{} bands do not fit in {} spectrum samples",
                    band_count, SPECTRUM_SIZE
                )));
            }
            ranges.push(start..start + len);
            start += len;
        }
        ranges.push(start..SPECTRUM_SIZE);

        Ok(Self { ranges })
    }

    pub fn band_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Number of samples in each band
    pub fn sizes(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.len()).collect()
    }

    /// Raw energy of one band.
    ///
    /// Each sample is doubled and weighted by its 1-based global index, the
    /// weighted sum is averaged over the band and scaled by 10. The index ramp
    /// favours the upper end of every band.
    pub fn band_energy(&self, band: usize, samples: &[f32]) -> f32 {
        let range = self.ranges[band].clone();
        let len = range.len() as f32;

        let total: f32 = samples[range.clone()]
            .iter()
            .zip(range)
            .map(|(&s, j)| (s + s) * (j + 1) as f32)
            .sum();

        total / len * BAND_GAIN
    }
}
