//! Per-chunk feature extraction using Fourier transforms

use crate::config::FeatureConfig;
use crate::error::{CortexError, Result};
use crate::streaming::AudioChunk;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Added to band energies before the logarithm so silence stays finite
pub const ENERGY_FLOOR: f64 = 1e-10;

/// Compact description of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// `ln(low band energy + ENERGY_FLOOR)`
    pub log_low: f64,

    /// `ln(mid band energy + ENERGY_FLOOR)`
    pub log_mid: f64,

    /// Mean absolute amplitude
    pub intensity: f64,
}

impl FeatureVector {
    /// Number of components
    pub const DIM: usize = 3;

    pub fn new(log_low: f64, log_mid: f64, intensity: f64) -> Self {
        Self {
            log_low,
            log_mid,
            intensity,
        }
    }

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [self.log_low, self.log_mid, self.intensity]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl From<[f64; 3]> for FeatureVector {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

/// Turns fixed-size chunks into [`FeatureVector`]s.
///
/// Holds only the FFT plan and precomputed band bins, so `extract` takes
/// `&self` and can be shared across threads.
pub struct FeatureExtractor {
    config: FeatureConfig,
    fft: Arc<dyn Fft<f64>>,
    low_bins: Range<usize>,
    mid_bins: Range<usize>,
}

impl FeatureExtractor {
    /// Create a new extractor
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate().map_err(CortexError::Config)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.chunk_size);

        let low_bins = band_bins(config.low_band, config.sample_rate, config.chunk_size);
        let mid_bins = band_bins(config.mid_band, config.sample_rate, config.chunk_size);

        Ok(Self {
            config,
            fft,
            low_bins,
            mid_bins,
        })
    }

    /// Extract features from one chunk
    pub fn extract(&self, chunk: &AudioChunk) -> Result<FeatureVector> {
        self.extract_samples(chunk.samples())
    }

    /// Extract features from raw samples
    pub fn extract_samples(&self, samples: &[f32]) -> Result<FeatureVector> {
        if samples.len() != self.config.chunk_size {
            return Err(CortexError::Chunk(format!(
                "Expected {} samples, got {}",
                self.config.chunk_size,
                samples.len()
            )));
        }

        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(CortexError::Chunk(format!(
                "Non-finite sample at index {}",
                index
            )));
        }

        let spectrum = self.magnitude_spectrum(samples);

        let low_energy = band_energy(&spectrum, &self.low_bins);
        let mid_energy = band_energy(&spectrum, &self.mid_bins);
        let intensity =
            samples.iter().map(|&s| (s as f64).abs()).sum::<f64>() / samples.len() as f64;

        Ok(FeatureVector {
            log_low: (low_energy + ENERGY_FLOOR).ln(),
            log_mid: (mid_energy + ENERGY_FLOOR).ln(),
            intensity,
        })
    }

    /// Magnitudes of the non-negative frequency bins (`N/2 + 1` values)
    fn magnitude_spectrum(&self, samples: &[f32]) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer
            .iter()
            .take(samples.len() / 2 + 1)
            .map(|c| c.norm())
            .collect()
    }

    /// Frequency (Hz) of bin `k`
    pub fn bin_frequency(&self, k: usize) -> f64 {
        k as f64 * self.config.sample_rate as f64 / self.config.chunk_size as f64
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }
}

/// Bins whose centre frequency falls in `[lo, hi)`
fn band_bins((lo, hi): (f64, f64), sample_rate: u32, chunk_size: usize) -> Range<usize> {
    let bins = chunk_size / 2 + 1;
    let resolution = sample_rate as f64 / chunk_size as f64;
    let mut selected = (0..bins).filter(|&k| {
        let freq = k as f64 * resolution;
        freq >= lo && freq < hi
    });

    match selected.next() {
        Some(first) => {
            let last = selected.last().unwrap_or(first);
            first..last + 1
        }
        None => 0..0,
    }
}

fn band_energy(spectrum: &[f64], bins: &Range<usize>) -> f64 {
    spectrum[bins.clone()].iter().map(|m| m * m).sum()
}
