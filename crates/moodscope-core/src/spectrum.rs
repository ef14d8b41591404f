//! Windowed FFT magnitude spectrum
//!
//! Converts one mono block into `fft_size / 2 + 1` magnitudes, DC through
//! Nyquist. All working buffers are sized once in [`SpectralAnalyzer::new`]
//! and reused, so [`SpectralAnalyzer::analyze`] never allocates.

use crate::config::MIN_FFT_SIZE;
use crate::error::{AnalyzerError, Result};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::{debug, trace};

/// Symmetric Hann window of `size` coefficients (0 at both edges, 1 at the centre)
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let t = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
        })
        .collect()
}

/// Replace NaN/Inf with silence
#[inline]
pub(crate) fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// True when `rate` can be used to map bins to frequencies
#[inline]
pub(crate) fn is_valid_sample_rate(rate: f32) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Hann-windowed forward FFT producing per-bin magnitudes
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    scratch_buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    /// 0.0 until a block with a usable rate arrives
    sample_rate: f32,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    /// Plan the transform and allocate every working buffer
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < MIN_FFT_SIZE || !fft_size.is_power_of_two() {
            return Err(AnalyzerError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        debug!(
            "SpectralAnalyzer created: fft_size={}, bins={}, scratch={}",
            fft_size,
            fft_size / 2 + 1,
            scratch_len
        );

        Ok(Self {
            fft,
            fft_size,
            window: hann_window(fft_size),
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch_buffer: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; fft_size / 2 + 1],
            sample_rate: 0.0,
        })
    }

    /// Transform length
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins (`fft_size / 2 + 1`)
    pub fn spectrum_size(&self) -> usize {
        self.magnitudes.len()
    }

    /// Last valid sample rate seen, 0.0 if none yet
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Magnitudes from the most recent pass
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Centre frequency of bin `k` at the current sample rate
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate / self.fft_size as f32
    }

    /// Analyze one block.
    ///
    /// Blocks shorter than the transform are zero-padded at the end; longer
    /// blocks contribute only their most recent `fft_size` samples. An invalid
    /// `sample_rate` keeps the last valid one; with none established yet the
    /// spectrum is zeroed instead.
    pub fn analyze(&mut self, samples: &[f32], sample_rate: f32) -> &[f32] {
        if is_valid_sample_rate(sample_rate) {
            if sample_rate != self.sample_rate {
                trace!(
                    "SpectralAnalyzer sample rate {} -> {}",
                    self.sample_rate, sample_rate
                );
            }
            self.sample_rate = sample_rate;
        }

        if self.sample_rate == 0.0 {
            self.magnitudes.fill(0.0);
            return &self.magnitudes;
        }

        let start = samples.len().saturating_sub(self.fft_size);
        let recent = &samples[start..];

        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            let sample = recent.get(i).copied().map_or(0.0, sanitize);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch_buffer);

        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.fft_buffer) {
            // Overflowing input can drive bins to inf/NaN
            *mag = sanitize(bin.norm());
        }

        &self.magnitudes
    }

    /// Zero the spectrum, keeping the sample rate
    pub fn clear(&mut self) {
        self.magnitudes.fill(0.0);
    }
}
