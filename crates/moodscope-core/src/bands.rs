//! Bass/mid/treble band energies with exponential smoothing.

use crate::config::AnalyzerConfig;
use crate::spectrum::is_valid_sample_rate;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Smoothed energy per perceptual band (mean bin magnitude, non-negative)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandEnergies {
    /// Below the bass cutoff (DC excluded)
    pub bass: f32,
    /// Between the bass and treble cutoffs
    pub mid: f32,
    /// Treble cutoff up to Nyquist
    pub treble: f32,
}

impl BandEnergies {
    /// Sum of all three bands
    pub fn total(&self) -> f32 {
        self.bass + self.mid + self.treble
    }
}

/// Bin boundaries derived from a sample rate.
///
/// Bass covers `1..bass_end`, mid `bass_end..mid_end`, treble
/// `mid_end..spectrum_size`. Bin 0 (DC) belongs to no band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandCutoffs {
    /// First bin past the bass band
    pub bass_end: usize,
    /// First bin of the treble band
    pub mid_end: usize,
}

impl BandCutoffs {
    /// Map Hz cutoffs onto bins of an `fft_size`-point transform at `sample_rate`
    pub fn from_sample_rate(
        bass_cutoff_hz: f32,
        treble_cutoff_hz: f32,
        sample_rate: f32,
        fft_size: usize,
    ) -> Self {
        let spectrum_size = fft_size / 2 + 1;
        let to_bin = |hz: f32| -> usize {
            let bin = (hz * fft_size as f32 / sample_rate).ceil();
            (bin.max(1.0) as usize).min(spectrum_size)
        };

        let bass_end = to_bin(bass_cutoff_hz);
        let mid_end = to_bin(treble_cutoff_hz).max(bass_end);
        Self { bass_end, mid_end }
    }
}

fn mean(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        0.0
    } else {
        (bins.iter().map(|&b| b as f64).sum::<f64>() / bins.len() as f64) as f32
    }
}

/// Aggregates a magnitude spectrum into three bands and smooths each one
#[derive(Debug, Clone)]
pub struct BandEnergyComputer {
    alpha: f32,
    bass_cutoff_hz: f32,
    treble_cutoff_hz: f32,
    fft_size: usize,
    /// Cutoffs and the rate they were derived from
    cutoffs: Option<(f32, BandCutoffs)>,
    smoothed: BandEnergies,
}

impl BandEnergyComputer {
    /// Build from analyzer settings; call after [`AnalyzerConfig::validate`]
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            alpha: config.band_smoothing,
            bass_cutoff_hz: config.bass_cutoff_hz,
            treble_cutoff_hz: config.treble_cutoff_hz,
            fft_size: config.fft_size,
            cutoffs: None,
            smoothed: BandEnergies::default(),
        }
    }

    /// Cutoffs in use, `None` before the first valid sample rate
    pub fn cutoffs(&self) -> Option<BandCutoffs> {
        self.cutoffs.map(|(_, cutoffs)| cutoffs)
    }

    /// Current smoothed values, without touching state
    pub fn energies(&self) -> BandEnergies {
        self.smoothed
    }

    /// Cutoffs for `sample_rate`, recomputed only when the rate changes
    fn cutoffs_for(&mut self, sample_rate: f32) -> BandCutoffs {
        match self.cutoffs {
            Some((rate, cutoffs)) if rate == sample_rate => cutoffs,
            _ => {
                let cutoffs = BandCutoffs::from_sample_rate(
                    self.bass_cutoff_hz,
                    self.treble_cutoff_hz,
                    sample_rate,
                    self.fft_size,
                );
                trace!(
                    "Band cutoffs for {}Hz: bass=1..{}, mid={}..{}, treble={}..",
                    sample_rate, cutoffs.bass_end, cutoffs.bass_end, cutoffs.mid_end, cutoffs.mid_end
                );
                self.cutoffs = Some((sample_rate, cutoffs));
                cutoffs
            }
        }
    }

    /// Unsmoothed mean magnitude per band for one spectrum
    pub fn raw_energies(&mut self, spectrum: &[f32], sample_rate: f32) -> BandEnergies {
        if !is_valid_sample_rate(sample_rate) || spectrum.is_empty() {
            return BandEnergies::default();
        }
        let cutoffs = self.cutoffs_for(sample_rate);
        let len = spectrum.len();
        let bass_end = cutoffs.bass_end.min(len);
        let mid_end = cutoffs.mid_end.min(len);

        BandEnergies {
            bass: mean(&spectrum[1.min(len)..bass_end]),
            mid: mean(&spectrum[bass_end..mid_end]),
            treble: mean(&spectrum[mid_end..]),
        }
    }

    /// Fold one spectrum into the smoothed state and return the new values.
    ///
    /// Without a usable sample rate the smoothed state is left as is.
    pub fn update(&mut self, spectrum: &[f32], sample_rate: f32) -> BandEnergies {
        if !is_valid_sample_rate(sample_rate) {
            return self.smoothed;
        }
        let raw = self.raw_energies(spectrum, sample_rate);
        self.apply(raw)
    }

    /// EMA step: `smoothed = alpha * raw + (1 - alpha) * smoothed`.
    ///
    /// A non-finite raw band leaves that band's smoothed value unchanged.
    pub fn apply(&mut self, raw: BandEnergies) -> BandEnergies {
        let a = self.alpha;
        let step = |smoothed: &mut f32, raw: f32| {
            let next = a * raw + (1.0 - a) * *smoothed;
            if next.is_finite() {
                *smoothed = next;
            }
        };
        let s = &mut self.smoothed;
        step(&mut s.bass, raw.bass);
        step(&mut s.mid, raw.mid);
        step(&mut s.treble, raw.treble);
        *s
    }

    /// Zero the smoothed accumulators
    pub fn reset(&mut self) {
        self.smoothed = BandEnergies::default();
    }
}
