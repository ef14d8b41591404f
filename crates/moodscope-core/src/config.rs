//! Analyzer and interpreter configuration
//!
//! Both structs deserialize with per-field defaults so a partial TOML table
//! only overrides what it names.

use crate::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};

/// Default transform length (log2 = 10)
pub const DEFAULT_FFT_SIZE: usize = 1024;
/// Smallest accepted transform length
pub const MIN_FFT_SIZE: usize = 64;
/// Default rolling-average capacity, in blocks
pub const DEFAULT_ROLLING_WINDOW: usize = 120;
/// Default EMA factor for band energies (lower = smoother, higher = snappier)
pub const DEFAULT_BAND_SMOOTHING: f32 = 0.15;

/// Configuration for [`AudioAnalyzer`](crate::AudioAnalyzer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// FFT size (power of 2)
    pub fft_size: usize,
    /// Number of per-block RMS values averaged into `rolling_avg`
    pub rolling_window: usize,
    /// EMA factor applied to raw band energies, in (0, 1]
    pub band_smoothing: f32,
    /// Upper edge of the bass band in Hz
    pub bass_cutoff_hz: f32,
    /// Lower edge of the treble band in Hz
    pub treble_cutoff_hz: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            band_smoothing: DEFAULT_BAND_SMOOTHING,
            bass_cutoff_hz: 250.0,
            treble_cutoff_hz: 4000.0,
        }
    }
}

impl AnalyzerConfig {
    /// Number of non-redundant bins produced per pass (DC through Nyquist)
    pub fn spectrum_size(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Check every field, returning the first violation found
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < MIN_FFT_SIZE || !self.fft_size.is_power_of_two() {
            return Err(AnalyzerError::InvalidFftSize(self.fft_size));
        }
        if self.rolling_window == 0 {
            return Err(AnalyzerError::InvalidRollingWindow);
        }
        if !(self.band_smoothing > 0.0 && self.band_smoothing <= 1.0) {
            return Err(AnalyzerError::InvalidSmoothing(self.band_smoothing));
        }
        let cutoffs_ok = self.bass_cutoff_hz.is_finite()
            && self.treble_cutoff_hz.is_finite()
            && self.bass_cutoff_hz > 0.0
            && self.bass_cutoff_hz < self.treble_cutoff_hz;
        if !cutoffs_ok {
            return Err(AnalyzerError::InvalidBandCutoffs {
                bass: self.bass_cutoff_hz,
                treble: self.treble_cutoff_hz,
            });
        }
        Ok(())
    }
}

/// Tuning for [`MusicalInterpreter`](crate::MusicalInterpreter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// RMS level mapped to full energy
    pub loudness_ceiling: f32,
    /// Share of instantaneous RMS in the energy blend; the rest is the rolling average
    pub rms_weight: f32,
    /// Share of energy in the melancholy heuristic; the rest is brightness
    pub energy_melancholy_weight: f32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            loudness_ceiling: 0.5,
            rms_weight: 0.6,
            energy_melancholy_weight: 0.6,
        }
    }
}

impl InterpreterConfig {
    /// Check every field, returning the first violation found
    pub fn validate(&self) -> Result<()> {
        if !(self.loudness_ceiling.is_finite() && self.loudness_ceiling > 0.0) {
            return Err(AnalyzerError::InvalidInterpreterSetting {
                name: "loudness_ceiling",
                value: self.loudness_ceiling,
            });
        }
        for (name, value) in [
            ("rms_weight", self.rms_weight),
            ("energy_melancholy_weight", self.energy_melancholy_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalyzerError::InvalidInterpreterSetting { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.spectrum_size(), 513);
        assert!(InterpreterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_fft_size() {
        for size in [0, 32, 1000, 1025] {
            let config = AnalyzerConfig {
                fft_size: size,
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(AnalyzerError::InvalidFftSize(size)));
        }
    }

    #[test]
    fn test_rejects_bad_smoothing_and_window() {
        let config = AnalyzerConfig {
            band_smoothing: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(AnalyzerError::InvalidSmoothing(0.0)));

        let config = AnalyzerConfig {
            band_smoothing: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalyzerConfig {
            rolling_window: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(AnalyzerError::InvalidRollingWindow));
    }

    #[test]
    fn test_rejects_inverted_cutoffs() {
        let config = AnalyzerConfig {
            bass_cutoff_hz: 5000.0,
            treble_cutoff_hz: 4000.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyzerError::InvalidBandCutoffs { .. })
        ));
    }

    #[test]
    fn test_interpreter_weights_checked() {
        let config = InterpreterConfig {
            rms_weight: 1.5,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(AnalyzerError::InvalidInterpreterSetting {
                name: "rms_weight",
                value: 1.5
            })
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalyzerConfig = toml::from_str("rolling_window = 30").unwrap();
        assert_eq!(config.rolling_window, 30);
        assert_eq!(config.fft_size, DEFAULT_FFT_SIZE);
        assert_eq!(config.band_smoothing, DEFAULT_BAND_SMOOTHING);
    }
}
