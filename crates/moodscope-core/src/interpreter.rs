//! Maps analyzer frames onto a [`MusicalContext`].
//!
//! The interpreter holds only its tuning, so one instance can be shared
//! across threads and called at any rate alongside the audio thread.

use crate::analyzer::{FeatureSource, FrameSnapshot};
use crate::config::InterpreterConfig;
use crate::context::{MusicalContext, PitchEstimate};
use crate::error::Result;

/// Totals below this are treated as silence when computing brightness
const SILENCE_FLOOR: f32 = 1e-9;

/// Stateless mapping from numeric features to semantic ones
#[derive(Debug, Clone, Default)]
pub struct MusicalInterpreter {
    config: InterpreterConfig,
}

impl MusicalInterpreter {
    /// Create an interpreter with validated tuning
    pub fn new(config: InterpreterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active tuning
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Derive a context from one frame
    pub fn interpret(&self, frame: &FrameSnapshot) -> MusicalContext {
        let energy = self.energy(frame);
        let brightness = Self::brightness(frame);

        let w = self.config.energy_melancholy_weight;
        let melancholy = 1.0 - (w * energy + (1.0 - w) * brightness);

        MusicalContext {
            energy,
            brightness,
            melancholy: clamp_unit(melancholy),
            pitch: PitchEstimate::Unavailable,
        }
    }

    /// Interpret the latest frame of an analyzer or reader
    pub fn interpret_source<S: FeatureSource + ?Sized>(&self, source: &S) -> MusicalContext {
        self.interpret(&source.frame())
    }

    /// Current loudness blended with its trend, scaled by the loudness ceiling
    fn energy(&self, frame: &FrameSnapshot) -> f32 {
        let features = frame.features;
        let w = self.config.rms_weight;
        let blended = w * features.rms + (1.0 - w) * features.rolling_avg;
        clamp_unit(blended / self.config.loudness_ceiling)
    }

    /// Treble share of the band total, 0.0 for silence
    fn brightness(frame: &FrameSnapshot) -> f32 {
        let total = frame.bands.total();
        if total.is_nan() || total <= SILENCE_FLOOR {
            return 0.0;
        }
        clamp_unit(frame.bands.treble / total)
    }
}

/// Clamp into [0, 1], mapping NaN to 0
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AudioFeatures;
    use crate::bands::BandEnergies;
    use crate::error::AnalyzerError;

    fn frame(rms: f32, rolling_avg: f32, bass: f32, mid: f32, treble: f32) -> FrameSnapshot {
        FrameSnapshot {
            features: AudioFeatures { rms, rolling_avg },
            bands: BandEnergies { bass, mid, treble },
            sample_rate: 44100.0,
            timestamp: 0.0,
            sequence: 1,
        }
    }

    #[test]
    fn test_silence() {
        let interpreter = MusicalInterpreter::default();
        let ctx = interpreter.interpret(&FrameSnapshot::default());
        assert_eq!(ctx.energy, 0.0);
        assert_eq!(ctx.brightness, 0.0);
        assert_eq!(ctx.melancholy, 1.0);
        assert_eq!(ctx.dominant_pitch(), 0.0);
        assert_eq!(ctx.pitch_confidence(), 0.0);
    }

    #[test]
    fn test_energy_blend() {
        let interpreter = MusicalInterpreter::default();
        // 0.6 * 0.2 + 0.4 * 0.1 = 0.16, / 0.5 ceiling = 0.32
        let ctx = interpreter.interpret(&frame(0.2, 0.1, 1.0, 1.0, 1.0));
        assert!((ctx.energy - 0.32).abs() < 1e-6, "energy={}", ctx.energy);

        let ctx = interpreter.interpret(&frame(0.9, 0.9, 1.0, 1.0, 1.0));
        assert_eq!(ctx.energy, 1.0);
    }

    #[test]
    fn test_brightness_ratio() {
        let interpreter = MusicalInterpreter::default();
        let ctx = interpreter.interpret(&frame(0.1, 0.1, 1.0, 1.0, 2.0));
        assert!((ctx.brightness - 0.5).abs() < 1e-6);

        let dark = interpreter.interpret(&frame(0.1, 0.1, 4.0, 1.0, 0.0));
        assert_eq!(dark.brightness, 0.0);
    }

    #[test]
    fn test_melancholy_is_inverse_of_energy_and_brightness() {
        let interpreter = MusicalInterpreter::default();
        let quiet_dark = interpreter.interpret(&frame(0.02, 0.02, 5.0, 1.0, 0.1));
        let loud_bright = interpreter.interpret(&frame(0.4, 0.4, 1.0, 1.0, 5.0));
        assert!(quiet_dark.melancholy > loud_bright.melancholy);
        assert!(quiet_dark.melancholy > 0.8);
        assert!(loud_bright.melancholy < 0.3);
    }

    #[test]
    fn test_outputs_stay_in_unit_range() {
        let interpreter = MusicalInterpreter::default();
        for f in [
            frame(f32::NAN, 0.0, 1.0, 1.0, 1.0),
            frame(100.0, 100.0, 0.0, 0.0, 1e9),
            frame(-1.0, -1.0, 0.0, 0.0, 0.0),
            frame(0.3, 0.3, f32::INFINITY, 0.0, 1.0),
        ] {
            let ctx = interpreter.interpret(&f);
            for v in [ctx.energy, ctx.brightness, ctx.melancholy] {
                assert!((0.0..=1.0).contains(&v), "{:?}", ctx);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let interpreter = MusicalInterpreter::default();
        let f = frame(0.17, 0.21, 2.0, 3.0, 0.7);
        assert_eq!(interpreter.interpret(&f), interpreter.interpret(&f));
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = InterpreterConfig {
            loudness_ceiling: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            MusicalInterpreter::new(config),
            Err(AnalyzerError::InvalidInterpreterSetting {
                name: "loudness_ceiling",
                ..
            })
        ));
    }
}
