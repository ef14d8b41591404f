//! Musical context handed to the visualization layer.

use serde::{Deserialize, Serialize};

/// Dominant pitch estimate.
///
/// No estimator is wired in yet, so every context carries `Unavailable`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PitchEstimate {
    /// No pitch could be determined
    #[default]
    Unavailable,
    /// Pitch found with the given confidence
    Detected {
        /// Fundamental frequency in Hz
        frequency_hz: f32,
        /// Confidence in [0, 1]
        confidence: f32,
    },
}

impl PitchEstimate {
    /// Frequency in Hz, 0.0 when unavailable
    pub fn frequency_hz(&self) -> f32 {
        match self {
            Self::Unavailable => 0.0,
            Self::Detected { frequency_hz, .. } => *frequency_hz,
        }
    }

    /// Confidence in [0, 1], 0.0 when unavailable
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Unavailable => 0.0,
            Self::Detected { confidence, .. } => confidence.clamp(0.0, 1.0),
        }
    }

    /// True if a pitch was detected
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Detected { .. })
    }
}

/// Semantic features derived from one analysis frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicalContext {
    /// 0-1, from RMS and its rolling average
    pub energy: f32,
    /// 0-1, share of treble in the total band energy
    pub brightness: f32,
    /// 0-1, higher for quiet, dark passages
    pub melancholy: f32,
    /// Dominant pitch, gates pitch-based features
    pub pitch: PitchEstimate,
}

impl Default for MusicalContext {
    /// Neutral mid-scale values, used before anything has been interpreted
    fn default() -> Self {
        Self {
            energy: 0.5,
            brightness: 0.5,
            melancholy: 0.5,
            pitch: PitchEstimate::Unavailable,
        }
    }
}

impl MusicalContext {
    /// Dominant pitch in Hz, 0.0 = invalid
    pub fn dominant_pitch(&self) -> f32 {
        self.pitch.frequency_hz()
    }

    /// Pitch confidence in [0, 1]
    pub fn pitch_confidence(&self) -> f32 {
        self.pitch.confidence()
    }
}
