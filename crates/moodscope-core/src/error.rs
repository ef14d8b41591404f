//! Error types for analyzer construction and configuration.
//!
//! Only construction can fail. Once an [`AudioAnalyzer`](crate::AudioAnalyzer)
//! exists, every buffer is accepted and degraded input shows up as flat
//! features instead of an error.

/// Result type alias for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors raised while validating configuration or building the analyzer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyzerError {
    /// FFT size must be a power of two and at least [`MIN_FFT_SIZE`](crate::config::MIN_FFT_SIZE)
    #[error("Invalid FFT size {0}: must be a power of two >= 64")]
    InvalidFftSize(usize),

    /// Rolling window capacity of zero
    #[error("Rolling window size must be greater than zero")]
    InvalidRollingWindow,

    /// Smoothing factor outside (0, 1]
    #[error("Invalid smoothing factor {0}: must be in (0, 1]")]
    InvalidSmoothing(f32),

    /// Band cutoffs must be positive and ordered bass < treble
    #[error("Invalid band cutoffs: bass={bass}Hz, treble={treble}Hz")]
    InvalidBandCutoffs {
        /// Upper edge of the bass band
        bass: f32,
        /// Lower edge of the treble band
        treble: f32,
    },

    /// Interpreter parameter out of range
    #[error("Invalid interpreter setting '{name}': {value}")]
    InvalidInterpreterSetting {
        /// Field name
        name: &'static str,
        /// Offending value
        value: f32,
    },
}
