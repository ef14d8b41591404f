//! Moodscope Core - Real-time Audio Feature Extraction
//!
//! This crate turns a live mono audio stream into features for a visualizer:
//! - Block RMS and its rolling average
//! - Hann-windowed FFT magnitude spectrum
//! - Smoothed bass/mid/treble band energies
//! - Musical context (energy, brightness, melancholy, pitch)
//!
//! The audio thread drives [`AudioAnalyzer::process_buffer`]; render/UI
//! threads read results through an [`AnalyzerReader`] and turn them into a
//! [`MusicalContext`] with a [`MusicalInterpreter`].

#![warn(missing_docs)]

pub mod analyzer;
pub mod bands;
pub mod config;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod logging;
pub mod rolling_average;
pub mod spectrum;

// --- Re-exports grouped by category ---

// Analysis pipeline
pub use analyzer::{
    calculate_rms, AnalysisSnapshot, AnalyzerReader, AudioAnalyzer, AudioBlock, AudioFeatures,
    FeatureSource, FrameSnapshot,
};
pub use bands::{BandCutoffs, BandEnergies, BandEnergyComputer};
pub use rolling_average::RollingAverage;
pub use spectrum::{hann_window, SpectralAnalyzer};

// Interpretation
pub use context::{MusicalContext, PitchEstimate};
pub use interpreter::MusicalInterpreter;

// Configuration & Errors
pub use config::{AnalyzerConfig, InterpreterConfig};
pub use error::{AnalyzerError, Result};
pub use logging::LogConfig;
