//! Audio analyzer - per-buffer feature extraction with thread-safe snapshots
//!
//! [`AudioAnalyzer::process_buffer`] runs on the audio callback thread. It owns
//! every working buffer and publishes results through shared state that any
//! number of [`AnalyzerReader`]s poll from other threads:
//!
//! - **RMS slot**: lock-free `AtomicU32` holding the latest block RMS
//! - **Rolling average**: its own short mutex (see [`RollingAverage`])
//! - **Frame**: features, band energies and spectrum of one completed pass,
//!   copied in under a single mutex so readers never mix two passes
//!
//! Nothing here allocates, blocks on I/O or returns an error once constructed.

use crate::bands::{BandCutoffs, BandEnergies, BandEnergyComputer};
use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::rolling_average::RollingAverage;
use crate::spectrum::{is_valid_sample_rate, sanitize, SpectralAnalyzer};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Loudness features of the most recent block
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Root-mean-square amplitude of the block (>= 0)
    pub rms: f32,
    /// Mean of the last N block RMS values
    pub rolling_avg: f32,
}

/// One mono block as delivered by the capture layer
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    /// Samples, nominally in [-1, 1]
    pub samples: &'a [f32],
    /// Stream sample rate in Hz; 0 or non-finite when not known yet
    pub sample_rate: f32,
}

impl<'a> AudioBlock<'a> {
    /// Wrap a mono sample slice
    pub fn new(samples: &'a [f32], sample_rate: f32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Average interleaved frames down to mono, replacing the contents of `out`.
    ///
    /// A trailing partial frame is dropped. `channels == 0` yields an empty block.
    pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
        out.clear();
        if channels == 0 {
            return;
        }
        let scale = 1.0 / channels as f32;
        out.extend(
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().map(|&s| sanitize(s)).sum::<f32>() * scale),
        );
    }
}

/// Scalar results of one completed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// RMS and rolling average
    pub features: AudioFeatures,
    /// Smoothed band energies
    pub bands: BandEnergies,
    /// Sample rate the spectrum was computed at, 0.0 if unknown
    pub sample_rate: f32,
    /// Timestamp passed with the buffer
    pub timestamp: f64,
    /// Completed passes since construction or reset (0 = none)
    pub sequence: u64,
}

/// A frame together with the spectrum from the same pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSnapshot {
    /// Scalar results
    pub frame: FrameSnapshot,
    /// Per-bin magnitudes, DC through Nyquist
    pub spectrum: Vec<f32>,
}

/// Read-side view of analysis results
pub trait FeatureSource {
    /// Latest completed frame
    fn frame(&self) -> FrameSnapshot;
}

#[derive(Debug)]
struct Published {
    frame: FrameSnapshot,
    spectrum: Vec<f32>,
}

#[derive(Debug)]
struct SharedState {
    rms_bits: AtomicU32,
    rolling: RollingAverage,
    published: Mutex<Published>,
}

impl SharedState {
    fn new(config: &AnalyzerConfig) -> Self {
        Self {
            rms_bits: AtomicU32::new(0.0f32.to_bits()),
            rolling: RollingAverage::new(config.rolling_window),
            published: Mutex::new(Published {
                frame: FrameSnapshot::default(),
                spectrum: vec![0.0; config.spectrum_size()],
            }),
        }
    }

    fn current_rms(&self) -> f32 {
        f32::from_bits(self.rms_bits.load(Ordering::Acquire))
    }

    fn frame(&self) -> FrameSnapshot {
        self.published.lock().frame
    }

    fn spectrum_size(&self) -> usize {
        self.published.lock().spectrum.len()
    }

    fn spectrum_magnitudes(&self) -> Vec<f32> {
        // Allocate before locking so the critical section is a plain copy
        let mut out = Vec::with_capacity(self.spectrum_size());
        let published = self.published.lock();
        out.extend_from_slice(&published.spectrum);
        out
    }

    fn copy_spectrum_into(&self, out: &mut [f32]) -> FrameSnapshot {
        let published = self.published.lock();
        let n = out.len().min(published.spectrum.len());
        out[..n].copy_from_slice(&published.spectrum[..n]);
        out[n..].fill(0.0);
        published.frame
    }

    fn snapshot(&self) -> AnalysisSnapshot {
        let mut spectrum = vec![0.0; self.spectrum_size()];
        let frame = self.copy_spectrum_into(&mut spectrum);
        AnalysisSnapshot { frame, spectrum }
    }
}

/// Cloneable, thread-safe handle for reading the analyzer's latest results
#[derive(Debug, Clone)]
pub struct AnalyzerReader {
    shared: Arc<SharedState>,
}

impl AnalyzerReader {
    /// Latest `{rms, rolling_avg}` from the last completed pass
    pub fn features(&self) -> AudioFeatures {
        self.shared.frame().features
    }

    /// Latest block RMS, read lock-free
    pub fn current_rms(&self) -> f32 {
        self.shared.current_rms()
    }

    /// Live mean of the rolling window
    pub fn rolling_average(&self) -> f32 {
        self.shared.rolling.average()
    }

    /// Copy of the latest spectrum
    pub fn spectrum_magnitudes(&self) -> Vec<f32> {
        self.shared.spectrum_magnitudes()
    }

    /// Copy the latest spectrum into `out` without allocating.
    ///
    /// Returns the frame from the same pass. Extra slots in `out` are zeroed.
    pub fn copy_spectrum_into(&self, out: &mut [f32]) -> FrameSnapshot {
        self.shared.copy_spectrum_into(out)
    }

    /// Latest smoothed band energies
    pub fn band_energies(&self) -> BandEnergies {
        self.shared.frame().bands
    }

    /// Sample rate of the latest pass, 0.0 until a valid buffer arrives
    pub fn sample_rate(&self) -> f32 {
        self.shared.frame().sample_rate
    }

    /// Frame and spectrum from the same pass
    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.shared.snapshot()
    }

    /// Number of bins in the spectrum
    pub fn spectrum_size(&self) -> usize {
        self.shared.spectrum_size()
    }

    /// Resize the rolling window, discarding its contents
    pub fn set_rolling_window(&self, size: usize) {
        self.shared.rolling.set_max_size(size);
    }

    /// Current rolling window capacity
    pub fn rolling_window(&self) -> usize {
        self.shared.rolling.max_size()
    }
}

impl FeatureSource for AnalyzerReader {
    fn frame(&self) -> FrameSnapshot {
        self.shared.frame()
    }
}

/// Per-buffer audio feature extractor
#[derive(Debug)]
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    spectral: SpectralAnalyzer,
    bands: BandEnergyComputer,
    shared: Arc<SharedState>,
    reader: AnalyzerReader,
    sequence: u64,
    /// Set while buffers keep arriving without a usable sample rate
    missing_rate_reported: bool,
}

impl AudioAnalyzer {
    /// Validate `config` and allocate every working buffer.
    ///
    /// This is the only fallible step: an analyzer that exists accepts any input.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let spectral = SpectralAnalyzer::new(config.fft_size)?;
        let bands = BandEnergyComputer::new(&config);
        let shared = Arc::new(SharedState::new(&config));
        let reader = AnalyzerReader {
            shared: Arc::clone(&shared),
        };

        debug!(
            "AudioAnalyzer created: fft_size={}, rolling_window={}, band_smoothing={}, cutoffs={}Hz/{}Hz",
            config.fft_size,
            config.rolling_window,
            config.band_smoothing,
            config.bass_cutoff_hz,
            config.treble_cutoff_hz
        );

        Ok(Self {
            config,
            spectral,
            bands,
            shared,
            reader,
            sequence: 0,
            missing_rate_reported: false,
        })
    }

    /// Handle for consumer threads
    pub fn reader(&self) -> AnalyzerReader {
        self.reader.clone()
    }

    /// Settings the analyzer was built with.
    ///
    /// Later window resizes are not mirrored here; see [`AudioAnalyzer::rolling_window`].
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Process one delivered block. Call from the audio thread only.
    ///
    /// Empty blocks count as silence. Non-finite samples are treated as 0.0.
    pub fn process_buffer(&mut self, buffer: AudioBlock<'_>, timestamp: f64) {
        let samples = buffer.samples;

        // 1. RMS into the lock-free slot
        let rms = calculate_rms(samples);
        self.shared.rms_bits.store(rms.to_bits(), Ordering::Release);

        // 2. Rolling average
        let rolling_avg = self.shared.rolling.push_and_average(rms);

        // 3. Spectrum
        if !is_valid_sample_rate(buffer.sample_rate) && self.spectral.sample_rate() == 0.0 {
            if !self.missing_rate_reported {
                warn!(
                    "AudioAnalyzer: buffer without a valid sample rate ({}), spectrum held at zero",
                    buffer.sample_rate
                );
                self.missing_rate_reported = true;
            }
        } else {
            self.missing_rate_reported = false;
        }
        self.spectral.analyze(samples, buffer.sample_rate);
        let sample_rate = self.spectral.sample_rate();
        let spectrum = self.spectral.magnitudes();

        // 4. Band energies
        let bands = self.bands.update(spectrum, sample_rate);

        // 5. Publish everything from this pass at once
        self.sequence += 1;
        let frame = FrameSnapshot {
            features: AudioFeatures { rms, rolling_avg },
            bands,
            sample_rate,
            timestamp,
            sequence: self.sequence,
        };
        {
            let mut published = self.shared.published.lock();
            published.spectrum.copy_from_slice(spectrum);
            published.frame = frame;
        }

        if self.sequence % 500 == 0 {
            trace!(
                "AudioAnalyzer pass #{}: rms={:.4}, avg={:.4}, bands={:?}",
                self.sequence,
                rms,
                rolling_avg,
                bands
            );
        }
    }

    /// Latest `{rms, rolling_avg}` from the last completed pass
    pub fn features(&self) -> AudioFeatures {
        self.reader.features()
    }

    /// Latest block RMS, read lock-free
    pub fn current_rms(&self) -> f32 {
        self.reader.current_rms()
    }

    /// Copy of the latest spectrum
    pub fn spectrum_magnitudes(&self) -> Vec<f32> {
        self.reader.spectrum_magnitudes()
    }

    /// Latest smoothed band energies
    pub fn band_energies(&self) -> BandEnergies {
        self.reader.band_energies()
    }

    /// Sample rate of the latest pass, 0.0 until a valid buffer arrives
    pub fn sample_rate(&self) -> f32 {
        self.reader.sample_rate()
    }

    /// Frame and spectrum from the same pass
    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.reader.snapshot()
    }

    /// Band bin boundaries in use, `None` before a valid sample rate
    pub fn band_cutoffs(&self) -> Option<BandCutoffs> {
        self.bands.cutoffs()
    }

    /// Resize the rolling window, discarding its contents
    pub fn set_rolling_window(&self, size: usize) {
        self.reader.set_rolling_window(size);
    }

    /// Live rolling window capacity, including resizes made through a reader
    pub fn rolling_window(&self) -> usize {
        self.reader.rolling_window()
    }

    /// Return to the just-constructed state, keeping the known sample rate
    pub fn reset(&mut self) {
        self.shared.rolling.clear();
        self.shared.rms_bits.store(0.0f32.to_bits(), Ordering::Release);
        self.spectral.clear();
        self.bands.reset();
        self.sequence = 0;

        let mut published = self.shared.published.lock();
        published.spectrum.fill(0.0);
        published.frame = FrameSnapshot {
            sample_rate: self.spectral.sample_rate(),
            ..FrameSnapshot::default()
        };
        drop(published);

        debug!("AudioAnalyzer reset");
    }
}

impl FeatureSource for AudioAnalyzer {
    fn frame(&self) -> FrameSnapshot {
        self.shared.frame()
    }
}

/// RMS of a block with non-finite samples counted as silence; 0.0 when empty
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let s = sanitize(s) as f64;
            s * s
        })
        .sum();
    let rms = (sum / samples.len() as f64).sqrt() as f32;
    if rms.is_finite() {
        rms
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzerError;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin() * amplitude
            })
            .collect()
    }

    #[test]
    fn test_create_analyzer() {
        let analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        assert_eq!(analyzer.sample_rate(), 0.0);
        assert_eq!(analyzer.features(), AudioFeatures::default());
        assert_eq!(analyzer.spectrum_magnitudes().len(), 513);
        assert_eq!(analyzer.band_energies(), BandEnergies::default());
        assert!(analyzer.band_cutoffs().is_none());
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let config = AnalyzerConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert_eq!(
            AudioAnalyzer::new(config).unwrap_err(),
            AnalyzerError::InvalidFftSize(1000)
        );
    }

    #[test]
    fn test_rms_calculation() {
        // Sine wave at 0.5 amplitude should give RMS of ~0.35
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
        let rms = calculate_rms(&samples);
        assert!(rms > 0.3 && rms < 0.4, "RMS was {}", rms);

        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[f32::NAN, f32::INFINITY]), 0.0);
    }

    #[test]
    fn test_process_buffer_publishes_frame() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let samples = sine(440.0, 44100.0, 1024, 0.5);
        analyzer.process_buffer(AudioBlock::new(&samples, 44100.0), 1.25);

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.frame.sequence, 1);
        assert_eq!(snapshot.frame.timestamp, 1.25);
        assert_eq!(snapshot.frame.sample_rate, 44100.0);
        assert!(snapshot.frame.features.rms > 0.3);
        assert_eq!(snapshot.frame.features.rms, analyzer.current_rms());
        // First push: the rolling mean is the value itself
        assert_eq!(
            snapshot.frame.features.rolling_avg,
            snapshot.frame.features.rms
        );
        assert!(snapshot.spectrum.iter().any(|&m| m > 0.0));
        assert!(snapshot.frame.bands.mid > 0.0);
        assert!(analyzer.band_cutoffs().is_some());
    }

    #[test]
    fn test_empty_block_is_silence() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        analyzer.process_buffer(AudioBlock::new(&[], 48000.0), 0.0);
        let frame = analyzer.frame();
        assert_eq!(frame.features.rms, 0.0);
        assert_eq!(frame.sequence, 1);
        assert!(analyzer.spectrum_magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_unknown_sample_rate_is_not_fatal() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let samples = sine(440.0, 44100.0, 1024, 0.5);
        analyzer.process_buffer(AudioBlock::new(&samples, 0.0), 0.0);

        assert!(analyzer.current_rms() > 0.0);
        assert_eq!(analyzer.sample_rate(), 0.0);
        assert!(analyzer.spectrum_magnitudes().iter().all(|&m| m == 0.0));
        assert_eq!(analyzer.band_energies(), BandEnergies::default());

        analyzer.process_buffer(AudioBlock::new(&samples, 44100.0), 0.02);
        assert_eq!(analyzer.sample_rate(), 44100.0);
        assert!(analyzer.spectrum_magnitudes().iter().any(|&m| m > 0.0));
    }

    #[test]
    fn test_resilience_to_bad_input() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let bad_samples = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 0.0];
        analyzer.process_buffer(AudioBlock::new(&bad_samples, 44100.0), 0.0);

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.frame.features.rms, 0.0);
        assert!(snapshot.spectrum.iter().all(|m| m.is_finite()));
        assert!(snapshot.frame.bands.total().is_finite());
    }

    #[test]
    fn test_reader_sees_producer_updates() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let reader = analyzer.reader();
        assert_eq!(reader.frame().sequence, 0);

        analyzer.process_buffer(AudioBlock::new(&[0.5; 256], 44100.0), 0.0);
        assert_eq!(reader.frame().sequence, 1);
        assert!((reader.features().rms - 0.5).abs() < 1e-6);
        assert!((reader.rolling_average() - 0.5).abs() < 1e-6);
        assert_eq!(reader.spectrum_size(), 513);
    }

    #[test]
    fn test_copy_spectrum_into_pads_with_zero() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let samples = sine(1000.0, 44100.0, 1024, 0.5);
        analyzer.process_buffer(AudioBlock::new(&samples, 44100.0), 0.0);

        let mut out = vec![7.0f32; 600];
        let frame = analyzer.reader().copy_spectrum_into(&mut out);
        assert_eq!(frame.sequence, 1);
        assert_eq!(&out[..513], analyzer.spectrum_magnitudes().as_slice());
        assert!(out[513..].iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_set_rolling_window_clears_average() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        analyzer.process_buffer(AudioBlock::new(&[0.5; 256], 44100.0), 0.0);
        analyzer.set_rolling_window(4);
        assert_eq!(analyzer.reader().rolling_average(), 0.0);
        assert_eq!(analyzer.rolling_window(), 4);

        for _ in 0..10 {
            analyzer.process_buffer(AudioBlock::new(&[0.25; 256], 44100.0), 0.0);
        }
        assert!((analyzer.features().rolling_avg - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_reader_resize_visible_through_analyzer() {
        let analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        analyzer.reader().set_rolling_window(7);

        assert_eq!(analyzer.rolling_window(), 7);
        assert_eq!(analyzer.reader().rolling_window(), 7);
        // Construction-time settings stay as given
        assert_eq!(analyzer.config().rolling_window, 120);
    }

    #[test]
    fn test_rms_of_huge_samples_is_finite() {
        // s * s overflows f32 here
        assert!((calculate_rms(&[1e30; 64]) - 1e30).abs() / 1e30 < 1e-6);
        assert!(calculate_rms(&[f32::MAX; 64]).is_finite());
    }

    #[test]
    fn test_reset() {
        let mut analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let samples = sine(440.0, 44100.0, 1024, 0.5);
        analyzer.process_buffer(AudioBlock::new(&samples, 44100.0), 0.0);
        assert!(analyzer.current_rms() > 0.0);

        analyzer.reset();

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.frame.sequence, 0);
        assert_eq!(snapshot.frame.features, AudioFeatures::default());
        assert_eq!(snapshot.frame.bands, BandEnergies::default());
        assert_eq!(snapshot.frame.sample_rate, 44100.0);
        assert!(snapshot.spectrum.iter().all(|&m| m == 0.0));
        assert_eq!(analyzer.current_rms(), 0.0);
    }

    #[test]
    fn test_downmix() {
        let interleaved = [1.0, 0.0, 0.5, 0.5, f32::NAN, 1.0, 0.3];
        let mut mono = Vec::new();
        AudioBlock::downmix_into(&interleaved, 2, &mut mono);
        assert_eq!(mono, vec![0.5, 0.5, 0.5]);

        AudioBlock::downmix_into(&interleaved, 0, &mut mono);
        assert!(mono.is_empty());
    }
}
