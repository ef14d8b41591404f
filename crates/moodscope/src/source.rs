//! Block sources standing in for a live capture device.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use moodscope_core::AudioBlock;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Delivers mono audio one block at a time
pub trait BlockSource: Send {
    /// Sample rate of the delivered audio
    fn sample_rate(&self) -> u32;

    /// Replace `block` with up to `block_size` samples.
    ///
    /// Returns `false` once the source is exhausted (and leaves `block` empty).
    fn next_block(&mut self, block: &mut Vec<f32>, block_size: usize) -> bool;
}

/// Sine generator of fixed length
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    position: u64,
    total: u64,
}

impl ToneSource {
    /// `duration_secs` of a sine at `frequency` Hz
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32, duration_secs: f32) -> Self {
        let total = (duration_secs.max(0.0) as f64 * sample_rate as f64).round() as u64;
        info!(
            "Tone source: {}Hz, amplitude {}, {} samples at {}Hz",
            frequency, amplitude, total, sample_rate
        );
        Self {
            frequency,
            amplitude,
            sample_rate,
            position: 0,
            total,
        }
    }
}

impl BlockSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, block: &mut Vec<f32>, block_size: usize) -> bool {
        block.clear();
        let end = (self.position + block_size as u64).min(self.total);
        let step = 2.0 * std::f64::consts::PI * self.frequency as f64 / self.sample_rate as f64;
        block.extend(
            (self.position..end).map(|n| ((n as f64 * step).sin() * self.amplitude as f64) as f32),
        );
        self.position = end;
        !block.is_empty()
    }
}

/// WAV file decoded up front and downmixed to mono
#[derive(Debug, Clone)]
pub struct WavSource {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
}

impl WavSource {
    /// Decode the file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {:?}", path))?;
        let source = Self::from_reader(reader)
            .with_context(|| format!("Failed to decode WAV file: {:?}", path))?;
        info!(
            "WAV source {:?}: {} mono samples at {}Hz ({:.1}s)",
            path,
            source.samples.len(),
            source.sample_rate,
            source.duration_secs()
        );
        Ok(source)
    }

    /// Decode from an already opened reader
    pub fn from_reader<R: Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let mut samples = Vec::with_capacity(interleaved.len() / spec.channels.max(1) as usize);
        AudioBlock::downmix_into(&interleaved, spec.channels as usize, &mut samples);

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            position: 0,
        })
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

impl BlockSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, block: &mut Vec<f32>, block_size: usize) -> bool {
        block.clear();
        let end = (self.position + block_size).min(self.samples.len());
        block.extend_from_slice(&self.samples[self.position..end]);
        self.position = end;
        !block.is_empty()
    }
}
