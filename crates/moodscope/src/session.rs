//! Replay session: one producer thread feeding the analyzer, one consumer polling it
//!
//! The producer plays the role of the audio callback: it pulls a block from the
//! source, hands it to [`AudioAnalyzer::process_buffer`] and (unless running
//! fast) sleeps until the block's wall-clock deadline. The consumer ticks at
//! the poll rate, reads the latest frame and interprets it, the way a render
//! loop would.

use crate::source::BlockSource;
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, select, tick};
use moodscope_core::{
    AudioAnalyzer, AudioBlock, BandEnergies, FeatureSource, MusicalContext, MusicalInterpreter,
};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Pacing and polling settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Samples per delivered block
    pub block_size: usize,
    /// Consumer polls per second
    pub poll_rate: f32,
    /// Sleep between blocks to match the source's sample rate
    pub realtime: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            block_size: 1024,
            poll_rate: 60.0,
            realtime: true,
        }
    }
}

/// What the producer saw
#[derive(Debug, Clone, Copy, Default)]
struct ProducerStats {
    blocks: u64,
    samples: u64,
    peak_rms: f32,
}

/// Final report printed when the source runs dry
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Blocks delivered to the analyzer
    pub blocks_processed: u64,
    /// Audio duration replayed, in seconds
    pub audio_seconds: f64,
    /// Wall-clock duration of the session, in seconds
    pub elapsed_seconds: f64,
    /// Sample rate reported by the analyzer
    pub sample_rate: f32,
    /// Loudest block
    pub peak_rms: f32,
    /// Consumer polls performed
    pub polls: u64,
    /// Rolling average at the end of the session
    pub final_rolling_avg: f32,
    /// Band energies at the end of the session
    pub final_bands: BandEnergies,
    /// Context derived from the last frame
    pub final_context: MusicalContext,
}

/// Run `source` through `analyzer` until it is exhausted
pub fn run(
    mut source: Box<dyn BlockSource>,
    mut analyzer: AudioAnalyzer,
    interpreter: MusicalInterpreter,
    options: SessionOptions,
) -> Result<SessionSummary> {
    let reader = analyzer.reader();
    let sample_rate = source.sample_rate();
    let block_size = options.block_size.max(1);
    let realtime = options.realtime;
    let started = Instant::now();

    // Dropped by the producer on exit, which wakes the consumer
    let (done_tx, done_rx) = bounded::<()>(1);

    info!(
        "Session started: {}Hz, block_size={}, poll_rate={}Hz, realtime={}",
        sample_rate, block_size, options.poll_rate, realtime
    );

    let producer = thread::Builder::new()
        .name("moodscope-audio".into())
        .spawn(move || {
            let _done = done_tx;
            let mut stats = ProducerStats::default();
            let mut block = Vec::with_capacity(block_size);
            let rate = sample_rate as f64;

            while source.next_block(&mut block, block_size) {
                let timestamp = if rate > 0.0 {
                    stats.samples as f64 / rate
                } else {
                    0.0
                };
                analyzer.process_buffer(AudioBlock::new(&block, sample_rate as f32), timestamp);

                stats.blocks += 1;
                stats.samples += block.len() as u64;
                stats.peak_rms = stats.peak_rms.max(analyzer.current_rms());

                if realtime && rate > 0.0 {
                    let deadline = started + Duration::from_secs_f64(stats.samples as f64 / rate);
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }
                }
            }

            debug!("Producer finished after {} blocks", stats.blocks);
            stats
        })?;

    let poll_interval = Duration::from_secs_f64(1.0 / options.poll_rate.max(0.001) as f64);
    let report_every = (options.poll_rate.round() as u64).max(1);
    let ticker = tick(poll_interval);
    let mut polls = 0u64;

    loop {
        select! {
            recv(ticker) -> _ => {
                let frame = reader.frame();
                let context = interpreter.interpret(&frame);
                polls += 1;
                if polls % report_every == 0 {
                    info!(
                        "t={:.2}s rms={:.3} avg={:.3} energy={:.2} brightness={:.2} melancholy={:.2}",
                        frame.timestamp,
                        frame.features.rms,
                        frame.features.rolling_avg,
                        context.energy,
                        context.brightness,
                        context.melancholy
                    );
                }
            }
            recv(done_rx) -> _ => break,
        }
    }

    let stats = producer
        .join()
        .map_err(|_| anyhow!("Audio producer thread panicked"))?;

    let snapshot = reader.snapshot();
    let summary = SessionSummary {
        blocks_processed: stats.blocks,
        audio_seconds: if sample_rate > 0 {
            stats.samples as f64 / sample_rate as f64
        } else {
            0.0
        },
        elapsed_seconds: started.elapsed().as_secs_f64(),
        sample_rate: snapshot.frame.sample_rate,
        peak_rms: stats.peak_rms,
        polls,
        final_rolling_avg: snapshot.frame.features.rolling_avg,
        final_bands: snapshot.frame.bands,
        final_context: interpreter.interpret(&snapshot.frame),
    };

    info!(
        "Session finished: {} blocks, {:.1}s of audio in {:.1}s",
        summary.blocks_processed, summary.audio_seconds, summary.elapsed_seconds
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ToneSource;
    use moodscope_core::AnalyzerConfig;

    fn fast_options() -> SessionOptions {
        SessionOptions {
            block_size: 1024,
            poll_rate: 200.0,
            realtime: false,
        }
    }

    #[test]
    fn test_tone_session_summary() {
        let source = Box::new(ToneSource::new(440.0, 0.5, 44100, 2.0));
        let analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let summary = run(source, analyzer, MusicalInterpreter::default(), fast_options()).unwrap();

        // 88200 samples / 1024 rounds up
        assert_eq!(summary.blocks_processed, 87);
        assert!((summary.audio_seconds - 2.0).abs() < 1e-9);
        assert_eq!(summary.sample_rate, 44100.0);
        // Sine of amplitude 0.5 has RMS ~0.354; the short final block may read a bit higher
        assert!(
            summary.peak_rms > 0.34 && summary.peak_rms < 0.5,
            "{}",
            summary.peak_rms
        );
        assert!(summary.final_rolling_avg > 0.3);
        assert!(summary.final_bands.mid > summary.final_bands.treble);
        assert_eq!(summary.final_context.dominant_pitch(), 0.0);
        assert!(summary.final_context.energy > 0.5);
    }

    #[test]
    fn test_empty_source_finishes_immediately() {
        let source = Box::new(ToneSource::new(440.0, 0.5, 44100, 0.0));
        let analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let summary = run(source, analyzer, MusicalInterpreter::default(), fast_options()).unwrap();

        assert_eq!(summary.blocks_processed, 0);
        assert_eq!(summary.sample_rate, 0.0);
        assert_eq!(summary.final_context.energy, 0.0);
    }

    #[test]
    fn test_summary_serializes() {
        let source = Box::new(ToneSource::new(220.0, 0.2, 8000, 0.25));
        let analyzer = AudioAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let summary = run(source, analyzer, MusicalInterpreter::default(), fast_options()).unwrap();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["blocks_processed"], 2);
        assert_eq!(json["final_context"]["pitch"]["state"], "unavailable");
    }
}
