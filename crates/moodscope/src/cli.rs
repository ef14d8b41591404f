//! Command-line argument parsing.

use crate::source::{BlockSource, ToneSource, WavSource};
use anyhow::{bail, ensure, Result};
use clap::Parser;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "moodscope")]
#[command(about = "Replay audio through the feature analyzer and report its musical context", long_about = None)]
pub struct Args {
    /// WAV file to replay
    #[arg(value_name = "WAV", conflicts_with = "tone")]
    pub input: Option<PathBuf>,

    /// Synthesize a sine tone at this frequency instead of reading a file
    #[arg(long, value_name = "HZ")]
    pub tone: Option<f32>,

    /// Length of the synthesized tone
    #[arg(long, value_name = "SECONDS", default_value = "5")]
    pub duration: f32,

    /// Sample rate of the synthesized tone
    #[arg(long, value_name = "HZ", default_value = "44100")]
    pub sample_rate: u32,

    /// Peak amplitude of the synthesized tone
    #[arg(long, default_value = "0.5")]
    pub amplitude: f32,

    /// Samples delivered per callback
    #[arg(long, value_name = "SAMPLES", default_value = "1024")]
    pub block_size: usize,

    /// How often the consumer polls the analyzer
    #[arg(long, value_name = "HZ", default_value = "60")]
    pub poll_rate: f32,

    /// Replay as fast as possible instead of at real-time pace
    #[arg(long)]
    pub fast: bool,

    /// TOML file with [analyzer], [interpreter] and [logging] tables
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Args {
    /// Reject values clap cannot range-check on its own
    pub fn validate(&self) -> Result<()> {
        ensure!(self.block_size > 0, "--block-size must be greater than zero");
        ensure!(
            self.poll_rate.is_finite() && self.poll_rate > 0.0,
            "--poll-rate must be a positive number of Hz"
        );
        Ok(())
    }

    /// Open the block source selected on the command line
    pub fn open_source(&self) -> Result<Box<dyn BlockSource>> {
        match (&self.input, self.tone) {
            (Some(path), None) => Ok(Box::new(WavSource::open(path)?)),
            (None, Some(freq)) => {
                ensure!(self.sample_rate > 0, "--sample-rate must be greater than zero");
                ensure!(
                    self.duration.is_finite() && self.duration > 0.0,
                    "--duration must be positive"
                );
                Ok(Box::new(ToneSource::new(
                    freq,
                    self.amplitude,
                    self.sample_rate,
                    self.duration,
                )))
            }
            (None, None) => bail!("Nothing to analyze: pass a WAV file or --tone <HZ>"),
            (Some(_), Some(_)) => bail!("A WAV file and --tone cannot be combined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tone_args() {
        let args = Args::try_parse_from([
            "moodscope",
            "--tone",
            "440",
            "--duration",
            "0.5",
            "--block-size",
            "512",
            "--fast",
        ])
        .unwrap();
        assert_eq!(args.tone, Some(440.0));
        assert_eq!(args.block_size, 512);
        assert!(args.fast);
        assert!(args.validate().is_ok());

        let source = args.open_source().unwrap();
        assert_eq!(source.sample_rate(), 44100);
    }

    #[test]
    fn test_wav_and_tone_conflict() {
        assert!(Args::try_parse_from(["moodscope", "song.wav", "--tone", "440"]).is_err());
    }

    #[test]
    fn test_requires_an_input() {
        let args = Args::try_parse_from(["moodscope"]).unwrap();
        assert!(args.open_source().is_err());
    }

    #[test]
    fn test_rejects_zero_block_size() {
        let args = Args::try_parse_from(["moodscope", "--tone", "440", "--block-size", "0"]).unwrap();
        assert!(args.validate().is_err());
    }
}
