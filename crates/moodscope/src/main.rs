//! Moodscope - replay audio through the feature analyzer
//!
//! Stands in for the live capture layer: blocks from a WAV file or a
//! synthetic tone are delivered at real-time pace while a polling consumer
//! interprets the results. A JSON summary is printed to stdout at the end.

#![warn(missing_docs)]

mod app_config;
mod cli;
mod logging_setup;
mod session;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use moodscope_core::{AudioAnalyzer, MusicalInterpreter};
use tracing::info;

use app_config::AppConfig;
use cli::Args;
use session::SessionOptions;

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    let _log_guard = logging_setup::init(&config.logging)?;

    let source = args.open_source()?;

    // Construction is the only point where analysis can fail outright
    let analyzer =
        AudioAnalyzer::new(config.analyzer.clone()).context("Failed to create audio analyzer")?;
    let interpreter = MusicalInterpreter::new(config.interpreter.clone())
        .context("Failed to create musical interpreter")?;

    info!(
        "Analyzer ready: fft_size={}, rolling_window={}",
        config.analyzer.fft_size, config.analyzer.rolling_window
    );

    let summary = session::run(
        source,
        analyzer,
        interpreter,
        SessionOptions {
            block_size: args.block_size,
            poll_rate: args.poll_rate,
            realtime: !args.fast,
        },
    )?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
