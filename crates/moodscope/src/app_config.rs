//! Application configuration file

use anyhow::{Context, Result};
use moodscope_core::{AnalyzerConfig, InterpreterConfig, LogConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the optional TOML config file; missing tables use defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Feature extraction settings
    pub analyzer: AnalyzerConfig,
    /// Musical context tuning
    pub interpreter: InterpreterConfig,
    /// Log destinations and level
    pub logging: LogConfig,
}

impl AppConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.analyzer.validate()?;
        config.interpreter.validate()?;
        Ok(config)
    }
}
