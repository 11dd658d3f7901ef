use std::fs::File;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;

/// Log line format.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

/// Log destination.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

/// Logging configuration for a crosstalk binary.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case", default)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is not set, e.g. "info" or "debug".
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required when `output` is "file".
    pub file_path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            output: LogOutput::Stdout,
            file_path: None,
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` directives take precedence; the configured level is the
/// fallback when the variable is unset or unparsable.
pub fn init(config: &LogConfig) -> Result<()> {
    let fallback = Level::from_str(&config.level).unwrap_or(Level::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(fallback).into())
        .from_env_lossy();
    let registry = Registry::default().with(filter);

    match config.output {
        LogOutput::File => {
            let Some(path) = config.file_path.as_deref() else {
                bail!("log output is 'file' but 'file-path' is not set");
            };
            let log_file = Arc::new(File::create(path)?);
            match config.format {
                LogFormat::Json => registry.with(fmt::layer().with_writer(log_file).json()).init(),
                LogFormat::Plain => registry.with(fmt::layer().with_writer(log_file)).init(),
            }
        }
        LogOutput::Stdout => match config.format {
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
            LogFormat::Plain => registry.with(fmt::layer()).init(),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_plainly_to_stdout() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Plain);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.file_path.is_none());
    }

    #[test]
    fn file_output_requires_a_path() {
        let config = LogConfig {
            output: LogOutput::File,
            ..LogConfig::default()
        };
        assert!(init(&config).is_err());
    }
}
