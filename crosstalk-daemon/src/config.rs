use anyhow::{Context, Result};
use crosstalk_console::config::ConsoleConfig;
use crosstalk_logger::LogConfig;
use serde::Deserialize;

/// The top-level configuration for the crosstalk daemon.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct DaemonConfig {
    /// Trace every bus event after translation.
    pub eavesdrop: bool,
    pub console: ConsoleConfig,
    pub log: LogConfig,
}

/// Loads the daemon configuration from a TOML file, with
/// `CROSSTALK`-prefixed environment variables layered on top.
pub fn load_config(path: &str) -> Result<DaemonConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("CROSSTALK").separator("__"));

    let settings: DaemonConfig = builder
        .build()
        .context(format!("failed to read configuration from '{}'", path))?
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    Ok(settings)
}
