//! Configuration structures shared by transports.

use serde::Deserialize;

/// Tunables for departure debouncing on flaky transports.
///
/// A transport that sees a user vanish records the moment and only reports
/// the departure once `timeout-secs` have elapsed without a reappearance;
/// the pending table is swept every `sweep-interval-secs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DebounceConfig {
    /// Seconds a vanished user must stay gone before a departure is emitted.
    pub timeout_secs: u64,
    /// Seconds between sweeps of the pending-departure table.
    pub sweep_interval_secs: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            sweep_interval_secs: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = DebounceConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.sweep_interval_secs, 15);
    }
}
