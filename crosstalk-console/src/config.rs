//! Console transport configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    /// Channels to join on registration.
    pub channels: Vec<String>,
    /// When set, the operator is puppeted into every joined channel under
    /// this name and may speak with `say`.
    pub user_name: Option<String>,
    /// Authority string attached to commands entered at the console.
    pub authority: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            user_name: None,
            authority: "console".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_the_console_passive() {
        let config = ConsoleConfig::default();
        assert!(config.channels.is_empty());
        assert!(config.user_name.is_none());
        assert_eq!(config.authority, "console");
    }
}
