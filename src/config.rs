//! Configuration loading (~/.hearth/config.json) and feature toggles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Toggle key for the proactive nudge system. Defaults on.
pub const FEATURE_PROACTIVE: &str = "proactiveNudges";

/// Toggle key for demo mode (one synthetic signal at bootstrap). Defaults
/// off; never enable in a normal deployment.
pub const FEATURE_DEMO: &str = "nudgeDemo";

/// Connection settings for the hosted record store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Hearth configuration, read once at bootstrap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

impl Config {
    /// Proactive nudges are on unless explicitly disabled.
    pub fn proactive_enabled(&self) -> bool {
        self.features.get(FEATURE_PROACTIVE).copied().unwrap_or(true)
    }

    /// Demo mode is off unless explicitly enabled.
    pub fn demo_mode(&self) -> bool {
        self.features.get(FEATURE_DEMO).copied().unwrap_or(false)
    }
}

/// Canonical config file path (~/.hearth/config.json).
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
    Ok(home.join(".hearth").join("config.json"))
}

/// Load configuration from the canonical path. A missing file yields
/// defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path()?)
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.proactive_enabled());
        assert!(!config.demo_mode());
    }

    #[test]
    fn test_toggles_override_defaults() {
        let mut config = Config::default();
        config.features.insert(FEATURE_PROACTIVE.to_string(), false);
        config.features.insert(FEATURE_DEMO.to_string(), true);
        assert!(!config.proactive_enabled());
        assert!(config.demo_mode());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("absent.json")).expect("load");
        assert!(config.proactive_enabled());
        assert!(config.store.url.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "store": { "url": "https://fam.hearth.dev", "apiKey": "svc-key" },
                "features": { "proactiveNudges": false }
            }"#,
        )
        .expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.store.url, "https://fam.hearth.dev");
        assert_eq!(config.store.api_key, "svc-key");
        assert!(!config.proactive_enabled());
        assert!(!config.demo_mode());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(load_config_from(&path).is_err());
    }
}
