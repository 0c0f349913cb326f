//! Configuration for opening a backend
//!
//! Settings come from an optional `sqlbridge.toml` file and may be overridden
//! by environment variables:
//!
//! - `SQLBRIDGE_LANGS` - Comma-separated preferred languages
//! - `SQLBRIDGE_PAGE_SIZE` - Result page budget in bytes
//! - `SQLBRIDGE_RECENT_PAGES` - Number of recently read pages each cursor keeps
//!
//! These can be set in a `.env` file next to the configuration file.

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "sqlbridge.toml";

/// Environment variable names
pub const ENV_LANGS: &str = "SQLBRIDGE_LANGS";
pub const ENV_PAGE_SIZE: &str = "SQLBRIDGE_PAGE_SIZE";
pub const ENV_RECENT_PAGES: &str = "SQLBRIDGE_RECENT_PAGES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Preferred languages passed to the engine at open
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Page budget in bytes; the engine default applies when unset
    #[serde(default)]
    pub page_size_bytes: Option<u64>,
    /// Recently read pages kept by each cursor, 0 disables the cache
    #[serde(default)]
    pub recent_pages: usize,
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            page_size_bytes: None,
            recent_pages: 0,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Load configuration from a directory.
    ///
    /// This also loads any `.env` file in the directory and applies
    /// environment variable overrides. A missing config file yields defaults.
    pub fn load(dir: &Path) -> BridgeResult<Self> {
        Self::load_with_env(dir, ".env")
    }

    /// Load configuration with a specific env file
    pub fn load_with_env(dir: &Path, env_file: &str) -> BridgeResult<Self> {
        // Load env file if present (ignore errors)
        let env_path = dir.join(env_file);
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                BridgeError::Config(format!("{}: {}", config_path.display(), e))
            })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(langs) = lookup(ENV_LANGS) {
            let langs: Vec<String> = langs
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if !langs.is_empty() {
                self.languages = langs;
            }
        }

        if let Some(size) = lookup(ENV_PAGE_SIZE).and_then(|s| s.trim().parse::<u64>().ok()) {
            self.page_size_bytes = Some(size);
        }

        if let Some(pages) = lookup(ENV_RECENT_PAGES).and_then(|s| s.trim().parse::<usize>().ok())
        {
            self.recent_pages = pages;
        }
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.page_size_bytes == Some(0) {
            return Err(BridgeError::Config(
                "page_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_parse_toml() {
        let config = BridgeConfig::from_toml_str(
            "languages = [\"de\", \"fr\"]\npage_size_bytes = 4096\nrecent_pages = 3\n",
        )
        .unwrap();
        assert_eq!(config.languages, vec!["de".to_string(), "fr".to_string()]);
        assert_eq!(config.page_size_bytes, Some(4096));
        assert_eq!(config.recent_pages, 3);
    }

    #[test]
    fn test_invalid_toml() {
        let result = BridgeConfig::from_toml_str("page_size_bytes = \"big\"");
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_LANGS, "ja, en ,"),
            (ENV_PAGE_SIZE, "888"),
            (ENV_RECENT_PAGES, "not a number"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        config.recent_pages = 2;
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.languages, vec!["ja".to_string(), "en".to_string()]);
        assert_eq!(config.page_size_bytes, Some(888));
        assert_eq!(config.recent_pages, 2);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "recent_pages = 4\n").unwrap();
        let config = BridgeConfig::load_with_env(dir.path(), ".env.missing").unwrap();
        assert_eq!(config.recent_pages, 4);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = BridgeConfig {
            page_size_bytes: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
