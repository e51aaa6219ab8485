//! Configuration module for Fomio

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Discourse site (e.g. `https://meta.discourse.org`)
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Quiet period after the last edit before a draft is auto-saved
    #[serde(default = "default_draft_debounce_ms")]
    pub draft_debounce_ms: u64,

    /// Delay before restoring the scroll offset after a comment refetch
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    /// Draft slot used when neither a route nor the cache names one
    #[serde(default = "default_draft_key")]
    pub default_draft_key: String,

    /// Cached topics older than this are evicted on startup
    #[serde(default = "default_cache_max_age_hours")]
    pub cache_max_age_hours: u64,

    /// Column width used when printing comment bodies
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,

    /// Open the browser automatically during `fomio auth`
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

fn default_site_url() -> String {
    "https://meta.discourse.org".to_string()
}

fn default_draft_debounce_ms() -> u64 {
    1200
}

fn default_scroll_settle_ms() -> u64 {
    200
}

fn default_draft_key() -> String {
    crate::compose::DEFAULT_DRAFT_KEY.to_string()
}

fn default_cache_max_age_hours() -> u64 {
    72
}

fn default_wrap_width() -> usize {
    80
}

fn default_open_browser() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            draft_debounce_ms: default_draft_debounce_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            default_draft_key: default_draft_key(),
            cache_max_age_hours: default_cache_max_age_hours(),
            wrap_width: default_wrap_width(),
            open_browser: default_open_browser(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Debounce window for draft auto-save
    pub const fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }

    /// Settle delay before the scroll offset is restored
    pub const fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    /// Site URL without a trailing slash
    pub fn site(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.draft_debounce(), Duration::from_millis(1200));
        assert_eq!(config.default_draft_key, "new_topic");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "site_url = \"https://forum.example.com/\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.site(), "https://forum.example.com");
        assert_eq!(config.scroll_settle_ms, 200);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            draft_debounce_ms: 500,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.draft_debounce_ms, 500);
    }
}
