//! Session configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ignore::{DEFAULT_IGNORED_DIRS, IgnoreList};

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration for a workspace session.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the project server.
    #[builder(default = "default_server_url()")]
    pub server_url: String,

    /// Interval between change-detector ticks.
    #[builder(default = "3000")]
    pub change_poll_interval_ms: u64,

    /// Interval between git status polls.
    #[builder(default = "5000")]
    pub status_poll_interval_ms: u64,

    /// Hover dwell before a folder is prefetched.
    #[builder(default = "200")]
    pub hover_delay_ms: u64,

    /// Slide progress (0-100) at which a destructive action fires.
    #[builder(default = "80")]
    pub confirm_threshold: u8,

    /// Include dotfiles in listings.
    #[builder(default = "false")]
    pub show_hidden: bool,

    /// Number of commits fetched for the timeline.
    #[builder(default = "50")]
    pub log_limit: usize,

    /// Per-request timeout.
    #[builder(default = "10_000")]
    pub request_timeout_ms: u64,

    /// Directory names ignored by change detection when the server does not
    /// supply its own list.
    #[builder(default = "default_ignored_dirs()")]
    pub ignored_dirs: Vec<String>,
}

fn default_server_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_ignored_dirs() -> Vec<String> {
    DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect()
}

impl SyncConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check_values(
            self.server_url.as_deref(),
            self.confirm_threshold,
            self.change_poll_interval_ms,
            self.status_poll_interval_ms,
        )
    }
}

/// Rules shared by the builder and file loading. Unset fields pass.
fn check_values(
    server_url: Option<&str>,
    confirm_threshold: Option<u8>,
    change_poll_interval_ms: Option<u64>,
    status_poll_interval_ms: Option<u64>,
) -> Result<(), String> {
    if confirm_threshold.is_some_and(|t| t == 0 || t > 100) {
        return Err("confirm_threshold must be within 1..=100".to_string());
    }
    if change_poll_interval_ms == Some(0) || status_poll_interval_ms == Some(0) {
        return Err("poll intervals must be non-zero".to_string());
    }
    if server_url.is_some_and(|url| url.trim().is_empty()) {
        return Err("server_url cannot be empty".to_string());
    }
    Ok(())
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            change_poll_interval_ms: 3000,
            status_poll_interval_ms: 5000,
            hover_delay_ms: 200,
            confirm_threshold: 80,
            show_hidden: false,
            log_limit: 50,
            request_timeout_ms: 10_000,
            ignored_dirs: default_ignored_dirs(),
        }
    }
}

impl SyncConfig {
    /// Create a new config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("canopy")
            .join("config.toml")
    }

    /// Load a config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.check()?;
        Ok(config)
    }

    /// Load the config from its default location, falling back to defaults
    /// when no file exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        check_values(
            Some(&self.server_url),
            Some(self.confirm_threshold),
            Some(self.change_poll_interval_ms),
            Some(self.status_poll_interval_ms),
        )
        .map_err(|message| ConfigError::Invalid { message })
    }

    pub fn change_poll_interval(&self) -> Duration {
        Duration::from_millis(self.change_poll_interval_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The local fallback ignore list.
    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::new(self.ignored_dirs.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::builder()
            .server_url("http://localhost:9000")
            .confirm_threshold(90u8)
            .show_hidden(true)
            .build()
            .unwrap();

        assert_eq!(config.server_url, "http://localhost:9000");
        assert_eq!(config.confirm_threshold, 90);
        assert!(config.show_hidden);
        assert_eq!(config.status_poll_interval_ms, 5000);
    }

    #[test]
    fn test_config_builder_rejects_bad_threshold() {
        assert!(SyncConfig::builder().confirm_threshold(0u8).build().is_err());
        assert!(SyncConfig::builder().confirm_threshold(101u8).build().is_err());
    }

    #[test]
    fn test_builder_and_file_share_rules() {
        assert!(SyncConfig::builder().server_url("  ").build().is_err());
        assert!(SyncConfig::builder().change_poll_interval_ms(0u64).build().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        for body in ["server_url = \" \"\n", "status_poll_interval_ms = 0\n"] {
            std::fs::write(&path, body).unwrap();
            assert!(matches!(
                SyncConfig::load(&path),
                Err(ConfigError::Invalid { .. })
            ));
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.change_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.hover_delay(), Duration::from_millis(200));
        assert!(config.ignore_list().matches("node_modules"));
    }

    #[test]
    fn test_config_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_limit = 10\nignored_dirs = [\"out\"]\n").unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.log_limit, 10);
        assert_eq!(config.ignored_dirs, vec!["out".to_string()]);
        assert_eq!(config.confirm_threshold, 80);
    }

    #[test]
    fn test_config_load_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "confirm_threshold = 0\n").unwrap();
        assert!(matches!(
            SyncConfig::load(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
