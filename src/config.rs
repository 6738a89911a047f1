// src/config.rs

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    errors::{TweakError, TweakResult},
    store::write_json_atomically,
};

/// Environment variable that points the app at a different config file.
pub const CONFIG_ENV: &str = "WINOPT_CONFIG";

/// `%ProgramData%\WinOptApp`, the home of every file the app writes.
pub fn data_dir() -> PathBuf {
    let program_data = env::var("ProgramData").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(program_data).join("WinOptApp")
}

fn default_managed_state_path() -> PathBuf {
    data_dir().join("managed-tweaks.json")
}

fn default_rollback_state_path() -> PathBuf {
    data_dir().join("rollback-state.json")
}

fn default_visible_refresh_secs() -> u64 {
    6
}

fn default_hidden_refresh_secs() -> u64 {
    30
}

fn default_summary_title_limit() -> usize {
    6
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_managed_state_path")]
    pub managed_state_path: PathBuf,
    #[serde(default = "default_rollback_state_path")]
    pub rollback_state_path: PathBuf,
    /// Reconcile cadence while the window is focused.
    #[serde(default = "default_visible_refresh_secs")]
    pub visible_refresh_secs: u64,
    #[serde(default = "default_hidden_refresh_secs")]
    pub hidden_refresh_secs: u64,
    /// Titles shown in the drift summary before "(+N more)".
    #[serde(default = "default_summary_title_limit")]
    pub summary_title_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            managed_state_path: default_managed_state_path(),
            rollback_state_path: default_rollback_state_path(),
            visible_refresh_secs: default_visible_refresh_secs(),
            hidden_refresh_secs: default_hidden_refresh_secs(),
            summary_title_limit: default_summary_title_limit(),
        }
    }
}

impl AppConfig {
    pub fn refresh_interval(&self, visible: bool) -> Duration {
        let secs = if visible {
            self.visible_refresh_secs
        } else {
            self.hidden_refresh_secs
        };
        Duration::from_secs(secs.max(1))
    }
}

pub struct ConfigManager;

impl ConfigManager {
    /// `$WINOPT_CONFIG`, or `%ProgramData%\WinOptApp\config.json`.
    pub fn config_path() -> PathBuf {
        match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => data_dir().join("config.json"),
        }
    }

    /// Loads the configuration. A missing or corrupt file yields defaults.
    pub fn load() -> TweakResult<AppConfig> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> TweakResult<AppConfig> {
        if !path.exists() {
            info!("Configuration file not found, using defaults");
            return Ok(AppConfig::default());
        }

        let json = fs::read_to_string(path).map_err(|e| TweakError::io(path, e))?;
        match serde_json::from_str(&json) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse configuration, using defaults: {}", e);
                Ok(AppConfig::default())
            }
        }
    }

    pub fn save(config: &AppConfig) -> TweakResult<()> {
        Self::save_to(&Self::config_path(), config)
    }

    pub fn save_to(path: &Path, config: &AppConfig) -> TweakResult<()> {
        write_json_atomically(path, config)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lazy_static::lazy_static;

    use super::*;

    lazy_static! {
        static ref TEST_MUTEX: Mutex<()> = Mutex::new(());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.visible_refresh_secs, 6);
        assert_eq!(config.hidden_refresh_secs, 30);
        assert_eq!(config.summary_title_limit, 6);
        assert!(config.managed_state_path.ends_with("WinOptApp/managed-tweaks.json")
            || config.managed_state_path.ends_with(r"WinOptApp\managed-tweaks.json"));
        assert_eq!(config.refresh_interval(false), Duration::from_secs(30));
    }

    #[test]
    fn test_env_override_round_trip() {
        let _lock = TEST_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        env::set_var(CONFIG_ENV, &path);

        assert_eq!(ConfigManager::config_path(), path);
        assert_eq!(ConfigManager::load().unwrap(), AppConfig::default());

        let config = AppConfig {
            visible_refresh_secs: 2,
            ..AppConfig::default()
        };
        ConfigManager::save(&config).unwrap();
        assert_eq!(ConfigManager::load().unwrap(), config);

        env::remove_var(CONFIG_ENV);
    }

    #[test]
    fn test_partial_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "hidden_refresh_secs": 60 }"#).unwrap();
        let config = ConfigManager::load_from(&path).unwrap();
        assert_eq!(config.hidden_refresh_secs, 60);
        assert_eq!(config.visible_refresh_secs, 6);

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ConfigManager::load_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = AppConfig {
            visible_refresh_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.refresh_interval(true), Duration::from_secs(1));
    }
}
