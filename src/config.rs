//! Application configuration.
//!
//! Loaded from config.yaml; every field is optional and falls back to defaults.

use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "tasklist";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("could not determine a data directory; pass --data-dir")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where storage.json and logs live. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    /// Used when storage holds no theme yet.
    pub default_theme: Theme,
    /// Event loop poll interval; also the reminder resolution.
    pub tick_millis: u64,
    pub toast_seconds: u64,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// `false` behaves like a denied notification permission.
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: None,
            default_theme: Theme::Light,
            tick_millis: 250,
            toast_seconds: 5,
            notifications: NotificationSettings::default(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Reads `path`, or the default location when `None`. A missing file
    /// yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        match fs::read_to_string(&path) {
            Ok(data) => Self::from_yaml(&data).map_err(|source| ConfigError::Parse { path, source }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn from_yaml(data: &str) -> Result<Self, serde_yaml::Error> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(data)
    }

    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.resolve_data_dir()?.join("logs"))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(10))
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_secs(self.toast_seconds)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("default_theme: dark\nnotifications:\n  enabled: false\n").unwrap();
        assert_eq!(config.default_theme, Theme::Dark);
        assert!(!config.notifications.enabled);
        assert_eq!(config.tick_millis, 250);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn missing_file_is_default_and_bad_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert_eq!(Config::load(Some(&missing)).unwrap(), Config::default());

        let bad = dir.path().join("bad.yaml");
        fs::write(&bad, "tick_millis: [1, 2").unwrap();
        assert!(matches!(Config::load(Some(&bad)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/tasks")),
            ..Config::default()
        };
        assert_eq!(config.resolve_data_dir().unwrap(), PathBuf::from("/tmp/tasks"));
        assert_eq!(config.log_dir().unwrap(), PathBuf::from("/tmp/tasks/logs"));
    }
}
