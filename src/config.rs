use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MIN_INTERVAL_SECS: f64 = 0.1;
pub const MAX_INTERVAL_SECS: f64 = 60.0;
pub const MIN_DURATION_SECS: u64 = 10;
pub const MAX_DURATION_SECS: u64 = 3600;
pub const MIN_FOLLOW_WINDOW_SECS: u32 = 5;
pub const MAX_FOLLOW_WINDOW_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeBackend {
    /// The platform `ping` command.
    #[default]
    System,
    /// Raw ICMP echo through surge-ping.
    Icmp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub target: String,
    pub interval_secs: f64,
    pub duration_secs: u64,
    pub follow_window_secs: u32,
    pub show_advanced_stats: bool,
    pub show_graph_controls: bool,
    pub probe_backend: ProbeBackend,
    pub export_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target: "google.com".to_string(),
            interval_secs: 1.0,
            duration_secs: 60,
            follow_window_secs: 10,
            show_advanced_stats: true,
            show_graph_controls: true,
            probe_backend: ProbeBackend::System,
            export_dir: None,
        }
    }
}

impl AppConfig {
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("PingPlotter");

        fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.json"))
    }

    /// Loads the user's config, falling back to defaults on any problem.
    pub fn load() -> Self {
        match Self::get_config_path().and_then(|path| Self::load_from(&path)) {
            Ok(Some(config)) => config,
            Ok(None) => AppConfig::default(),
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {e}");
                AppConfig::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(Some(config.validated()))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::get_config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Clamps every numeric field into its allowed range.
    pub fn validated(mut self) -> Self {
        self.target = self.target.trim().to_string();
        self.interval_secs = if self.interval_secs.is_finite() {
            self.interval_secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
        } else {
            AppConfig::default().interval_secs
        };
        self.duration_secs = self.duration_secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);
        self.follow_window_secs = self
            .follow_window_secs
            .clamp(MIN_FOLLOW_WINDOW_SECS, MAX_FOLLOW_WINDOW_SECS);
        self
    }

    /// Where CSV exports go unless the user picked a directory.
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::download_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validated_clamps_out_of_range_values() {
        let config = AppConfig {
            target: "  example.com ".to_string(),
            interval_secs: 0.01,
            duration_secs: 99_999,
            follow_window_secs: 1,
            ..AppConfig::default()
        }
        .validated();

        assert_eq!(config.target, "example.com");
        assert_eq!(config.interval_secs, MIN_INTERVAL_SECS);
        assert_eq!(config.duration_secs, MAX_DURATION_SECS);
        assert_eq!(config.follow_window_secs, MIN_FOLLOW_WINDOW_SECS);
    }

    #[test]
    fn validated_replaces_nan_interval() {
        let config = AppConfig {
            interval_secs: f64::NAN,
            ..AppConfig::default()
        }
        .validated();
        assert_eq!(config.interval_secs, 1.0);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"target":"1.1.1.1","probe_backend":"icmp"}"#).unwrap();
        assert_eq!(config.target, "1.1.1.1");
        assert_eq!(config.probe_backend, ProbeBackend::Icmp);
        assert_eq!(config.duration_secs, 60);
        assert_eq!(config.follow_window_secs, 10);
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(AppConfig::load_from(&path).unwrap().is_none());

        let config = AppConfig {
            target: "8.8.4.4".to_string(),
            interval_secs: 2.5,
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), Some(config));
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Json(_))));
    }
}
