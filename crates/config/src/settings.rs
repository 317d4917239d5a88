// User settings
// Loaded from ~/.config/shiftgrid/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ConfigError;

/// Overrides `backend.baseUrl` when set and non-empty.
pub const BACKEND_URL_ENV: &str = "SHIFTGRID_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Backend
    #[serde(rename = "backend.baseUrl")]
    pub backend_url: String,

    #[serde(rename = "backend.timeoutSecs")]
    pub timeout_secs: u64,

    // Editing
    #[serde(rename = "history.maxGroups")]
    pub history_max_groups: usize,

    #[serde(rename = "editor.author")]
    pub author: String,

    // Audit feed
    #[serde(rename = "feed.pollIntervalSecs")]
    pub poll_interval_secs: u64,

    // Notifications
    #[serde(rename = "notify.defaultTargets")]
    pub default_notify: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            history_max_groups: 500,
            author: String::new(),
            poll_interval_secs: 30,
            default_notify: Vec::new(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shiftgrid")
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults.
    /// The backend URL environment override is applied.
    pub fn load() -> Self {
        let path = Self::config_path();
        let settings = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("{}; using default settings", e);
                Self::default()
            })
        } else {
            Self::default()
        };
        settings.with_backend_override(std::env::var(BACKEND_URL_ENV).ok())
    }

    /// Load settings from `path`. Lines starting with `//` are ignored.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut settings: Self = serde_json::from_str(&cleaned).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.sanitize();
        Ok(settings)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(io_err)
    }

    /// Replace the backend URL with `url` if it is present and non-empty.
    pub fn with_backend_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    // Zero limits make no sense for any of these
    fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.timeout_secs == 0 {
            self.timeout_secs = defaults.timeout_secs;
        }
        if self.history_max_groups == 0 {
            self.history_max_groups = defaults.history_max_groups;
        }
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = defaults.poll_interval_secs;
        }
        self.backend_url = self.backend_url.trim_end_matches('/').to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
    // Backend
    "backend.baseUrl": "https://turnos.example.com/",
    "history.maxGroups": 50
}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.backend_url, "https://turnos.example.com");
        assert_eq!(settings.history_max_groups, 50);
        assert_eq!(settings.timeout_secs, 30);
        assert!(settings.default_notify.is_empty());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            author: "jefe.turno".into(),
            default_notify: vec!["rrhh".into()],
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"notify.defaultTargets\""));
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_parse_error_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn test_zero_limits_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"backend.timeoutSecs": 0, "feed.pollIntervalSecs": 0}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert_eq!(settings.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_backend_override() {
        let base = Settings::default();
        assert_eq!(
            base.clone().with_backend_override(Some(" http://10.0.0.5:9000 ".into())).backend_url,
            "http://10.0.0.5:9000"
        );
        assert_eq!(base.clone().with_backend_override(Some(String::new())).backend_url, base.backend_url);
        assert_eq!(base.clone().with_backend_override(None), base);
    }
}
