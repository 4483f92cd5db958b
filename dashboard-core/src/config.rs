use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};

use crate::model::Units;

/// Default polling cadence: ten minutes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Default ticker animation step interval.
pub const DEFAULT_TICKER_INTERVAL: Duration = Duration::from_millis(30);

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings stored on disk as TOML.
///
/// Example TOML:
/// ```toml
/// poll_interval_secs = 600
/// units = "metric"
/// asset_dir = "/opt/dashboard/images"
/// ```
///
/// User configuration (API key, location) is not kept here; it lives in the
/// SQLite config store at `database_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll_interval_secs: u64,
    pub ticker_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub units: Units,
    pub language: String,

    /// Directory holding `{icon}_bg.png`, `{icon}_t@4x.png` and `{icon}_t@2x.png`.
    pub asset_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    /// Where each rendered frame is written as PNG.
    pub frame_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            ticker_interval_ms: DEFAULT_TICKER_INTERVAL.as_millis() as u64,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            units: Units::default(),
            language: "en".to_string(),
            asset_dir: None,
            database_path: None,
            frame_path: None,
            log_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the platform config file, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load settings from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be greater than zero"));
        }
        if self.ticker_interval_ms == 0 {
            return Err(anyhow!("ticker_interval_ms must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ticker_interval(&self) -> Duration {
        Duration::from_millis(self.ticker_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn asset_dir(&self) -> Result<PathBuf> {
        self.path_or_default(&self.asset_dir, "images")
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        self.path_or_default(&self.database_path, "settings/settings.db")
    }

    pub fn frame_path(&self) -> Result<PathBuf> {
        self.path_or_default(&self.frame_path, "frame.png")
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        self.path_or_default(&self.log_path, "weather_debug.log")
    }

    fn path_or_default(&self, value: &Option<PathBuf>, relative: &str) -> Result<PathBuf> {
        match value {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(relative)),
        }
    }

    /// Path to the settings file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-dashboard", "weather-dashboard")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_documented_cadences() {
        let settings = Settings::default();

        assert_eq!(settings.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.ticker_interval(), Duration::from_millis(30));
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.units, Units::Imperial);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings = Settings::load_from(&dir.path().join("config.toml")).expect("defaults");
        assert_eq!(settings.poll_interval_secs, 600);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "units = \"metric\"\npoll_interval_secs = 120\n").expect("write");

        let settings = Settings::load_from(&path).expect("settings parse");
        assert_eq!(settings.units, Units::Metric);
        assert_eq!(settings.poll_interval(), Duration::from_secs(120));
        assert_eq!(settings.ticker_interval_ms, 30);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_secs = 0\n").expect("write");

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.toml");

        let settings = Settings {
            asset_dir: Some(PathBuf::from("/srv/images")),
            ..Settings::default()
        };
        settings.save_to(&path).expect("save");

        let loaded = Settings::load_from(&path).expect("reload");
        assert_eq!(loaded.asset_dir, Some(PathBuf::from("/srv/images")));
        assert_eq!(loaded.asset_dir().expect("asset dir"), PathBuf::from("/srv/images"));
    }
}
