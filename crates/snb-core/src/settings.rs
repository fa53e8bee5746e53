use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::timer::{DEFAULT_INTERVAL_MINUTES, Interval};

pub const SETTINGS_FILE: &str = "options.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub auto_backup_enabled: bool,
    pub auto_backup_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self { auto_backup_enabled: false, auto_backup_interval: DEFAULT_INTERVAL_MINUTES }
    }
}

impl Settings {
    /// Stored interval, or the default if the file held an out-of-range value.
    pub fn interval(&self) -> Interval {
        Interval::new(self.auto_backup_interval).unwrap_or_default()
    }
}

/// Reads and writes `options.json`. Failures never block the caller.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted settings, or defaults when the file is absent or unusable.
    pub fn load(&self) -> Settings {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                warn!("error loading options {}: {}", self.path.display(), e);
                return Settings::default();
            }
        };
        let settings: Settings = match serde_json::from_slice(&data) {
            Ok(s) => s,
            Err(e) => {
                warn!("error loading options {}: {}", self.path.display(), e);
                return Settings::default();
            }
        };
        if let Err(e) = Interval::new(settings.auto_backup_interval) {
            warn!("error loading options {}: {}", self.path.display(), e);
            return Settings::default();
        }
        settings
    }

    /// Rewrite the whole file.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Settings { path: self.path.clone(), source: e })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&self.path, json).map_err(|e| Error::io(&self.path, e))
    }
}
