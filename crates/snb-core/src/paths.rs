use std::path::PathBuf;

use crate::error::{Error, Result};

/// Folder under the local data dir holding snapshots, counter and options.
pub const BACKUP_DIR_NAME: &str = "SNBACKUP";

#[cfg(windows)]
const STEAM_SOURCE: &str = r"C:\Program Files (x86)\Steam\steamapps\common\Subnautica\SNAppData";

/// Where the live save data is and where snapshots go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub source_dir: PathBuf,
    pub backup_dir: PathBuf,
}

impl Paths {
    pub fn new(source_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self { source_dir: source_dir.into(), backup_dir: backup_dir.into() }
    }

    /// Platform defaults, with optional overrides for either directory.
    pub fn detect(source_dir: Option<PathBuf>, backup_dir: Option<PathBuf>) -> Result<Self> {
        let backup_dir = match backup_dir {
            Some(d) => d,
            None => default_backup_dir()?,
        };
        let source_dir = match source_dir {
            Some(d) => d,
            None => default_source_dir()?,
        };
        Ok(Self { source_dir, backup_dir })
    }
}

pub fn default_backup_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|d| d.join(BACKUP_DIR_NAME))
        .ok_or_else(|| Error::not_found("<local data directory>"))
}

#[cfg(windows)]
pub fn default_source_dir() -> Result<PathBuf> {
    Ok(PathBuf::from(STEAM_SOURCE))
}

#[cfg(not(windows))]
pub fn default_source_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("Steam/steamapps/common/Subnautica/SNAppData"))
        .ok_or_else(|| Error::not_found("<data directory>"))
}
