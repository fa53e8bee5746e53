//! Snapshot ledger: the counter file plus the directory of snapshot archives.
//!
//! Snapshot `n` lives in `SNAppData<n>.zip`. The counter in `count.txt` is the
//! sequence number the next snapshot will take; it only moves forward and is
//! never rebuilt from the files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

pub const COUNTER_FILE: &str = "count.txt";
pub const SNAPSHOT_PREFIX: &str = "SNAppData";
pub const SNAPSHOT_EXT: &str = ".zip";

/// A snapshot archive found in the ledger directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef {
    pub seq: u64,
    pub path: PathBuf,
}

impl SnapshotRef {
    /// File name as found on disk, which may carry leading zeros.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| snapshot_file_name(self.seq))
    }
}

pub fn snapshot_file_name(seq: u64) -> String {
    format!("{SNAPSHOT_PREFIX}{seq}{SNAPSHOT_EXT}")
}

/// Sequence number encoded in a snapshot file name, if it is one.
pub fn parse_snapshot_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(SNAPSHOT_PREFIX)?.strip_suffix(SNAPSHOT_EXT)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    /// Open the ledger at `dir`, creating the directory and counter as needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let ledger = Self { dir: dir.into() };
        ledger.ensure_initialized()?;
        Ok(ledger)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn counter_path(&self) -> PathBuf {
        self.dir.join(COUNTER_FILE)
    }

    pub fn archive_path(&self, seq: u64) -> PathBuf {
        self.dir.join(snapshot_file_name(seq))
    }

    /// Idempotent: creates the directory (with parents) and a zero counter.
    pub fn ensure_initialized(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let counter = self.counter_path();
        if !counter.exists() {
            fs::write(&counter, "0").map_err(|e| Error::io(&counter, e))?;
        }
        Ok(())
    }

    /// Sequence number the next snapshot should use. Does not advance anything;
    /// pair with [`Ledger::commit_sequence`] once the archive is on disk.
    pub fn next_sequence(&self) -> Result<u64> {
        let path = self.counter_path();
        let raw = fs::read_to_string(&path).map_err(|e| Error::from_io_at(&path, e))?;
        raw.trim().parse::<u64>().map_err(|_| Error::Counter {
            path,
            content: raw.trim().to_string(),
        })
    }

    pub fn commit_sequence(&self, next: u64) -> Result<()> {
        let path = self.counter_path();
        fs::write(&path, next.to_string()).map_err(|e| Error::io(&path, e))
    }

    /// Snapshot archives present on disk, ascending by sequence number.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotRef>> {
        let rd = fs::read_dir(&self.dir).map_err(|e| Error::from_io_at(&self.dir, e))?;
        let mut out = Vec::new();
        for entry in rd {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(seq) = name.to_str().and_then(parse_snapshot_file_name) else {
                continue;
            };
            let path = entry.path();
            if !path.is_file() {
                debug!("ignoring non-file {}", path.display());
                continue;
            }
            out.push(SnapshotRef { seq, path });
        }
        out.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.path.cmp(&b.path)));
        Ok(out)
    }

    /// Snapshot with sequence `seq`: the canonical `SNAppData<seq>.zip` if it
    /// exists, otherwise the first listed archive whose digits parse to `seq`.
    pub fn locate(&self, seq: u64) -> Result<SnapshotRef> {
        let canonical = self.archive_path(seq);
        if canonical.is_file() {
            return Ok(SnapshotRef { seq, path: canonical });
        }
        self.list_snapshots()?
            .into_iter()
            .find(|s| s.seq == seq)
            .ok_or_else(|| Error::not_found(canonical))
    }
}
