//! Save-slot indexer: reads slot screenshots straight out of every snapshot
//! archive and builds the table model the front ends render.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::ledger::{Ledger, SnapshotRef};

/// Bounding box for slot thumbnails, in pixels.
pub const THUMB_SIZE: (u32, u32) = (100, 60);

const SAVED_GAMES_DIR: &str = "SavedGames";
const SCREENSHOT_FILE: &str = "screenshot.jpg";

/// Largest screenshot entry read into memory. Archives declaring or holding
/// more are treated as corrupt.
pub const MAX_SCREENSHOT_BYTES: u64 = 32 * 1024 * 1024;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// Unmultiplied RGBA, row-major.
    pub rgba: Vec<u8>,
}

/// A slot screenshot as found in an archive, plus its decode outcome.
#[derive(Debug, Clone)]
pub struct SlotImage {
    pub bytes: Vec<u8>,
    pub thumbnail: std::result::Result<Thumbnail, String>,
}

impl SlotImage {
    pub fn decode(bytes: Vec<u8>) -> Self {
        let thumbnail = image::load_from_memory(&bytes)
            .map(|img| {
                let thumb = img.thumbnail(THUMB_SIZE.0, THUMB_SIZE.1).to_rgba8();
                Thumbnail { width: thumb.width(), height: thumb.height(), rgba: thumb.into_raw() }
            })
            .map_err(|e| e.to_string());
        Self { bytes, thumbnail }
    }
}

/// How a snapshot looks in one slot column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState<'a> {
    Image(&'a Thumbnail),
    Missing,
    Undecodable(&'a str),
}

#[derive(Debug, Clone)]
pub struct SnapshotView {
    pub seq: u64,
    pub name: String,
    pub path: PathBuf,
    pub modified: DateTime<Local>,
    pub slots: BTreeMap<String, SlotImage>,
}

impl SnapshotView {
    pub fn modified_display(&self) -> String {
        self.modified.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn snapshot_ref(&self) -> SnapshotRef {
        SnapshotRef { seq: self.seq, path: self.path.clone() }
    }

    pub fn slot(&self, name: &str) -> SlotState<'_> {
        match self.slots.get(name) {
            None => SlotState::Missing,
            Some(SlotImage { thumbnail: Ok(t), .. }) => SlotState::Image(t),
            Some(SlotImage { thumbnail: Err(e), .. }) => SlotState::Undecodable(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSnapshot {
    pub seq: u64,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct View {
    pub snapshots: Vec<SnapshotView>,
    /// Union of slot names across all readable snapshots, sorted.
    pub slots: Vec<String>,
    pub skipped: Vec<SkippedSnapshot>,
}

/// Slot name for a `SavedGames/<slot>/screenshot.jpg` entry.
pub fn slot_of_entry(entry: &str) -> Option<&str> {
    let mut parts = entry.split('/');
    let (Some(dir), Some(slot), Some(file), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    (dir == SAVED_GAMES_DIR && file == SCREENSHOT_FILE && !slot.is_empty()).then_some(slot)
}

/// Build the view over every snapshot in `ledger`.
///
/// Archives that fail to open or read are logged and listed in
/// [`View::skipped`]; only a failure to list the ledger itself is an error.
pub fn build_view(ledger: &Ledger) -> Result<View> {
    let mut view = View::default();
    let mut all_slots = BTreeSet::new();
    for snap in ledger.list_snapshots()? {
        match read_snapshot(&snap) {
            Ok(sv) => {
                all_slots.extend(sv.slots.keys().cloned());
                view.snapshots.push(sv);
            }
            Err(e) => {
                warn!("skipping {}: {}", snap.path.display(), e);
                view.skipped.push(SkippedSnapshot {
                    seq: snap.seq,
                    path: snap.path,
                    reason: e.to_string(),
                });
            }
        }
    }
    view.slots = all_slots.into_iter().collect();
    Ok(view)
}

fn read_snapshot(snap: &SnapshotRef) -> Result<SnapshotView> {
    let path = &snap.path;
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::from_io_at(path, e))?;
    let file = File::open(path).map_err(|e| Error::from_io_at(path, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| Error::corrupt(path, e))?;

    let mut slots = BTreeMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| Error::corrupt(path, e))?;
        let Some(slot) = slot_of_entry(entry.name()).map(str::to_string) else {
            continue;
        };
        let entry_name = entry.name().to_string();
        if entry.size() > MAX_SCREENSHOT_BYTES {
            return Err(Error::corrupt(
                path,
                format!("{}: declares {} bytes", entry_name, entry.size()),
            ));
        }
        // Cap the read too; the declared size may lie.
        let mut bytes = Vec::new();
        entry
            .by_ref()
            .take(MAX_SCREENSHOT_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| Error::corrupt(path, format!("{}: {}", entry_name, e)))?;
        if bytes.len() as u64 > MAX_SCREENSHOT_BYTES {
            return Err(Error::corrupt(path, format!("{}: screenshot too large", entry_name)));
        }
        let image = SlotImage::decode(bytes);
        if let Err(e) = &image.thumbnail {
            debug!("{} {}: screenshot does not decode: {}", snap.name(), slot, e);
        }
        slots.insert(slot, image);
    }
    Ok(SnapshotView {
        seq: snap.seq,
        name: snap.name(),
        path: path.clone(),
        modified: DateTime::<Local>::from(modified),
        slots,
    })
}
