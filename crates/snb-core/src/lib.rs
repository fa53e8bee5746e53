//! snb-core: snapshot and restore of a game's save folder
//!
//! This crate keeps a small, well-factored surface:
//! - Zip archive codec (directory -> zip, zip -> directory as a full replace)
//! - Snapshot ledger (counter file + numerically ordered `SNAppData<n>.zip`)
//! - Save-slot indexer reading screenshots straight out of archives
//! - Auto-backup timer, settings store, and the `Session` tying them together
//!
pub mod app;
pub mod archive;
pub mod error;
pub mod ledger;
pub mod paths;
pub mod settings;
pub mod timer;
pub mod view;

pub use app::{Backups, Created, Session};
pub use archive::{ArchiveSummary, archive_dir, extract_archive};
pub use error::{Error, Result};
pub use ledger::{Ledger, SnapshotRef};
pub use paths::Paths;
pub use settings::{Settings, SettingsStore};
pub use timer::{AutoBackup, CancelToken, Interval, PeriodicTask, TimerState};
pub use view::{SlotImage, SlotState, SnapshotView, Thumbnail, View, build_view};
