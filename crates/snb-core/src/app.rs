//! Application state: the shared backup service and the interactive session
//! that owns settings, the auto-backup timer and the current selection.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::archive::{self, ArchiveSummary};
use crate::error::{Error, Result};
use crate::ledger::{Ledger, SnapshotRef};
use crate::paths::Paths;
use crate::settings::{Settings, SettingsStore};
use crate::timer::{AutoBackup, Interval, TimerState};
use crate::view::{self, View};

/// Outcome of a successful snapshot.
#[derive(Debug)]
pub struct Created {
    pub snapshot: SnapshotRef,
    pub summary: ArchiveSummary,
    /// Set when the archive was written but the counter could not be advanced.
    pub counter_error: Option<Error>,
}

/// Create/restore service shared by the UI thread, workers and the timer.
///
/// Create and restore hold the same lock, so two snapshots can never be
/// handed the same sequence number and a restore never races a capture.
#[derive(Debug)]
pub struct Backups {
    source_dir: PathBuf,
    ledger: Ledger,
    lock: Mutex<()>,
    generation: AtomicU64,
    auto_failure: Mutex<Option<Error>>,
}

impl Backups {
    pub fn new(source_dir: impl Into<PathBuf>, ledger: Ledger) -> Self {
        Self {
            source_dir: source_dir.into(),
            ledger,
            lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            auto_failure: Mutex::new(None),
        }
    }

    pub fn open(paths: &Paths) -> Result<Self> {
        Ok(Self::new(&paths.source_dir, Ledger::open(&paths.backup_dir)?))
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Bumped after every successful snapshot.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Zip the source folder into the next `SNAppData<n>.zip`.
    ///
    /// The counter only moves once the archive is fully written.
    pub fn create_snapshot(&self) -> Result<Created> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ledger.ensure_initialized()?;
        if !self.source_dir.is_dir() {
            return Err(Error::not_found(&self.source_dir));
        }
        let seq = self.ledger.next_sequence()?;
        let path = self.ledger.archive_path(seq);
        let summary = archive::archive_dir(&self.source_dir, &path)?;
        let committed = match seq.checked_add(1) {
            Some(next) => self.ledger.commit_sequence(next),
            None => Err(Error::CounterExhausted { path: self.ledger.counter_path() }),
        };
        let counter_error = match committed {
            Ok(()) => None,
            Err(e) => {
                error!("snapshot {} written but counter not advanced: {}", seq, e);
                Some(e)
            }
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        info!(
            "created {} ({} files, {} bytes)",
            path.display(),
            summary.files,
            summary.bytes
        );
        Ok(Created { snapshot: SnapshotRef { seq, path }, summary, counter_error })
    }

    /// Replace the source folder with the contents of snapshot `seq`.
    pub fn load_snapshot(&self, seq: u64) -> Result<SnapshotRef> {
        let snap = self.ledger.locate(seq)?;
        self.restore(&snap)?;
        Ok(snap)
    }

    /// Replace the source folder with the archive `snap` points at.
    pub fn restore(&self, snap: &SnapshotRef) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !snap.path.is_file() {
            return Err(Error::not_found(&snap.path));
        }
        let summary = archive::extract_archive(&snap.path, &self.source_dir)?;
        info!(
            "restored {} into {} ({} files)",
            snap.path.display(),
            self.source_dir.display(),
            summary.files
        );
        Ok(())
    }

    /// Take the most recent auto-backup failure not yet shown to the user.
    pub fn take_auto_failure(&self) -> Option<Error> {
        self.auto_failure.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub(crate) fn record_auto_failure(&self, e: Error) {
        error!("auto-backup failed: {}", e);
        *self.auto_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
    }

    pub fn build_view(&self) -> Result<View> {
        view::build_view(&self.ledger)
    }
}

/// State owned by the interactive control flow.
#[derive(Debug)]
pub struct Session {
    backups: Arc<Backups>,
    store: SettingsStore,
    settings: Settings,
    auto: AutoBackup,
    selected: Option<SnapshotRef>,
}

impl Session {
    /// Initialise the ledger and load settings. If auto-backup was left on,
    /// it is restarted, which takes a snapshot right away.
    pub fn open(paths: Paths) -> Result<Self> {
        let backups = Arc::new(Backups::open(&paths)?);
        let store = SettingsStore::in_dir(&paths.backup_dir);
        let settings = store.load();
        let mut session =
            Self { backups, store, settings, auto: AutoBackup::new(), selected: None };
        session.resume_auto_backup();
        Ok(session)
    }

    /// Restart the timer if settings say auto-backup is on and it is not
    /// already running. Returns whether the timer is enabled afterwards.
    pub fn resume_auto_backup(&mut self) -> bool {
        if self.settings.auto_backup_enabled
            && !self.auto.is_enabled()
            && let Err(e) = self.start_timer(self.settings.interval())
        {
            warn!("could not resume auto-backup: {}", e);
            self.settings.auto_backup_enabled = false;
        }
        self.auto.is_enabled()
    }

    pub fn backups(&self) -> &Arc<Backups> {
        &self.backups
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn timer_state(&self) -> TimerState {
        self.auto.state()
    }

    pub fn auto_backup_enabled(&self) -> bool {
        self.auto.is_enabled()
    }

    pub fn auto_backup_running(&self) -> bool {
        self.auto.is_running()
    }

    pub fn create_snapshot(&self) -> Result<Created> {
        self.backups.create_snapshot()
    }

    pub fn load_snapshot(&self, seq: u64) -> Result<SnapshotRef> {
        self.backups.load_snapshot(seq)
    }

    pub fn build_view(&self) -> Result<View> {
        self.backups.build_view()
    }

    pub fn select(&mut self, snap: Option<SnapshotRef>) {
        self.selected = snap;
    }

    pub fn selected(&self) -> Option<&SnapshotRef> {
        self.selected.as_ref()
    }

    pub fn load_selected(&self) -> Result<SnapshotRef> {
        let snap = self
            .selected
            .as_ref()
            .ok_or_else(|| Error::Validation("select a snapshot to load".into()))?;
        self.backups.restore(snap)?;
        Ok(snap.clone())
    }

    /// Toggle auto-backup. `interval_input` is validated before anything
    /// starts; on rejection the timer is left disabled.
    pub fn set_auto_backup(&mut self, enabled: bool, interval_input: &str) -> Result<()> {
        if enabled {
            let interval = match Interval::parse(interval_input) {
                Ok(i) => i,
                Err(e) => {
                    self.auto.disable();
                    self.settings.auto_backup_enabled = false;
                    return Err(e);
                }
            };
            self.start_timer(interval)?;
            self.settings =
                Settings { auto_backup_enabled: true, auto_backup_interval: interval.minutes() };
        } else {
            self.auto.disable();
            self.settings.auto_backup_enabled = false;
        }
        self.persist_settings();
        Ok(())
    }

    fn start_timer(&mut self, interval: Interval) -> Result<()> {
        let backups = Arc::clone(&self.backups);
        self.auto.enable(interval, move || {
            if let Err(e) = backups.create_snapshot() {
                backups.record_auto_failure(e);
            }
        })
    }

    fn persist_settings(&self) {
        if let Err(e) = self.store.save(&self.settings) {
            error!("error saving options: {}", e);
        }
    }

    /// Stop the timer (waiting for a running snapshot) and save settings.
    /// The persisted enabled flag is kept so the next start resumes.
    pub fn shutdown(&mut self) {
        self.auto.shutdown();
        self.persist_settings();
    }
}
