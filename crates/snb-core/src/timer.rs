//! Auto-backup timer.
//!
//! A background thread runs the job, then parks on a [`CancelToken`] for one
//! interval and goes round again. Cancelling wakes it straight away, so a
//! disable request never waits out the interval.

use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Error, Result};

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 60;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// Auto-backup interval in whole minutes, always within 1..=60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval(u32);

impl Interval {
    pub fn new(minutes: u32) -> Result<Self> {
        if (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(Error::Validation(format!(
                "interval must be between {MIN_INTERVAL_MINUTES} and {MAX_INTERVAL_MINUTES} minutes, got {minutes}"
            )))
        }
    }

    /// Parse user input such as the GUI text field or a CLI argument.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let minutes = trimmed.parse::<u32>().map_err(|_| {
            Error::Validation(format!(
                "interval must be a whole number of minutes between {MIN_INTERVAL_MINUTES} and {MAX_INTERVAL_MINUTES}, got {trimmed:?}"
            ))
        })?;
        Self::new(minutes)
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0) * 60)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL_MINUTES)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

/// Shared cancellation flag that sleeping waiters can be woken from.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancelToken {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout`. Returns `true` if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Runs `job` immediately and then once per `period` until cancelled.
#[derive(Debug)]
pub struct PeriodicTask {
    token: Arc<CancelToken>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, period: Duration, job: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let token = CancelToken::new();
        let worker_token = Arc::clone(&token);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            loop {
                if worker_token.is_cancelled() {
                    break;
                }
                let started = Instant::now();
                job();
                debug!("periodic job finished in {:?}", started.elapsed());
                if worker_token.wait(period) {
                    break;
                }
            }
        })?;
        Ok(Self { token, handle: Some(handle) })
    }

    pub fn token(&self) -> Arc<CancelToken> {
        Arc::clone(&self.token)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and let the worker exit on its own once the current job is done.
    pub fn detach(mut self) {
        self.token.cancel();
        self.handle.take();
    }

    /// Cancel and wait for an in-flight job to complete.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("periodic task panicked");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Disabled,
    Enabled(Interval),
}

/// The auto-backup toggle.
#[derive(Debug)]
pub struct AutoBackup {
    task: Option<PeriodicTask>,
    state: TimerState,
}

impl Default for AutoBackup {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoBackup {
    pub const THREAD_NAME: &'static str = "auto-backup";

    pub fn new() -> Self {
        Self { task: None, state: TimerState::Disabled }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, TimerState::Enabled(_))
    }

    /// Start the timer; `job` runs now and then every `interval`.
    /// Re-enabling replaces the running task.
    pub fn enable<F>(&mut self, interval: Interval, job: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        self.disable();
        let task = PeriodicTask::spawn(Self::THREAD_NAME, interval.as_duration(), job)
            .map_err(|e| Error::io(Self::THREAD_NAME, e))?;
        self.task = Some(task);
        self.state = TimerState::Enabled(interval);
        info!("auto-backup enabled every {}", interval);
        Ok(())
    }

    /// Cancel without waiting for a snapshot that is already running.
    pub fn disable(&mut self) {
        if let Some(task) = self.task.take() {
            task.detach();
            info!("auto-backup disabled");
        }
        self.state = TimerState::Disabled;
    }

    /// Cancel and wait for the worker to exit.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.stop();
        }
        self.state = TimerState::Disabled;
    }

    /// Whether a worker thread from the current enable is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AutoBackup {
    fn drop(&mut self) {
        self.shutdown();
    }
}
