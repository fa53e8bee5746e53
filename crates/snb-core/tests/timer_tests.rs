use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use snb_core::{AutoBackup, CancelToken, Interval, PeriodicTask, TimerState};

fn wait_until(timeout: Duration, f: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    f()
}

#[test]
fn interval_bounds() {
    assert_eq!(Interval::parse("1").unwrap().minutes(), 1);
    assert_eq!(Interval::parse(" 60\n").unwrap().minutes(), 60);
    assert_eq!(Interval::default().minutes(), 5);
    assert_eq!(Interval::new(2).unwrap().as_duration(), Duration::from_secs(120));
    for bad in ["0", "61", "", "five", "1e1", "+-3"] {
        assert!(Interval::parse(bad).unwrap_err().is_validation(), "{bad}");
    }
    assert!(Interval::new(0).is_err());
    assert!(Interval::new(61).is_err());
}

#[test]
fn cancel_token_wakes_waiter() {
    let token = CancelToken::new();
    assert!(!token.wait(Duration::from_millis(10)));

    let waiter = Arc::clone(&token);
    let started = Instant::now();
    let h = thread::spawn(move || waiter.wait(Duration::from_secs(30)));
    thread::sleep(Duration::from_millis(20));
    token.cancel();
    assert!(h.join().unwrap());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(token.is_cancelled());
}

#[test]
fn periodic_task_repeats_until_cancelled() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let task = PeriodicTask::spawn("test-tick", Duration::from_millis(10), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::SeqCst) >= 3));
    task.stop();
    let after = runs.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), after);
}

#[test]
fn cancellation_is_observed_within_a_second() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let task = PeriodicTask::spawn("test-long", Duration::from_secs(3600), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::SeqCst) == 1));

    let token = task.token();
    let started = Instant::now();
    token.cancel();
    assert!(wait_until(Duration::from_secs(1), || task.is_finished()));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn auto_backup_toggle() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut auto = AutoBackup::new();
    assert_eq!(auto.state(), TimerState::Disabled);

    let counter = Arc::clone(&runs);
    let interval = Interval::new(1).unwrap();
    auto.enable(interval, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    assert_eq!(auto.state(), TimerState::Enabled(interval));
    assert!(wait_until(Duration::from_secs(5), || runs.load(Ordering::SeqCst) == 1));
    assert!(auto.is_running());

    auto.disable();
    assert_eq!(auto.state(), TimerState::Disabled);
    assert!(!auto.is_running());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
