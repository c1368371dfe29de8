#![allow(dead_code)]

use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

use jobctl::jobs::{JobId, JobRegistry, LogEvent, Subscription};

pub use jobctl_test_utils::{init_tracing, sh, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Collect the rest of a subscription: history first, then live lines until
/// the end-of-stream event. Returns the lines and whether `End` was seen.
pub async fn drain(sub: &mut Subscription) -> (Vec<String>, bool) {
    let mut lines = sub.take_history();
    while let Some(event) = sub.recv().await {
        match event {
            LogEvent::Line(line) => lines.push(line),
            LogEvent::End => return (lines, true),
        }
    }
    (lines, false)
}

/// Subscribe to `id` and follow it to the end.
pub async fn follow(
    registry: &JobRegistry,
    id: JobId,
) -> Result<(Vec<String>, bool), Box<dyn Error>> {
    let mut sub = registry.subscribe(id)?;
    Ok(drain(&mut sub).await)
}

/// Whether `pid` is a live process. Exited processes and zombies count as
/// dead.
pub fn process_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| !rest.trim_start().starts_with(['Z', 'X'])),
        Err(_) => false,
    }
}

/// Poll until `path` holds a pid written by a test script.
pub async fn read_pidfile(path: &Path) -> i32 {
    loop {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Poll until `pid` is gone, for at most `limit`. Returns whether it died.
pub fn wait_for_exit(pid: i32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while process_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    true
}
