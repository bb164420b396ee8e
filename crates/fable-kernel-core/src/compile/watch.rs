//! Filesystem notifications for the poll loop.
//!
//! The waker only shortens sleeps between checks. Whether a compile finished
//! is always decided by comparing modification times, so a missed or spurious
//! event costs at most one poll interval.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};

/// Wakes the poll loop when one of the watched artifacts changes.
pub struct ArtifactWaker {
    /// Watcher handle (kept alive to keep events flowing).
    _watcher: RecommendedWatcher,
    rx: Receiver<()>,
}

impl ArtifactWaker {
    /// Watch `dir` for changes to any of `files` (matched by file name).
    pub fn new(dir: &Path, files: &[&Path]) -> Result<Self> {
        let names: HashSet<OsString> = files
            .iter()
            .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
            .collect();

        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let Ok(event) = result else {
                return;
            };
            let relevant = event
                .paths
                .iter()
                .filter_map(|path| path.file_name())
                .any(|name| names.contains(name));
            if relevant {
                let _ = tx.send(());
            }
        })
        .map_err(|e| Error::Watch(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(e.to_string()))?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Block until a relevant change or `timeout`. Returns whether a change
    /// was seen.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                self.clear();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // Watcher thread is gone; degrade to a plain sleep.
                std::thread::sleep(timeout);
                false
            }
        }
    }

    /// Discard pending notifications.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn test_waker_times_out_without_changes() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("fable.py");
        let waker = ArtifactWaker::new(temp.path(), &[&output]).unwrap();

        let start = Instant::now();
        assert!(!waker.wait(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_waker_wakes_on_watched_file() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("fable.py");
        let waker = ArtifactWaker::new(temp.path(), &[&output]).unwrap();

        let writer = {
            let output = output.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                fs::write(&output, "x = 1\n").unwrap();
            })
        };

        assert!(waker.wait(Duration::from_secs(5)));
        writer.join().unwrap();
    }
}
