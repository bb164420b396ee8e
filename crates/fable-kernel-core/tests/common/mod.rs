//! Shared fixtures for session integration tests.
//!
//! `FakeFable` stands in for `dotnet fable-py --watch`: it polls the source
//! artifact and answers every change with either emitted Python or an error
//! artifact, after a short simulated compile time.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use serde_json::Value;

use fable_kernel_core::{
    Error, ExecutionOutput, HostRuntime, KernelConfig, KernelDirs, KernelSession, PollPolicy,
    Result,
};

/// Sources containing this identifier fail to compile.
pub const UNDEFINED: &str = "nope";

const COMPILE_TIME: Duration = Duration::from_millis(20);
const POLL: Duration = Duration::from_millis(5);

/// Background thread imitating the watch-mode compiler.
pub struct FakeFable {
    stop: Arc<AtomicBool>,
    compiles: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl FakeFable {
    pub fn start(dirs: &KernelDirs) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let compiles = Arc::new(AtomicUsize::new(0));
        let source = dirs.source_file.clone();
        let output = dirs.output_file.clone();
        let error = dirs.error_file.clone();

        let handle = {
            let stop = stop.clone();
            let compiles = compiles.clone();
            thread::spawn(move || watch(&source, &output, &error, &stop, &compiles))
        };

        Self {
            stop,
            compiles,
            handle: Some(handle),
        }
    }

    /// Number of compiles performed so far.
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl Drop for FakeFable {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn watch(
    source: &Path,
    output: &PathBuf,
    error: &PathBuf,
    stop: &AtomicBool,
    compiles: &AtomicUsize,
) {
    let mut last: Option<(SystemTime, u64)> = None;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(POLL);

        let Ok(metadata) = fs::metadata(source) else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let stamp = (modified, metadata.len());
        if last == Some(stamp) {
            continue;
        }
        last = Some(stamp);

        let text = fs::read_to_string(source).unwrap_or_default();
        if text.trim().is_empty() {
            continue;
        }

        thread::sleep(COMPILE_TIME);
        compiles.fetch_add(1, Ordering::SeqCst);
        if text.contains(UNDEFINED) {
            let _ = fs::write(
                error,
                format!(
                    "Fable.fs(2,9): error FS0039: The value or constructor '{}' is not defined.\n",
                    UNDEFINED
                ),
            );
        } else {
            let _ = fs::write(output, translate(&text));
        }
    }
}

/// Just enough F# → Python for single-line tests.
pub fn translate(source: &str) -> String {
    let mut python = String::new();
    for line in source.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("module ") {
            continue;
        }
        let translated = if line == "do ()" {
            "None".to_string()
        } else if let Some(binding) = line.strip_prefix("let ") {
            binding.to_string()
        } else if let Some(inner) = line
            .strip_prefix("printfn \"%A\" (")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            format!("print({})", inner)
        } else {
            line.to_string()
        };
        python.push_str(&translated);
        python.push('\n');
    }
    python
}

/// Runtime that records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    pub executed: Vec<(String, String)>,
    pub resets: usize,
    pub variables: serde_json::Map<String, Value>,
    /// Make `shutdown` report a failure.
    pub fail_shutdown: bool,
}

impl RecordingRuntime {
    /// Code of the most recent execution.
    pub fn last_code(&self) -> Option<&str> {
        self.executed.last().map(|(code, _)| code.as_str())
    }
}

impl HostRuntime for RecordingRuntime {
    fn execute(&mut self, code: &str, filename: &str) -> Result<ExecutionOutput> {
        self.executed.push((code.to_string(), filename.to_string()));
        Ok(ExecutionOutput::default())
    }

    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        self.variables.clear();
        Ok(())
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    fn get_variable(&mut self, name: &str) -> Result<Option<Value>> {
        Ok(self.variables.get(name).cloned())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.fail_shutdown {
            return Err(Error::Runtime("worker did not exit".to_string()));
        }
        Ok(())
    }
}

/// Configuration for sessions driven by `FakeFable`.
pub fn test_config(poll: PollPolicy) -> KernelConfig {
    let mut config = KernelConfig {
        poll,
        fs_events: false,
        ..KernelConfig::default()
    };
    config.compiler.spawn = false;
    config
}

/// A session with a recording runtime and a fake compiler.
pub fn recording_session() -> (KernelSession<RecordingRuntime>, FakeFable) {
    let config = test_config(PollPolicy::fixed(300, Duration::from_millis(10)));
    let dirs = KernelDirs::temporary().unwrap();
    let session =
        KernelSession::with_runtime(config, dirs, RecordingRuntime::default(), None).unwrap();
    let fable = FakeFable::start(session.dirs());
    (session, fable)
}
