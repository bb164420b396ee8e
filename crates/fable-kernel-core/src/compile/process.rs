//! Supervision of the external watch-mode compiler.
//!
//! The compiler runs as its own process and talks to the kernel only through
//! the work directory. Its stdout is drained into the log so the pipe never
//! fills; its stderr is drained into a bounded [`DiagnosticQueue`] that the
//! synchronizer inspects between polls.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{Error, Result};

use super::toolchain::CompilerCommand;

/// Bounded, thread-safe queue of diagnostic lines.
///
/// When full, the oldest line is dropped to make room.
#[derive(Debug, Clone)]
pub struct DiagnosticQueue {
    inner: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl DiagnosticQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(256)))),
            capacity,
        }
    }

    /// Append a line, evicting the oldest when full.
    pub fn push(&self, line: impl Into<String>) {
        let mut queue = self.lock();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(line.into());
    }

    /// Take every queued line.
    pub fn drain(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        // A reader thread that panicked mid-push leaves a usable queue.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to the running watch-mode compiler.
pub struct CompilerProcess {
    child: Child,
    diagnostics: DiagnosticQueue,
    terminated: bool,
}

impl CompilerProcess {
    /// Spawn the compiler in `work_dir`.
    pub fn spawn(command: &CompilerCommand, work_dir: &Path, capacity: usize) -> Result<Self> {
        tracing::info!(
            "Starting compiler: {} {}",
            command.program.display(),
            command.args.join(" ")
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Terminal Ctrl-C is meant for the running cell, not the compiler.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| {
                Error::Compiler(format!(
                    "Failed to spawn compiler '{}': {}",
                    command.program.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Compiler("Failed to get compiler stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Compiler("Failed to get compiler stderr".to_string()))?;

        // Reader threads end on their own once the pipes close, which may be
        // after the compiler's own children exit. They are never joined.
        let diagnostics = DiagnosticQueue::new(capacity);
        spawn_reader("compiler-stdout", stdout, |line| {
            tracing::debug!("[compiler] {}", line);
        })?;
        spawn_reader("compiler-stderr", stderr, {
            let queue = diagnostics.clone();
            move |line| {
                tracing::debug!("[compiler:stderr] {}", line);
                queue.push(line);
            }
        })?;

        Ok(Self {
            child,
            diagnostics,
            terminated: false,
        })
    }

    /// Queue fed from the compiler's stderr.
    pub fn diagnostics(&self) -> DiagnosticQueue {
        self.diagnostics.clone()
    }

    /// Process ID of the compiler.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Check if the compiler process is still running.
    pub fn is_running(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the compiler and reap it.
    pub fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        tracing::info!("Stopping compiler (pid {})", self.child.id());
        if let Err(e) = self.child.kill() {
            // Already exited is fine.
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill compiler: {}", e);
            }
        }
        self.child
            .wait()
            .map_err(|e| Error::Compiler(format!("Failed to wait for compiler: {}", e)))?;
        Ok(())
    }
}

impl Drop for CompilerProcess {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

fn spawn_reader<R, F>(name: &str, stream: R, mut on_line: F) -> Result<()>
where
    R: Read + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let reader = BufReader::new(stream);
            for line in reader.lines() {
                match line {
                    Ok(line) => on_line(line),
                    Err(e) => {
                        tracing::debug!("Compiler stream closed: {}", e);
                        break;
                    }
                }
            }
        })
        .map(|_| ())
        .map_err(|e| Error::Compiler(format!("Failed to start reader thread: {}", e)))
}
