//! The compile/execute handshake with the watch-mode compiler.
//!
//! One round per cell:
//!
//! ```text
//! reset ──► serialize ──► await ──┬── output newer than epoch ──► commit ──► execute
//!                                 ├── error artifact / stderr  ──► CompileFailed
//!                                 └── attempts exhausted       ──► TimedOut
//! ```
//!
//! The compiler is only ever observed through file modification times. The
//! epoch is the error artifact's mtime right after this round truncated it,
//! so anything the compiler writes afterwards compares strictly newer.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::PollPolicy;
use crate::error::{Error, Result};
use crate::paths::KernelDirs;
use crate::program::{MergedCell, Program};
use crate::runtime::{ExecutionOutput, HostRuntime};

use super::process::DiagnosticQueue;
use super::watch::ArtifactWaker;

/// Outcome of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundResult {
    /// The compiler accepted the program; the emitted Python ran.
    Executed { output: ExecutionOutput },

    /// The compiler rejected the program. Nothing was committed.
    CompileFailed { diagnostics: String },

    /// The compiler never answered. Nothing was committed.
    TimedOut {
        /// Reference time the output artifact had to exceed.
        epoch: SystemTime,
        /// Last output artifact mtime seen, if the file existed.
        observed: Option<SystemTime>,
    },
}

/// What the await phase saw.
enum Verdict {
    Compiled(String),
    Rejected(String),
    Silent { observed: Option<SystemTime> },
}

/// Drives rounds against the artifacts of one work directory.
pub struct Synchronizer {
    source_file: PathBuf,
    output_file: PathBuf,
    error_file: PathBuf,
    poll: PollPolicy,
    waker: Option<ArtifactWaker>,
    diagnostics: Option<DiagnosticQueue>,
}

impl Synchronizer {
    pub fn new(dirs: &KernelDirs, poll: PollPolicy) -> Self {
        Self {
            source_file: dirs.source_file.clone(),
            output_file: dirs.output_file.clone(),
            error_file: dirs.error_file.clone(),
            poll,
            waker: None,
            diagnostics: None,
        }
    }

    /// Treat lines arriving on `queue` as compile diagnostics.
    pub fn with_diagnostics(mut self, queue: DiagnosticQueue) -> Self {
        self.diagnostics = Some(queue);
        self
    }

    /// Wake early on filesystem events instead of sleeping full intervals.
    pub fn with_waker(mut self, waker: ArtifactWaker) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Run one round for `merged`.
    ///
    /// `program` is replaced by `merged.candidate` only when the compiler
    /// produced output for it. Compile failures and timeouts leave it as is.
    pub fn run<R: HostRuntime + ?Sized>(
        &mut self,
        program: &mut Program,
        merged: MergedCell,
        runtime: &mut R,
    ) -> Result<RoundResult> {
        let epoch = self.reset()?;
        let source = merged.render();
        self.serialize(&source)?;
        tracing::debug!(
            "Wrote {} ({} declarations, {} expressions)",
            self.source_file.display(),
            merged.candidate.len(),
            merged.expressions.len()
        );

        match self.await_verdict(epoch)? {
            Verdict::Compiled(code) => {
                *program = merged.candidate;
                let filename = self.output_file.to_string_lossy();
                let output = runtime.execute(&code, &filename)?;
                Ok(RoundResult::Executed { output })
            }
            Verdict::Rejected(diagnostics) => {
                tracing::debug!("Compile failed, program left unchanged");
                Ok(RoundResult::CompileFailed { diagnostics })
            }
            Verdict::Silent { observed } => {
                tracing::warn!(
                    "No compiler response after {} checks",
                    self.poll.max_attempts
                );
                Ok(RoundResult::TimedOut { epoch, observed })
            }
        }
    }

    /// Clear the error artifact and stale signals, returning the epoch.
    fn reset(&self) -> Result<SystemTime> {
        fs::write(&self.error_file, "").map_err(|e| Error::artifact(&self.error_file, e))?;

        if let Some(queue) = &self.diagnostics {
            let stale = queue.drain();
            if !stale.is_empty() {
                tracing::debug!("Discarded {} stale diagnostic lines", stale.len());
            }
        }
        if let Some(waker) = &self.waker {
            waker.clear();
        }

        modified(&self.error_file)?.ok_or_else(|| {
            Error::artifact(
                &self.error_file,
                std::io::Error::new(ErrorKind::NotFound, "error artifact vanished"),
            )
        })
    }

    fn serialize(&self, source: &str) -> Result<()> {
        fs::write(&self.source_file, source).map_err(|e| Error::artifact(&self.source_file, e))
    }

    fn await_verdict(&self, epoch: SystemTime) -> Result<Verdict> {
        let mut interval = self.poll.initial_interval;
        let mut observed = None;

        for attempt in 0..self.poll.max_attempts {
            // Output first: a compile that succeeded with warnings is a success.
            if let Some(mtime) = modified(&self.output_file)? {
                observed = Some(mtime);
                if mtime > epoch {
                    let code = fs::read_to_string(&self.output_file)
                        .map_err(|e| Error::artifact(&self.output_file, e))?;
                    if !code.trim().is_empty() {
                        tracing::debug!("Output ready after {} checks", attempt + 1);
                        return Ok(Verdict::Compiled(code));
                    }
                }
            }

            if self.has_diagnostics(epoch)? {
                // Give the compiler a moment to finish writing the rest.
                std::thread::sleep(self.poll.initial_interval);
                return Ok(Verdict::Rejected(self.collect_diagnostics(epoch)?));
            }

            self.pause(interval);
            interval = self.poll.next_interval(interval);
        }

        Ok(Verdict::Silent { observed })
    }

    fn has_diagnostics(&self, epoch: SystemTime) -> Result<bool> {
        if self.diagnostics.as_ref().is_some_and(|queue| !queue.is_empty()) {
            return Ok(true);
        }
        Ok(modified(&self.error_file)?.is_some_and(|mtime| mtime > epoch))
    }

    fn collect_diagnostics(&self, epoch: SystemTime) -> Result<String> {
        let mut sections = Vec::new();

        if modified(&self.error_file)?.is_some_and(|mtime| mtime > epoch) {
            let text = fs::read_to_string(&self.error_file)
                .map_err(|e| Error::artifact(&self.error_file, e))?;
            let text = text.trim_end();
            if !text.is_empty() {
                sections.push(text.to_string());
            }
        }

        if let Some(queue) = &self.diagnostics {
            let lines = queue.drain();
            if !lines.is_empty() {
                sections.push(lines.join("\n"));
            }
        }

        Ok(sections.join("\n"))
    }

    fn pause(&self, interval: Duration) {
        match &self.waker {
            Some(waker) => {
                waker.wait(interval);
            }
            None => std::thread::sleep(interval),
        }
    }
}

/// Modification time of `path`, or `None` if it does not exist.
fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(metadata) => metadata
            .modified()
            .map(Some)
            .map_err(|e| Error::artifact(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::artifact(path, e)),
    }
}
