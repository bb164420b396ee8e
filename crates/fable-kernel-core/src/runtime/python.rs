//! Python worker process management.
//!
//! Provides `PythonRuntime` for spawning and talking to the long-running
//! interpreter that holds the execution namespace.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};

use super::protocol::{RuntimeRequest, RuntimeResponse, read_message, write_message};
use super::{ExecutionFault, ExecutionOutput, HostRuntime};

/// Worker program, passed to the interpreter with `-c`.
const DRIVER: &str = include_str!("driver.py");

/// Handle to the Python worker process.
pub struct PythonRuntime {
    /// The child process.
    child: Child,
    /// Buffered stdin writer.
    stdin: BufWriter<ChildStdin>,
    /// Buffered stdout reader.
    stdout: BufReader<ChildStdout>,
    /// Whether the worker has been killed.
    killed: bool,
    /// Interpreter the worker was started with.
    python: PathBuf,
    /// Directory on the worker's module search path.
    work_dir: PathBuf,
    /// Pid of the current worker, shared with interrupt handles.
    pid: Arc<AtomicU32>,
}

impl PythonRuntime {
    /// Spawn a worker with `work_dir` on its module search path.
    pub fn spawn(python: &Path, work_dir: &Path) -> Result<Self> {
        let mut cmd = Command::new(python);
        cmd.arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .arg(work_dir)
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        // Interrupts are delivered explicitly through RuntimeInterruptHandle.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::Runtime(format!(
                "Failed to spawn Python worker '{}': {}",
                python.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdout".to_string()))?;

        let pid = Arc::new(AtomicU32::new(child.id()));
        let mut runtime = Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            killed: false,
            python: python.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            pid,
        };

        runtime.ping()?;
        tracing::debug!("Python worker ready (pid {})", runtime.pid());
        Ok(runtime)
    }

    /// Round-trip a ping.
    pub fn ping(&mut self) -> Result<()> {
        match self.request(&RuntimeRequest::Ping)? {
            RuntimeResponse::Pong => Ok(()),
            other => Err(unexpected("ping", other)),
        }
    }

    /// Send a request and wait for its response.
    fn request(&mut self, request: &RuntimeRequest) -> Result<RuntimeResponse> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        write_message(&mut self.stdin, request)?;
        read_message(&mut self.stdout)
    }

    /// Handle that can interrupt a running cell from another thread.
    ///
    /// The handle follows the runtime across restarts.
    pub fn interrupt_handle(&self) -> RuntimeInterruptHandle {
        RuntimeInterruptHandle {
            pid: Arc::clone(&self.pid),
        }
    }

    /// Replace the worker with a freshly spawned one.
    ///
    /// On failure the old worker is left in place.
    pub fn respawn(&mut self) -> Result<()> {
        let mut fresh = Self::spawn(&self.python, &self.work_dir)?;
        fresh.pid = Arc::clone(&self.pid);
        fresh.pid.store(fresh.child.id(), Ordering::SeqCst);

        let mut old = std::mem::replace(self, fresh);
        old.kill()?;
        tracing::info!(
            "Python worker respawned (pid {} -> {})",
            old.child.id(),
            self.pid()
        );
        Ok(())
    }

    /// Kill the worker immediately.
    pub fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;

        let _ = write_message(&mut self.stdin, &RuntimeRequest::Shutdown);
        std::thread::sleep(Duration::from_millis(10));

        if let Err(e) = self.child.kill() {
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill Python worker: {}", e);
            }
        }
        let _ = self.child.wait();
        Ok(())
    }

    /// Check if the worker process is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.killed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Process ID of the worker.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl HostRuntime for PythonRuntime {
    fn execute(&mut self, code: &str, filename: &str) -> Result<ExecutionOutput> {
        let request = RuntimeRequest::Execute {
            code: code.to_string(),
            filename: filename.to_string(),
        };
        match self.request(&request)? {
            RuntimeResponse::Executed {
                stdout,
                stderr,
                value,
            } => Ok(ExecutionOutput {
                stdout,
                stderr,
                value,
                fault: None,
            }),
            RuntimeResponse::Fault {
                ename,
                evalue,
                traceback,
                stdout,
                stderr,
            } => Ok(ExecutionOutput {
                stdout,
                stderr,
                value: None,
                fault: Some(ExecutionFault {
                    ename,
                    evalue,
                    traceback,
                }),
            }),
            RuntimeResponse::Error { message } => Err(Error::Runtime(message)),
            other => Err(unexpected("execute", other)),
        }
    }

    fn reset(&mut self) -> Result<()> {
        match self.request(&RuntimeRequest::Reset)? {
            RuntimeResponse::Done => Ok(()),
            RuntimeResponse::Error { message } => Err(Error::Runtime(message)),
            other => Err(unexpected("reset", other)),
        }
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        let request = RuntimeRequest::SetVariable {
            name: name.to_string(),
            value,
        };
        match self.request(&request)? {
            RuntimeResponse::Done => Ok(()),
            RuntimeResponse::Error { message } => Err(Error::Runtime(message)),
            other => Err(unexpected("set_variable", other)),
        }
    }

    fn get_variable(&mut self, name: &str) -> Result<Option<Value>> {
        let request = RuntimeRequest::GetVariable {
            name: name.to_string(),
        };
        match self.request(&request)? {
            RuntimeResponse::Variable { value } => Ok(value),
            RuntimeResponse::Error { message } => Err(Error::Runtime(message)),
            other => Err(unexpected("get_variable", other)),
        }
    }

    /// Reset the namespace, respawning the worker when it is gone or no
    /// longer answers.
    fn restart(&mut self) -> Result<()> {
        if !self.is_alive() {
            tracing::warn!("Python worker (pid {}) has exited, respawning", self.pid());
            return self.respawn();
        }

        match self.reset() {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Reset failed, respawning Python worker: {:?}", e);
                self.respawn()
            }
        }
    }

    /// Ask the worker to exit cleanly and reap it.
    fn shutdown(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }

        let acknowledged = matches!(
            self.request(&RuntimeRequest::Shutdown),
            Ok(RuntimeResponse::ShuttingDown)
        );
        self.killed = true;

        if !acknowledged {
            let _ = self.child.kill();
        }
        match self.child.wait() {
            Ok(status) if status.success() || !acknowledged => Ok(()),
            Ok(status) => Err(Error::Runtime(format!(
                "Python worker exited with status: {}",
                status
            ))),
            Err(e) => Err(Error::Runtime(format!("Failed to wait for worker: {}", e))),
        }
    }
}

impl Drop for PythonRuntime {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}

fn unexpected(op: &str, response: RuntimeResponse) -> Error {
    Error::Ipc(format!("Unexpected response to {}: {:?}", op, response))
}

/// Thread-safe handle for interrupting the worker from another thread.
#[derive(Debug, Clone)]
pub struct RuntimeInterruptHandle {
    /// Process ID of the current worker.
    pid: Arc<AtomicU32>,
}

impl RuntimeInterruptHandle {
    /// Raise `KeyboardInterrupt` in the running cell. A no-op while the
    /// worker is idle.
    pub fn interrupt(&self) {
        let pid = self.pid();
        if pid == 0 {
            return;
        }

        #[cfg(unix)]
        {
            // SIGINT, not SIGKILL: the namespace survives the interrupt.
            unsafe {
                libc::kill(pid as i32, libc::SIGINT);
            }
        }

        #[cfg(not(unix))]
        {
            tracing::warn!(
                "Interrupting the Python worker (pid {}) is not supported on this platform",
                pid
            );
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid.load(Ordering::SeqCst)
    }
}
