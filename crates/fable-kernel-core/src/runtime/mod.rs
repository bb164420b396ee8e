//! Host runtime that executes the emitted Python.
//!
//! The execution namespace lives in a long-running Python worker process,
//! so bindings made by one cell stay visible to the next until a reset.
//!
//! ```text
//! KernelSession
//!     │
//!     └── PythonRuntime (child process, python3 -c <driver>)
//!             │
//!             ├── execute ──► exec() in the persistent namespace
//!             │                └── stdout / stderr / repr(value) / fault
//!             ├── reset   ──► fresh namespace
//!             └── SIGINT  ──► KeyboardInterrupt inside the running cell
//! ```

mod format;
pub mod protocol;
mod python;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use format::format_python;
pub use protocol::{RuntimeRequest, RuntimeResponse, read_message, write_message};
pub use python::{PythonRuntime, RuntimeInterruptHandle};

/// An exception raised by user code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFault {
    /// Exception class name.
    pub ename: String,
    /// Exception message.
    pub evalue: String,
    /// Formatted traceback lines.
    pub traceback: Vec<String>,
}

/// Everything one execution produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Text written to stdout.
    pub stdout: String,
    /// Text written to stderr.
    pub stderr: String,
    /// `repr` of a trailing expression's value, when it is not `None`.
    pub value: Option<String>,
    /// The exception that stopped execution, if any.
    pub fault: Option<ExecutionFault>,
}

impl ExecutionOutput {
    /// Whether the code ran to completion.
    pub fn is_ok(&self) -> bool {
        self.fault.is_none()
    }
}

/// A persistent execution environment.
pub trait HostRuntime {
    /// Run `code` in the persistent namespace. `filename` is used in
    /// tracebacks.
    fn execute(&mut self, code: &str, filename: &str) -> Result<ExecutionOutput>;

    /// Replace the namespace with a fresh one.
    fn reset(&mut self) -> Result<()>;

    /// Bind `name` to a JSON value in the namespace.
    fn set_variable(&mut self, name: &str, value: Value) -> Result<()>;

    /// Read `name` from the namespace. Values that are not JSON-representable
    /// come back as their `repr` string.
    fn get_variable(&mut self, name: &str) -> Result<Option<Value>>;

    /// Bring the runtime back to a fresh namespace, whatever state it is
    /// in. Runtimes that can crash should recreate themselves here; the
    /// default only resets.
    fn restart(&mut self) -> Result<()> {
        self.reset()
    }

    /// Stop the runtime. The default does nothing.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
