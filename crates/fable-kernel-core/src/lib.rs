//! Core engine for the Fable (F# → Python) notebook kernel.
//!
//! This crate provides:
//! - Incremental whole-program reconstruction from independent cells
//! - The timestamp handshake with the watch-mode `fable-py` compiler
//! - A persistent Python runtime driven over a small IPC protocol
//! - The session object implementing the notebook execute contract

pub mod compile;
pub mod config;
pub mod error;
pub mod kernel_info;
pub mod magic;
pub mod paths;
pub mod program;
pub mod runtime;
pub mod session;

pub use compile::{CompilerProcess, DiagnosticQueue, RoundResult, Synchronizer, Toolchain};
pub use config::{CompilerSettings, KernelConfig, PollPolicy};
pub use error::{Error, Result};
pub use kernel_info::{KernelInfo, LanguageInfo};
pub use paths::KernelDirs;
pub use program::{DeclKey, DeclKind, MergedCell, Program, Statement};
pub use runtime::{
    ExecutionFault, ExecutionOutput, HostRuntime, PythonRuntime, RuntimeInterruptHandle,
};
pub use session::{
    CollectingSink, ExecuteReply, KernelSession, NullSink, OutputEvent, OutputSink,
};
