//! Everything between a merged cell and emitted Python.
//!
//! This module provides:
//! - Toolchain discovery (`dotnet`, `python3`)
//! - The project manifest the compiler builds
//! - Supervision of the watch-mode compiler process
//! - The timestamp handshake that turns a cell into a verdict
//!
//! # Architecture
//!
//! ```text
//! MergedCell
//!     │
//!     └── Synchronizer ──► Fable.fs ──► dotnet fable-py --watch ──┬──► fable.py ──► HostRuntime
//!              ▲                                                  ├──► fable.err
//!              │                                                  └──► stderr ──► DiagnosticQueue
//!              └──────────── mtime polling (+ ArtifactWaker) ─────┘
//! ```

mod process;
mod project;
mod sync;
mod toolchain;
mod watch;

pub use process::{CompilerProcess, DiagnosticQueue};
pub use project::{PackageReference, ProjectConfig, generate_fsproj, write_fsproj};
pub use sync::{RoundResult, Synchronizer};
pub use toolchain::{CompilerCommand, Toolchain, find_python};
pub use watch::ArtifactWaker;
