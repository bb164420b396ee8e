//! Error types for fable-kernel-core.
//!
//! Compiler diagnostics and polling timeouts are not errors: they are
//! ordinary outcomes of a round (see [`crate::compile::RoundResult`]).
//! This enum covers the faults nobody planned for.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for fable-kernel-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fable-kernel-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing one of the compile artifacts failed.
    #[error("IO error at {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The external compiler could not be started or supervised.
    #[error("compiler process error: {0}")]
    Compiler(String),

    /// Toolchain error (dotnet or python missing, unusable version).
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// IPC communication error with the runtime worker.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The runtime worker reported a failure unrelated to user code.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// File watch error.
    #[error("file watch error: {0}")]
    Watch(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an IO error with the artifact path it happened on.
    pub fn artifact(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Artifact {
            path: path.into(),
            source,
        }
    }

    /// Short, stable name of the error kind, used as `ename` in replies.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Artifact { .. } | Self::Io(_) => "IOError",
            Self::Compiler(_) => "CompilerProcessError",
            Self::Toolchain(_) => "ToolchainError",
            Self::Ipc(_) => "IpcError",
            Self::Serialization(_) => "SerializationError",
            Self::Runtime(_) => "RuntimeError",
            Self::Watch(_) => "WatchError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Render the error together with a recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Toolchain(_) => Some(
                "install the .NET SDK and `dotnet tool install fable-py`, \
                 or point FABLE_KERNEL_DOTNET / FABLE_KERNEL_PYTHON at the binaries",
            ),
            Self::Compiler(_) => Some("check that `dotnet fable-py --help` works in this shell"),
            Self::Ipc(_) | Self::Runtime(_) => {
                Some("the Python worker may have crashed; restart the kernel with %reset")
            }
            Self::Config(_) => Some("run with --help to see accepted values"),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
