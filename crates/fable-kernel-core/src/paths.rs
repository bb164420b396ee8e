//! Kernel working directory management.
//!
//! The kernel and the external compiler meet in one directory. Every file in
//! it is a compile artifact, identified by path and modification time only:
//!
//! ```text
//! <work_dir>/
//! ├── Jupyter.fsproj   # project manifest, written once at startup
//! ├── Fable.fs         # whole-program F# source, rewritten every cell
//! ├── fable.py         # Python emitted by the compiler on success
//! └── fable.err        # diagnostics written on failure
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// Name of the F# source artifact.
pub const SOURCE_FILE: &str = "Fable.fs";
/// Name of the Python file fable-py emits for [`SOURCE_FILE`].
pub const OUTPUT_FILE: &str = "fable.py";
/// Name of the error artifact.
pub const ERROR_FILE: &str = "fable.err";
/// Name of the project manifest.
pub const PROJECT_FILE: &str = "Jupyter.fsproj";

/// Directory layout shared with the external compiler.
#[derive(Debug)]
pub struct KernelDirs {
    /// The working directory the compiler watches.
    pub work_dir: PathBuf,

    /// F# source artifact (input to the compiler).
    pub source_file: PathBuf,

    /// Emitted Python artifact (compiler output on success).
    pub output_file: PathBuf,

    /// Error artifact (compiler output on failure).
    pub error_file: PathBuf,

    /// Project manifest describing the compiled unit.
    pub project_file: PathBuf,

    /// Owned temporary directory, removed on drop.
    temp: Option<TempDir>,
}

impl KernelDirs {
    /// Create the layout inside a fresh temporary directory.
    ///
    /// The directory is deleted when the `KernelDirs` is dropped.
    pub fn temporary() -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("fable-kernel-")
            .tempdir()?;
        let mut dirs = Self::layout(temp.path());
        dirs.temp = Some(temp);
        Ok(dirs)
    }

    /// Create the layout inside an existing (or to be created) directory.
    ///
    /// The directory is left in place when the `KernelDirs` is dropped.
    pub fn in_dir(work_dir: &Path) -> Result<Self> {
        fs::create_dir_all(work_dir).map_err(|e| Error::artifact(work_dir, e))?;
        Ok(Self::layout(work_dir))
    }

    fn layout(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            source_file: work_dir.join(SOURCE_FILE),
            output_file: work_dir.join(OUTPUT_FILE),
            error_file: work_dir.join(ERROR_FILE),
            project_file: work_dir.join(PROJECT_FILE),
            temp: None,
        }
    }

    /// Whether the directory is temporary and owned by this value.
    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Truncate the source artifact.
    pub fn clear_source(&self) -> Result<()> {
        fs::write(&self.source_file, "").map_err(|e| Error::artifact(&self.source_file, e))
    }

    /// Read the current F# source artifact (empty if never written).
    pub fn read_source(&self) -> Result<String> {
        read_or_empty(&self.source_file)
    }

    /// Read the current emitted Python artifact (empty if never written).
    pub fn read_output(&self) -> Result<String> {
        read_or_empty(&self.output_file)
    }

    /// Remove the temporary directory now instead of on drop.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(temp) = self.temp.take() {
            temp.close()?;
        }
        Ok(())
    }
}

fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(Error::artifact(path, e)),
    }
}
