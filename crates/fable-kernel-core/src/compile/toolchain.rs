//! Toolchain discovery for the external compiler and the Python runtime.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::CompilerSettings;
use crate::error::{Error, Result};

/// How to launch the compiler in watch mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    /// Executable (usually `dotnet`).
    pub program: PathBuf,
    /// Arguments with the work directory already substituted.
    pub args: Vec<String>,
}

/// Located `dotnet` installation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    dotnet: PathBuf,
}

impl Toolchain {
    /// Locate `dotnet`.
    ///
    /// Looks in the following order:
    /// 1. The explicit path, if given
    /// 2. `FABLE_KERNEL_DOTNET` environment variable
    /// 3. System PATH
    pub fn detect(explicit: Option<&Path>) -> Result<Self> {
        let dotnet = find_executable(explicit, "FABLE_KERNEL_DOTNET", &["dotnet"])?;
        Ok(Self { dotnet })
    }

    /// Toolchain at a known path, without checking it exists.
    pub fn at(dotnet: impl Into<PathBuf>) -> Self {
        Self {
            dotnet: dotnet.into(),
        }
    }

    pub fn dotnet_path(&self) -> &Path {
        &self.dotnet
    }

    /// `dotnet --version`.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.dotnet)
            .arg("--version")
            .output()
            .map_err(|e| Error::Toolchain(format!("Failed to run dotnet: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Toolchain(format!(
                "dotnet --version failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Build the watch-mode compiler command for `work_dir`.
    pub fn compiler_command(&self, settings: &CompilerSettings, work_dir: &Path) -> CompilerCommand {
        let dir = work_dir.to_string_lossy();
        CompilerCommand {
            program: self.dotnet.clone(),
            args: settings
                .args
                .iter()
                .map(|arg| arg.replace("{dir}", &dir))
                .collect(),
        }
    }
}

/// Locate the Python interpreter for the runtime worker.
///
/// Same lookup order as [`Toolchain::detect`], using `FABLE_KERNEL_PYTHON`
/// and then `python3` or `python` on PATH.
pub fn find_python(explicit: Option<&Path>) -> Result<PathBuf> {
    find_executable(explicit, "FABLE_KERNEL_PYTHON", &["python3", "python"])
}

fn find_executable(explicit: Option<&Path>, env_var: &str, names: &[&str]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return which::which(path).map_err(|_| {
            Error::Toolchain(format!("{} not found", path.display()))
        });
    }

    if let Ok(path) = std::env::var(env_var) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to missing file {}", env_var, path.display());
    }

    for name in names {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    Err(Error::Toolchain(format!(
        "{} not found in PATH. Set {} to its location.",
        names.join(" / "),
        env_var
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_command_substitutes_dir() {
        let toolchain = Toolchain::at("/usr/bin/dotnet");
        let command =
            toolchain.compiler_command(&CompilerSettings::default(), Path::new("/tmp/work"));

        assert_eq!(command.program, PathBuf::from("/usr/bin/dotnet"));
        assert_eq!(command.args, vec!["fable-py", "/tmp/work", "--watch"]);
    }

    #[test]
    fn test_explicit_missing_path_is_toolchain_error() {
        let result = Toolchain::detect(Some(Path::new("/definitely/not/here/dotnet")));
        assert!(matches!(result, Err(Error::Toolchain(_))));
    }

    #[test]
    fn test_explicit_existing_path_is_used() {
        let temp = tempfile::TempDir::new().unwrap();
        let fake = temp.path().join("python-fake");
        std::fs::write(&fake, "").unwrap();

        assert_eq!(find_python(Some(&fake)).unwrap(), fake);
    }
}
