//! Project command: print or write the F# project manifest.

use std::path::Path;

use fable_kernel_core::compile::{ProjectConfig, generate_fsproj, write_fsproj};
use fable_kernel_core::paths::PROJECT_FILE;

/// Execute the project command.
pub fn execute(output: Option<&Path>) -> anyhow::Result<()> {
    let config = ProjectConfig::default();

    match output {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(PROJECT_FILE);
            write_fsproj(&path, &config)?;
            println!("{}", path.display());
        }
        None => print!("{}", generate_fsproj(&config)),
    }

    Ok(())
}
