//! F# project manifest generation.
//!
//! The compiler needs a project file next to the source artifact to resolve
//! FSharp.Core and the Fable bindings. It is written once per session.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::SOURCE_FILE;

/// A NuGet package reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub name: String,
    pub version: String,
}

impl PackageReference {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Configuration for generating the project manifest.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Target framework moniker.
    pub target_framework: String,
    /// F# language version.
    pub lang_version: String,
    /// Source files compiled in order.
    pub sources: Vec<String>,
    /// Package references.
    pub packages: Vec<PackageReference>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            target_framework: "net5".to_string(),
            lang_version: "preview".to_string(),
            sources: vec![SOURCE_FILE.to_string()],
            packages: vec![
                PackageReference::new("FSharp.Core", "6.0.1"),
                PackageReference::new("Fable.Core.Experimental", "4.0.0-alpha-010"),
                PackageReference::new("Fable.Python", "0.16.0"),
            ],
        }
    }
}

/// Generate an SDK-style `.fsproj` manifest.
pub fn generate_fsproj(config: &ProjectConfig) -> String {
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<Project Sdk=\"Microsoft.NET.Sdk\">\n");

    xml.push_str("<PropertyGroup>\n");
    xml.push_str("    <OutputType>Exe</OutputType>\n");
    xml.push_str(&format!(
        "    <TargetFramework>{}</TargetFramework>\n",
        escape(&config.target_framework)
    ));
    xml.push_str("    <RollForward>Major</RollForward>\n");
    xml.push_str(&format!(
        "    <LangVersion>{}</LangVersion>\n",
        escape(&config.lang_version)
    ));
    xml.push_str(
        "    <DisableImplicitFSharpCoreReference>true</DisableImplicitFSharpCoreReference>\n",
    );
    xml.push_str("</PropertyGroup>\n");

    xml.push_str("<ItemGroup>\n");
    for source in &config.sources {
        xml.push_str(&format!("    <Compile Include=\"{}\" />\n", escape(source)));
    }
    xml.push_str("</ItemGroup>\n");

    if !config.packages.is_empty() {
        xml.push_str("<ItemGroup>\n");
        for package in &config.packages {
            xml.push_str(&format!(
                "    <PackageReference Include=\"{}\" Version=\"{}\" />\n",
                escape(&package.name),
                escape(&package.version)
            ));
        }
        xml.push_str("</ItemGroup>\n");
    }

    xml.push_str("</Project>\n");
    xml
}

/// Write the manifest to `path`.
pub fn write_fsproj(path: &Path, config: &ProjectConfig) -> Result<()> {
    fs::write(path, generate_fsproj(config)).map_err(|e| Error::artifact(path, e))?;
    tracing::debug!("Wrote project manifest {}", path.display());
    Ok(())
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
