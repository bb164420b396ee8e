//! fable-kernel CLI - F# notebook kernel backed by Fable's Python target.

mod colors;
mod console;
mod project;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fable_kernel_core::KernelInfo;

#[derive(Parser)]
#[command(name = "fable-kernel")]
#[command(about = "F# notebook kernel compiling cells to Python with Fable")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive console session
    Console {
        /// Work directory shared with the compiler (default: temporary)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Do not spawn the compiler; expect a watcher already running
        #[arg(long)]
        no_compiler: bool,

        /// Path to the dotnet executable
        #[arg(long)]
        dotnet: Option<PathBuf>,

        /// Path to the Python interpreter
        #[arg(long)]
        python: Option<PathBuf>,

        /// Checks for compiler output before a cell times out
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        poll_attempts: Option<u32>,

        /// Poll on a timer only, without filesystem notifications
        #[arg(long)]
        no_fs_events: bool,
    },

    /// Print the F# project manifest, or write it into a directory
    Project {
        /// Directory to write Jupyter.fsproj into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print kernel metadata as JSON
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format fable-kernel-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(kernel_err) = err.downcast_ref::<fable_kernel_core::Error>() {
            anyhow::anyhow!("{}", kernel_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Console {
            work_dir,
            no_compiler,
            dotnet,
            python,
            poll_attempts,
            no_fs_events,
        } => {
            let options = console::ConsoleOptions {
                work_dir,
                no_compiler,
                dotnet,
                python,
                poll_attempts,
                no_fs_events,
            };
            console::execute(options).await.map_err(format_error)?;
        }

        Commands::Project { output } => {
            project::execute(output.as_deref()).map_err(format_error)?;
        }

        Commands::Info => {
            println!("{}", serde_json::to_string_pretty(&KernelInfo::default())?);
        }
    }

    Ok(())
}
