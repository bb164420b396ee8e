//! Console command: an interactive frontend over the execute contract.
//!
//! Cells are read from stdin. A line consisting of `;;` ends a cell, as does
//! end of input. Ctrl+C interrupts the running cell; at the prompt it exits.

use std::io::IsTerminal;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use fable_kernel_core::{
    ExecuteReply, KernelConfig, KernelInfo, KernelSession, OutputSink, RuntimeInterruptHandle,
};

use crate::colors;

/// Line that terminates a cell.
const CELL_TERMINATOR: &str = ";;";

/// Options of the console command.
#[derive(Debug, Default)]
pub struct ConsoleOptions {
    pub work_dir: Option<PathBuf>,
    pub no_compiler: bool,
    pub dotnet: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub poll_attempts: Option<u32>,
    pub no_fs_events: bool,
}

impl ConsoleOptions {
    /// Environment defaults overridden by command-line flags.
    fn into_config(self) -> anyhow::Result<KernelConfig> {
        let mut config = KernelConfig::from_env()?;
        if let Some(dir) = self.work_dir {
            config.work_dir = Some(dir);
        }
        if self.no_compiler {
            config.compiler.spawn = false;
        }
        if let Some(dotnet) = self.dotnet {
            config.compiler.dotnet = Some(dotnet);
        }
        if let Some(python) = self.python {
            config.python = Some(python);
        }
        if let Some(attempts) = self.poll_attempts {
            config.poll.max_attempts = attempts;
        }
        if self.no_fs_events {
            config.fs_events = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Sink that writes cell output to the terminal.
struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout(&mut self, text: &str) {
        print!("{}", text);
        colors::flush_stdout();
    }

    fn stderr(&mut self, text: &str) {
        eprint!("{}", colors::paint_stderr(colors::RED, text));
    }

    fn display_code(&mut self, language: &str, source: &str) {
        println!("{}```{}{}", colors::DIM, language, colors::RESET);
        println!("{}", source);
        println!("{}```{}", colors::DIM, colors::RESET);
    }

    fn execute_result(&mut self, execution_count: u32, value: &str) {
        println!(
            "{}Out[{}]:{} {}",
            colors::YELLOW,
            execution_count,
            colors::RESET,
            value
        );
    }
}

/// Execute the console command.
pub async fn execute(options: ConsoleOptions) -> anyhow::Result<()> {
    let config = options.into_config()?;
    let interactive = std::io::stdin().is_terminal();

    let info = KernelInfo::default();
    eprintln!(
        "\n{}",
        colors::paint_stderr(
            colors::BOLD,
            &format!("{} {}", info.implementation, info.implementation_version)
        )
    );
    eprintln!("{}", colors::paint_stderr(colors::DIM, &info.banner));
    if interactive {
        eprintln!(
            "{}",
            colors::paint_stderr(
                colors::DIM,
                "End a cell with a line containing ;; (Ctrl+D to quit)"
            )
        );
    }

    let mut session = tokio::task::spawn_blocking(move || KernelSession::start(config)).await??;
    let interrupt = session.interrupt_handle();
    eprintln!(
        "{}",
        colors::paint_stderr(
            colors::CYAN,
            &format!("Work directory: {}", session.dirs().work_dir.display())
        )
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut cell: Vec<String> = Vec::new();
    let mut next_count = 1;

    loop {
        if interactive && cell.is_empty() {
            print!("{}In [{}]:{} ", colors::GREEN, next_count, colors::RESET);
            colors::flush_stdout();
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                eprintln!();
                break;
            }
        };

        match line {
            Some(line) if line.trim() == CELL_TERMINATOR => {
                let code = cell.join("\n");
                cell.clear();
                if code.trim().is_empty() {
                    continue;
                }
                let (returned, reply) = run_cell(session, &interrupt, code).await?;
                session = returned;
                next_count = reply.execution_count() + 1;
            }
            Some(line) => cell.push(line),
            None => {
                let code = cell.join("\n");
                if !code.trim().is_empty() {
                    let (returned, _) = run_cell(session, &interrupt, code).await?;
                    session = returned;
                }
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || session.shutdown(false)).await??;
    Ok(())
}

/// Run one cell on a blocking thread, forwarding Ctrl+C to the runtime.
async fn run_cell(
    mut session: KernelSession,
    interrupt: &RuntimeInterruptHandle,
    code: String,
) -> anyhow::Result<(KernelSession, ExecuteReply)> {
    let mut task = tokio::task::spawn_blocking(move || {
        let reply = session.execute(&code, false, true, &mut ConsoleSink);
        (session, reply)
    });

    loop {
        tokio::select! {
            joined = &mut task => return Ok(joined?),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                eprintln!("{}", colors::paint_stderr(colors::YELLOW, "Interrupting..."));
                interrupt.interrupt();
            }
        }
    }
}
