//! Kernel session: the object a notebook frontend talks to.
//!
//! A session owns everything that persists between cells: the accumulated
//! program, the work directory shared with the compiler, the compiler process
//! and the Python runtime. Every call takes `&mut self`; there is exactly one
//! round in flight at a time.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::compile::{
    ArtifactWaker, CompilerProcess, RoundResult, Synchronizer, Toolchain, find_python,
    write_fsproj,
};
use crate::config::KernelConfig;
use crate::error::Result;
use crate::magic::{self, Magic};
use crate::paths::KernelDirs;
use crate::program::Program;
use crate::runtime::{
    ExecutionOutput, HostRuntime, PythonRuntime, RuntimeInterruptHandle, format_python,
};

/// Filename shown in tracebacks of `%%python` cells.
const PASSTHROUGH_FILENAME: &str = "<cell>";

/// Receiver for everything a cell streams back while it runs.
pub trait OutputSink {
    /// Text for the stdout stream.
    fn stdout(&mut self, text: &str);

    /// Text for the stderr stream (diagnostics, tracebacks, warnings).
    fn stderr(&mut self, text: &str);

    /// Source code to display with highlighting.
    fn display_code(&mut self, language: &str, source: &str);

    /// `repr` of the value a cell evaluated to.
    fn execute_result(&mut self, execution_count: u32, value: &str);
}

/// Sink that drops everything. Used for silent execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn stdout(&mut self, _text: &str) {}
    fn stderr(&mut self, _text: &str) {}
    fn display_code(&mut self, _language: &str, _source: &str) {}
    fn execute_result(&mut self, _execution_count: u32, _value: &str) {}
}

/// One item streamed to a [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
    Code { language: String, source: String },
    Result { execution_count: u32, value: String },
}

/// Sink that records events in order.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub events: Vec<OutputEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stdout text, concatenated.
    pub fn stdout_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Stdout(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All stderr text, concatenated.
    pub fn stderr_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Stderr(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Values reported through `execute_result`.
    pub fn results(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Result { value, .. } => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for CollectingSink {
    fn stdout(&mut self, text: &str) {
        self.events.push(OutputEvent::Stdout(text.to_string()));
    }

    fn stderr(&mut self, text: &str) {
        self.events.push(OutputEvent::Stderr(text.to_string()));
    }

    fn display_code(&mut self, language: &str, source: &str) {
        self.events.push(OutputEvent::Code {
            language: language.to_string(),
            source: source.to_string(),
        });
    }

    fn execute_result(&mut self, execution_count: u32, value: &str) {
        self.events.push(OutputEvent::Result {
            execution_count,
            value: value.to_string(),
        });
    }
}

/// Reply to an execute request, shaped like a Jupyter `execute_reply`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteReply {
    Ok {
        execution_count: u32,
        payload: Vec<Value>,
        user_expressions: Map<String, Value>,
    },
    Error {
        execution_count: u32,
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl ExecuteReply {
    pub fn ok(execution_count: u32) -> Self {
        Self::Ok {
            execution_count,
            payload: Vec::new(),
            user_expressions: Map::new(),
        }
    }

    pub fn error(
        execution_count: u32,
        ename: impl Into<String>,
        evalue: impl Into<String>,
        traceback: Vec<String>,
    ) -> Self {
        Self::Error {
            execution_count,
            ename: ename.into(),
            evalue: evalue.into(),
            traceback,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn execution_count(&self) -> u32 {
        match self {
            Self::Ok {
                execution_count, ..
            }
            | Self::Error {
                execution_count, ..
            } => *execution_count,
        }
    }

    /// Exception name of an error reply.
    pub fn ename(&self) -> Option<&str> {
        match self {
            Self::Error { ename, .. } => Some(ename),
            Self::Ok { .. } => None,
        }
    }
}

/// A running kernel.
pub struct KernelSession<R: HostRuntime = PythonRuntime> {
    config: KernelConfig,
    dirs: KernelDirs,
    program: Program,
    sync: Synchronizer,
    runtime: R,
    compiler: Option<CompilerProcess>,
    execution_count: u32,
}

impl KernelSession<PythonRuntime> {
    /// Set up the work directory, start the compiler and the Python runtime.
    pub fn start(config: KernelConfig) -> Result<Self> {
        config.validate()?;

        let dirs = match &config.work_dir {
            Some(dir) => KernelDirs::in_dir(dir)?,
            None => KernelDirs::temporary()?,
        };
        tracing::info!("Kernel work directory: {}", dirs.work_dir.display());

        write_fsproj(&dirs.project_file, &config.project)?;

        let compiler = if config.compiler.spawn {
            let toolchain = Toolchain::detect(config.compiler.dotnet.as_deref())?;
            match toolchain.version() {
                Ok(version) => tracing::info!("Using dotnet {}", version),
                Err(e) => tracing::warn!("Could not determine dotnet version: {}", e),
            }
            let command = toolchain.compiler_command(&config.compiler, &dirs.work_dir);
            Some(CompilerProcess::spawn(
                &command,
                &dirs.work_dir,
                config.compiler.diagnostics_capacity,
            )?)
        } else {
            tracing::info!("Compiler spawn disabled; expecting an external watcher");
            None
        };

        let python = find_python(config.python.as_deref())?;
        let runtime = PythonRuntime::spawn(&python, &dirs.work_dir)?;

        Self::with_runtime(config, dirs, runtime, compiler)
    }

    /// Handle for interrupting the running cell from another thread.
    pub fn interrupt_handle(&self) -> RuntimeInterruptHandle {
        self.runtime.interrupt_handle()
    }
}

impl<R: HostRuntime> KernelSession<R> {
    /// Assemble a session from already started parts.
    pub fn with_runtime(
        config: KernelConfig,
        dirs: KernelDirs,
        runtime: R,
        compiler: Option<CompilerProcess>,
    ) -> Result<Self> {
        let mut sync = Synchronizer::new(&dirs, config.poll.clone());

        if let Some(compiler) = &compiler {
            sync = sync.with_diagnostics(compiler.diagnostics());
        }

        if config.fs_events {
            match ArtifactWaker::new(&dirs.work_dir, &[&dirs.output_file, &dirs.error_file]) {
                Ok(waker) => sync = sync.with_waker(waker),
                Err(e) => tracing::warn!("File events unavailable, polling only: {}", e),
            }
        }

        Ok(Self {
            config,
            dirs,
            program: Program::new(),
            sync,
            runtime,
            compiler,
            execution_count: 0,
        })
    }

    /// Execute one cell.
    ///
    /// Never fails: every problem becomes an error reply and the session
    /// stays usable.
    pub fn execute(
        &mut self,
        code: &str,
        silent: bool,
        store_history: bool,
        sink: &mut dyn OutputSink,
    ) -> ExecuteReply {
        if store_history && !silent {
            self.execution_count += 1;
        }
        let count = self.execution_count;

        let mut null = NullSink;
        let sink: &mut dyn OutputSink = if silent { &mut null } else { sink };

        match self.execute_cell(code, count, sink) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Execution failed: {:?}", e);
                sink.stderr(&format!("{}\n", e.with_hint()));
                ExecuteReply::error(count, e.kind_name(), e.to_string(), error_chain(&e))
            }
        }
    }

    fn execute_cell(
        &mut self,
        code: &str,
        count: u32,
        sink: &mut dyn OutputSink,
    ) -> Result<ExecuteReply> {
        if let Some(magic) = magic::parse(code) {
            return self.run_magic(magic, count, sink);
        }

        let stripped = magic::strip_line_magics(code);
        for line in &stripped.ignored {
            sink.stderr(&format!("Ignoring unsupported line magic: {}\n", line));
        }

        let merged = self.program.merge(&stripped.code);
        tracing::debug!(
            "Cell {} declares {:?}",
            count,
            merged
                .declared
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );

        let result = self
            .sync
            .run(&mut self.program, merged, &mut self.runtime)?;

        Ok(match result {
            RoundResult::Executed { output } => report_output(output, count, sink),
            RoundResult::CompileFailed { diagnostics } => {
                sink.stderr(&with_newline(&diagnostics));
                let evalue = diagnostics
                    .lines()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or("compilation failed")
                    .to_string();
                let traceback = diagnostics.lines().map(str::to_string).collect();
                ExecuteReply::error(count, "CompileError", evalue, traceback)
            }
            RoundResult::TimedOut { .. } => {
                let message = format!(
                    "Timeout! No compiler output after {:.1}s. Are you sure Fable is running?",
                    self.sync.poll_policy().worst_case().as_secs_f64()
                );
                sink.stderr(&with_newline(&message));
                ExecuteReply::error(count, "Timeout", message, Vec::new())
            }
        })
    }

    fn run_magic(
        &mut self,
        magic: Magic,
        count: u32,
        sink: &mut dyn OutputSink,
    ) -> Result<ExecuteReply> {
        match magic {
            Magic::ShowPython => {
                let code = format_python(&self.dirs.read_output()?);
                sink.display_code("python", code.trim());
                Ok(ExecuteReply::ok(count))
            }
            Magic::ShowFSharp => {
                let code = self.dirs.read_source()?;
                sink.display_code("fsharp", code.trim());
                Ok(ExecuteReply::ok(count))
            }
            Magic::Reset => {
                sink.stdout("Restarting kernel...\n");
                self.restart()?;
                sink.stdout("Done!\n");
                Ok(ExecuteReply::ok(count))
            }
            Magic::Passthrough(code) => {
                let output = self.runtime.execute(&code, PASSTHROUGH_FILENAME)?;
                Ok(report_output(output, count, sink))
            }
            Magic::Unsupported(name) => {
                let message = format!("Cell magic {} is not supported", name);
                sink.stderr(&with_newline(&message));
                Ok(ExecuteReply::error(count, "UnsupportedMagic", message, Vec::new()))
            }
        }
    }

    /// Forget every declaration and the execution namespace. A runtime that
    /// has died is replaced.
    fn restart(&mut self) -> Result<()> {
        self.dirs.clear_source()?;
        self.program.clear();
        self.runtime.restart()?;
        tracing::info!("Kernel state reset");
        Ok(())
    }

    /// Bind a variable in the execution namespace.
    pub fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.runtime.set_variable(name, value)
    }

    /// Read a variable from the execution namespace.
    pub fn get_variable(&mut self, name: &str) -> Result<Option<Value>> {
        self.runtime.get_variable(name)
    }

    /// Restart keeps the compiler and work directory; a full shutdown stops
    /// the runtime, terminates the compiler and removes a temporary work
    /// directory.
    pub fn shutdown(&mut self, restart: bool) -> Result<()> {
        if restart {
            return self.restart();
        }

        tracing::info!("Shutting down kernel");
        let mut first_error = None;
        let mut record = |result: Result<()>| {
            if let Err(e) = result {
                tracing::warn!("Shutdown step failed: {:?}", e);
                first_error.get_or_insert(e);
            }
        };

        record(self.runtime.shutdown());
        if let Some(mut compiler) = self.compiler.take() {
            record(compiler.terminate());
        }
        record(self.dirs.cleanup());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The committed program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn dirs(&self) -> &KernelDirs {
        &self.dirs
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }
}

/// Stream an execution's output and build its reply.
fn report_output(output: ExecutionOutput, count: u32, sink: &mut dyn OutputSink) -> ExecuteReply {
    if !output.stdout.is_empty() {
        sink.stdout(&output.stdout);
    }
    if !output.stderr.is_empty() {
        sink.stderr(&output.stderr);
    }

    if let Some(fault) = output.fault {
        sink.stderr(&with_newline(&fault.traceback.join("\n")));
        return ExecuteReply::error(count, fault.ename, fault.evalue, fault.traceback);
    }

    if let Some(value) = output.value {
        sink.execute_result(count, &value);
    }
    ExecuteReply::ok(count)
}

/// The error and each of its sources, outermost first.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    std::iter::successors(Some(error), |e| e.source())
        .map(ToString::to_string)
        .collect()
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ExecutionFault;

    #[test]
    fn test_reply_wire_shape() {
        let json = serde_json::to_value(ExecuteReply::ok(3)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["execution_count"], 3);
        assert_eq!(json["payload"], serde_json::json!([]));
        assert_eq!(json["user_expressions"], serde_json::json!({}));

        let json = serde_json::to_value(ExecuteReply::error(4, "Timeout", "late", vec![])).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["ename"], "Timeout");
    }

    #[test]
    fn test_report_output_streams_in_order() {
        let mut sink = CollectingSink::new();
        let output = ExecutionOutput {
            stdout: "2\n".to_string(),
            stderr: String::new(),
            value: Some("None?".to_string()),
            fault: None,
        };

        let reply = report_output(output, 1, &mut sink);

        assert!(reply.is_ok());
        assert_eq!(
            sink.events,
            vec![
                OutputEvent::Stdout("2\n".to_string()),
                OutputEvent::Result {
                    execution_count: 1,
                    value: "None?".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_error_chain_walks_sources() {
        let err = crate::error::Error::artifact(
            "/tmp/work/fable.py",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );

        let chain = error_chain(&err);

        assert_eq!(chain.len(), 2);
        assert!(chain[0].contains("/tmp/work/fable.py"));
        assert_eq!(chain[1], "gone");
    }

    #[test]
    fn test_report_fault() {
        let mut sink = CollectingSink::new();
        let output = ExecutionOutput {
            fault: Some(ExecutionFault {
                ename: "ZeroDivisionError".to_string(),
                evalue: "division by zero".to_string(),
                traceback: vec!["Traceback".to_string(), "ZeroDivisionError".to_string()],
            }),
            ..ExecutionOutput::default()
        };

        let reply = report_output(output, 2, &mut sink);

        assert_eq!(reply.ename(), Some("ZeroDivisionError"));
        assert_eq!(sink.stderr_text(), "Traceback\nZeroDivisionError\n");
        assert!(sink.results().is_empty());
    }
}
