//! Integration tests for compile/execute rounds against a fake compiler.

mod common;

use std::time::Duration;

use common::{RecordingRuntime, UNDEFINED, recording_session, test_config};
use fable_kernel_core::{
    CollectingSink, DeclKey, DeclKind, KernelDirs, KernelSession, OutputEvent, PollPolicy,
};

fn let_key(name: &str) -> DeclKey {
    DeclKey::new(DeclKind::Let, name)
}

#[test]
fn test_declarations_accumulate_in_slot_order() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();

    for cell in ["let x = 10", "let y = 2", "let x = 20"] {
        let reply = session.execute(cell, false, true, &mut sink);
        assert!(reply.is_ok(), "{} -> {:?}\n{}", cell, reply, sink.stderr_text());
    }

    let keys: Vec<_> = session.program().keys().cloned().collect();
    assert_eq!(keys, vec![let_key("x"), let_key("y")]);
    assert_eq!(session.program().get(&let_key("x")), Some("let x = 20"));
    assert_eq!(
        session.dirs().read_source().unwrap(),
        "module Fable.Jupyter\nlet x = 20\nlet y = 2\ndo ()"
    );
    assert_eq!(
        session.runtime().last_code(),
        Some("x = 20\ny = 2\nNone\n")
    );
    assert_eq!(session.execution_count(), 3);
}

#[test]
fn test_single_expression_is_printed() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();

    let reply = session.execute("1 + 1", false, true, &mut sink);

    assert!(reply.is_ok());
    assert!(session.program().is_empty());
    assert!(
        session
            .dirs()
            .read_source()
            .unwrap()
            .ends_with("printfn \"%A\" (1 + 1)")
    );
    assert_eq!(session.runtime().last_code(), Some("print(1 + 1)\n"));
}

#[test]
fn test_compile_failure_rolls_back() {
    let (mut session, fable) = recording_session();
    let mut sink = CollectingSink::new();

    assert!(session.execute("let x = 1", false, true, &mut sink).is_ok());
    let before = session.program().clone();
    let executions = session.runtime().executed.len();

    let cell = format!("let y = {}\ny", UNDEFINED);
    let mut sink = CollectingSink::new();
    let reply = session.execute(&cell, false, true, &mut sink);

    assert_eq!(reply.ename(), Some("CompileError"));
    assert!(sink.stderr_text().contains("FS0039"));
    assert_eq!(session.program(), &before);
    assert_eq!(session.runtime().executed.len(), executions);
    assert_eq!(fable.compiles(), 2);

    // The failed declaration is gone from the next round's source.
    assert!(session.execute("let z = 3", false, true, &mut sink).is_ok());
    let source = session.dirs().read_source().unwrap();
    assert!(!source.contains(UNDEFINED), "{}", source);
    assert!(source.contains("let x = 1\nlet z = 3"));
}

#[test]
fn test_identical_resubmission_is_idempotent() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();

    assert!(session.execute("let x = 1", false, true, &mut sink).is_ok());
    let once = session.program().clone();
    let source_once = session.dirs().read_source().unwrap();

    assert!(session.execute("let x = 1", false, true, &mut sink).is_ok());
    assert_eq!(session.program(), &once);
    assert_eq!(session.dirs().read_source().unwrap(), source_once);
}

#[test]
fn test_failed_shutdown_step_still_removes_work_dir() {
    let config = test_config(PollPolicy::fixed(3, Duration::from_millis(10)));
    let dirs = KernelDirs::temporary().unwrap();
    let work_dir = dirs.work_dir.clone();
    let runtime = RecordingRuntime {
        fail_shutdown: true,
        ..RecordingRuntime::default()
    };
    let mut session = KernelSession::with_runtime(config, dirs, runtime, None).unwrap();
    assert!(work_dir.exists());

    let result = session.shutdown(false);

    assert!(matches!(result, Err(fable_kernel_core::Error::Runtime(_))));
    assert!(!work_dir.exists());
}

#[test]
fn test_timeout_without_compiler() {
    let config = test_config(PollPolicy::fixed(3, Duration::from_millis(10)));
    let dirs = KernelDirs::temporary().unwrap();
    let mut session =
        KernelSession::with_runtime(config, dirs, RecordingRuntime::default(), None).unwrap();
    let mut sink = CollectingSink::new();

    let reply = session.execute("let x = 1", false, true, &mut sink);

    assert_eq!(reply.ename(), Some("Timeout"));
    assert!(sink.stderr_text().starts_with("Timeout!"));
    assert!(session.program().is_empty());
    assert!(session.runtime().executed.is_empty());

    // The session is still usable afterwards.
    assert!(session.execute("%fsharp", false, true, &mut sink).is_ok());
}

#[test]
fn test_fsharp_magic_shows_source() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();
    session.execute("let x = 1", false, true, &mut sink);

    let mut sink = CollectingSink::new();
    let reply = session.execute("%fsharp", false, true, &mut sink);

    assert!(reply.is_ok());
    assert_eq!(
        sink.events,
        vec![OutputEvent::Code {
            language: "fsharp".to_string(),
            source: "module Fable.Jupyter\nlet x = 1\ndo ()".to_string(),
        }]
    );
}

#[test]
fn test_reset_forgets_program_and_namespace() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();
    session.execute("let x = 1", false, true, &mut sink);
    session
        .set_variable("answer", serde_json::json!(42))
        .unwrap();

    let mut sink = CollectingSink::new();
    let reply = session.execute("%reset", false, true, &mut sink);

    assert!(reply.is_ok());
    assert_eq!(sink.stdout_text(), "Restarting kernel...\nDone!\n");
    assert!(session.program().is_empty());
    assert_eq!(session.dirs().read_source().unwrap(), "");
    assert_eq!(session.runtime().resets, 1);
    assert_eq!(session.get_variable("answer").unwrap(), None);
}

#[test]
fn test_restart_keeps_session_usable() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();
    session.execute("let x = 1", false, true, &mut sink);

    session.shutdown(true).unwrap();
    assert!(session.program().is_empty());

    let reply = session.execute("let y = 2", false, true, &mut sink);
    assert!(reply.is_ok());
    assert_eq!(session.program().len(), 1);
}

#[test]
fn test_python_passthrough_skips_compiler() {
    let (mut session, fable) = recording_session();
    let mut sink = CollectingSink::new();

    let reply = session.execute("%%python\nimport math\nmath.pi", false, true, &mut sink);

    assert!(reply.is_ok());
    assert_eq!(
        session.runtime().executed,
        vec![("import math\nmath.pi".to_string(), "<cell>".to_string())]
    );
    assert_eq!(fable.compiles(), 0);
}

#[test]
fn test_unsupported_cell_magic() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();

    let reply = session.execute("%%timeit\n1 + 1", false, true, &mut sink);

    assert_eq!(reply.ename(), Some("UnsupportedMagic"));
    assert!(sink.stderr_text().contains("%%timeit"));
}

#[test]
fn test_stray_line_magic_is_reported_and_removed() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();

    let reply = session.execute("%matplotlib inline\nlet x = 1", false, true, &mut sink);

    assert!(reply.is_ok());
    assert!(sink.stderr_text().contains("%matplotlib inline"));
    assert!(!session.dirs().read_source().unwrap().contains('%'));
}

#[test]
fn test_silent_execution() {
    let (mut session, _fable) = recording_session();
    let mut sink = CollectingSink::new();

    let reply = session.execute("%fsharp", true, false, &mut sink);

    assert!(reply.is_ok());
    assert_eq!(reply.execution_count(), 0);
    assert!(sink.events.is_empty());

    let reply = session.execute("%fsharp", false, false, &mut sink);
    assert_eq!(reply.execution_count(), 0);
    let reply = session.execute("%fsharp", false, true, &mut sink);
    assert_eq!(reply.execution_count(), 1);
}
