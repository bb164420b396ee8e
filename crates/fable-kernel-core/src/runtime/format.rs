//! Optional pretty-printing of emitted Python for `%python`.

use std::io::Write;
use std::process::{Command, Stdio};

/// Format `source` with `black` when it is on PATH.
///
/// Any failure (formatter missing, crash, syntax it rejects) returns the
/// source unchanged.
pub fn format_python(source: &str) -> String {
    let Ok(black) = which::which("black") else {
        return source.to_string();
    };

    let child = Command::new(&black)
        .args(["-q", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!("Failed to run black: {}", e);
            return source.to_string();
        }
    };

    if let Some(mut stdin) = child.stdin.take()
        && let Err(e) = stdin.write_all(source.as_bytes())
    {
        tracing::debug!("Failed to pipe source to black: {}", e);
    }

    match child.wait_with_output() {
        Ok(output) if output.status.success() => String::from_utf8(output.stdout)
            .unwrap_or_else(|_| source.to_string()),
        Ok(output) => {
            tracing::debug!("black exited with {}", output.status);
            source.to_string()
        }
        Err(e) => {
            tracing::debug!("Failed to wait for black: {}", e);
            source.to_string()
        }
    }
}
