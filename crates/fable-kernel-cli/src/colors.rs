//! Terminal color constants and utilities for console output.

use std::io::{self, IsTerminal, Write};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";

/// Wrap `text` in `color` when stderr is a terminal.
pub fn paint_stderr(color: &str, text: &str) -> String {
    if io::stderr().is_terminal() {
        format!("{}{}{}", color, text, RESET)
    } else {
        text.to_string()
    }
}

/// Flush stdout to ensure a prompt without a trailing newline is visible.
#[inline]
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
