//! Kernel magics.
//!
//! A cell is checked for magics before it reaches the accumulator:
//!
//! | Cell                 | Effect                                          |
//! |----------------------|-------------------------------------------------|
//! | `%python`            | show the last emitted Python                    |
//! | `%fsharp`            | show the current F# source artifact             |
//! | `%reset...`          | forget every declaration and the namespace      |
//! | `%%python` + body    | run the body as Python, skipping the compiler   |
//! | other `%%name`       | unsupported                                     |
//!
//! Anything else is F#. Stray `%` lines inside an F# cell are removed.

/// A recognized cell magic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Magic {
    ShowPython,
    ShowFSharp,
    Reset,
    /// Python source to run directly.
    Passthrough(String),
    /// A `%%` cell magic this kernel does not implement.
    Unsupported(String),
}

/// Recognize a whole-cell magic.
pub fn parse(code: &str) -> Option<Magic> {
    let trimmed = code.trim();
    match trimmed {
        "%python" => return Some(Magic::ShowPython),
        "%fsharp" => return Some(Magic::ShowFSharp),
        _ => {}
    }
    if trimmed.starts_with("%reset") {
        return Some(Magic::Reset);
    }

    let first = trimmed.lines().next()?;
    let name = first.strip_prefix("%%")?.split_whitespace().next().unwrap_or("");
    if name == "python" {
        let (_, body) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        return Some(Magic::Passthrough(body.to_string()));
    }
    Some(Magic::Unsupported(format!("%%{}", name)))
}

/// An F# cell with its line magics removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StrippedCell {
    pub code: String,
    /// The removed lines, in order.
    pub ignored: Vec<String>,
}

/// Remove lines starting with `%` from an F# cell.
pub fn strip_line_magics(code: &str) -> StrippedCell {
    let (ignored, kept): (Vec<&str>, Vec<&str>) =
        code.lines().partition(|line| line.starts_with('%'));
    StrippedCell {
        code: kept.join("\n"),
        ignored: ignored.into_iter().map(str::to_string).collect(),
    }
}
