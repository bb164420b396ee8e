//! The accumulated whole-program image.

use indexmap::IndexMap;

use super::statement::{DeclKey, Statement, classify, split_statements};

/// Module header every compilation unit starts with.
pub const MODULE_HEADER: &str = "module Fable.Jupyter";

/// Expression used when a cell has no expression of its own.
pub const NO_OP_EXPRESSION: &str = "do ()";

/// Substring that marks an expression as printing its own output.
const SELF_PRINTING: &str = "printf";

/// Ordered, deduplicated set of durable declarations.
///
/// Declarations are keyed by [`DeclKey`]. Redefining a key replaces its text
/// but keeps the slot it was first inserted at, so editing `x` never reorders
/// the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    header: String,
    declarations: IndexMap<DeclKey, String>,
}

/// Result of merging one cell into a program.
///
/// Nothing in here is committed yet: `candidate` replaces the accumulated
/// program only once the compiler accepts it.
#[derive(Debug, Clone)]
pub struct MergedCell {
    /// The program as it would be with this cell's declarations applied.
    pub candidate: Program,

    /// Keys declared by this cell, in cell order.
    pub declared: Vec<DeclKey>,

    /// Transient expressions to append for this compilation only.
    pub expressions: Vec<String>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// Empty program with the standard module header.
    pub fn new() -> Self {
        Self::with_header(MODULE_HEADER)
    }

    /// Empty program with a custom header line.
    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            declarations: IndexMap::new(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Number of declarations (the header is not counted).
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Text of the declaration with the given key.
    pub fn get(&self, key: &DeclKey) -> Option<&str> {
        self.declarations.get(key).map(String::as_str)
    }

    /// Keys in program order.
    pub fn keys(&self) -> impl Iterator<Item = &DeclKey> {
        self.declarations.keys()
    }

    /// Declarations in program order.
    pub fn declarations(&self) -> impl Iterator<Item = (&DeclKey, &str)> {
        self.declarations.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Insert or replace a declaration. Replacement keeps the original slot.
    pub fn declare(&mut self, key: DeclKey, text: impl Into<String>) {
        self.declarations.insert(key, text.into());
    }

    /// Drop every declaration, keeping the header.
    pub fn clear(&mut self) {
        self.declarations.clear();
    }

    /// Merge a cell into a copy of this program.
    ///
    /// Never fails: statements that do not look like declarations become
    /// expressions.
    pub fn merge(&self, cell: &str) -> MergedCell {
        let mut candidate = self.clone();
        let mut declared = Vec::new();
        let mut expressions = Vec::new();

        for statement in split_statements(cell) {
            match classify(&statement) {
                Statement::Declaration { key, text } => {
                    candidate.declare(key.clone(), text);
                    declared.push(key);
                }
                Statement::Expression { text } => expressions.push(text),
            }
        }

        let expressions = finish_expressions(expressions, declared.is_empty());

        MergedCell {
            candidate,
            declared,
            expressions,
        }
    }

    /// Render the full compilation unit: header, declarations in slot order,
    /// then the given expressions.
    pub fn render(&self, expressions: &[String]) -> String {
        let mut lines = Vec::with_capacity(self.declarations.len() + 1);
        lines.push(self.header.as_str());
        lines.extend(self.declarations.values().map(String::as_str));

        let mut source = lines.join("\n");
        source.push('\n');
        source.push_str(&expressions.join("\n"));
        source
    }
}

/// Apply the auto-print policy.
///
/// A lone expression in a cell without declarations is printed unless it
/// already prints. A cell without expressions gets a no-op so the unit still
/// ends in a top-level action.
fn finish_expressions(expressions: Vec<String>, no_declarations: bool) -> Vec<String> {
    match expressions.as_slice() {
        [] => vec![NO_OP_EXPRESSION.to_string()],
        [only] if no_declarations && !only.contains(SELF_PRINTING) => {
            vec![format!("printfn \"%A\" ({})", only)]
        }
        _ => expressions,
    }
}

impl MergedCell {
    /// Render the candidate program with this cell's expressions.
    pub fn render(&self) -> String {
        self.candidate.render(&self.expressions)
    }
}
