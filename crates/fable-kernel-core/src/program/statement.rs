//! Statement splitting and declaration classification.
//!
//! A cell is split wherever a line starts with a word character or `[`, so
//! indented continuation lines and multi-line literals stay with the statement
//! they belong to. Each statement is then matched against the declaration
//! grammar; anything that does not match is a transient expression.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Declaration grammar. Alternatives are tried left to right.
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(let)\s+(?P<let>\w+)",
        r"|^(let)\s+``(?P<ticked>[\w ]+)``",
        r"|^(type)\s+(?P<type>\w*)[\s\(]",
        r"|^(open)\s+(?P<open>[\w.]+)",
        r"|^\[<(?P<attr>.*)>\]",
    ))
    .expect("declaration grammar is a valid regex")
});

/// Capture group names in grammar order, with the kind each one declares.
const GROUPS: [(&str, DeclKind); 5] = [
    ("let", DeclKind::Let),
    ("ticked", DeclKind::Let),
    ("type", DeclKind::Type),
    ("open", DeclKind::Open),
    ("attr", DeclKind::Attribute),
];

/// What a declaration introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclKind {
    /// `let name ...` or ``let ``name`` ...``
    Let,
    /// `type Name ...`
    Type,
    /// `open Some.Module`
    Open,
    /// A bracketed attribute with no declaration after it.
    Attribute,
}

impl DeclKind {
    /// Keyword used in the key's display form.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Let => "let",
            Self::Type => "type",
            Self::Open => "open",
            Self::Attribute => "attr",
        }
    }
}

/// Identity of a declaration. Two declarations with equal keys are
/// redefinitions of each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclKey {
    pub kind: DeclKind,
    pub name: String,
}

impl DeclKey {
    pub fn new(kind: DeclKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for DeclKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.keyword(), self.name)
    }
}

/// A classified statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Durable program element, merged into the accumulated program.
    Declaration { key: DeclKey, text: String },
    /// Transient code, compiled once and then dropped.
    Expression { text: String },
}

impl Statement {
    pub fn text(&self) -> &str {
        match self {
            Self::Declaration { text, .. } | Self::Expression { text } => text,
        }
    }
}

/// Split a cell into statements.
///
/// A new statement begins after every newline that is immediately followed
/// by a word character or `[`. Leading newlines and trailing whitespace are
/// stripped from each piece and empty pieces are dropped. Statements made only
/// of attributes are folded into the statement that follows them.
pub fn split_statements(cell: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (index, _) in cell.match_indices('\n') {
        let next = cell[index + 1..].chars().next();
        if next.is_some_and(starts_statement) {
            pieces.push(&cell[start..index]);
            start = index + 1;
        }
    }
    pieces.push(&cell[start..]);

    let mut statements: Vec<String> = Vec::new();
    let mut pending_attributes: Option<String> = None;

    for piece in pieces {
        let piece = piece.trim_start_matches('\n').trim_end();
        if piece.is_empty() {
            continue;
        }

        let joined = match pending_attributes.take() {
            Some(attributes) => format!("{}\n{}", attributes, piece),
            None => piece.to_string(),
        };

        if is_attribute_only(&joined) {
            pending_attributes = Some(joined);
        } else {
            statements.push(joined);
        }
    }

    if let Some(attributes) = pending_attributes {
        statements.push(attributes);
    }

    statements
}

/// Classify one statement.
pub fn classify(statement: &str) -> Statement {
    let (attributes, rest) = split_attributes(statement);

    let key = if attributes.is_empty() || rest.is_empty() {
        match_declaration(statement)
    } else {
        match_declaration(rest).filter(|key| key.kind != DeclKind::Attribute)
    };

    match key {
        Some(key) => Statement::Declaration {
            key,
            text: statement.to_string(),
        },
        None => Statement::Expression {
            text: statement.to_string(),
        },
    }
}

/// Apply the declaration grammar to the start of `text`.
///
/// A match whose captured name is empty (`type (`) is not a declaration.
fn match_declaration(text: &str) -> Option<DeclKey> {
    let captures = DECLARATION.captures(text)?;
    GROUPS.iter().find_map(|(group, kind)| {
        captures
            .name(group)
            .map(|m| m.as_str())
            .filter(|name| !name.is_empty())
            .map(|name| DeclKey::new(*kind, name))
    })
}

/// Split leading `[<...>]` attribute groups from the rest of a statement.
///
/// Each attribute group ends at the last `>]` on its line, the same extent the
/// grammar's greedy `attr` alternative matches.
fn split_attributes(statement: &str) -> (&str, &str) {
    let mut rest = statement;

    loop {
        let trimmed = rest.trim_start();
        if !trimmed.starts_with("[<") {
            break;
        }
        let line_end = trimmed.find('\n').unwrap_or(trimmed.len());
        match trimmed[..line_end].rfind(">]") {
            Some(close) if close >= 2 => rest = &trimmed[close + 2..],
            _ => break,
        }
    }

    let attributes = &statement[..statement.len() - rest.len()];
    (attributes.trim_end(), rest.trim_start())
}

fn is_attribute_only(statement: &str) -> bool {
    let (attributes, rest) = split_attributes(statement);
    !attributes.is_empty() && rest.is_empty()
}

fn starts_statement(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '['
}
