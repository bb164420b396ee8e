//! Incremental program reconstruction.
//!
//! Cells arrive one at a time, but the compiler only ever sees whole
//! programs. This module keeps the durable part of everything submitted so
//! far and decides, per statement, whether it joins that image or is
//! compiled once and forgotten.
//!
//! ```text
//! cell text ──► split_statements ──► classify ──┬── Declaration ──► Program (keyed, slot-stable)
//!                                               └── Expression  ──► this round only
//! ```

mod accumulator;
mod statement;

pub use accumulator::{MODULE_HEADER, MergedCell, NO_OP_EXPRESSION, Program};
pub use statement::{DeclKey, DeclKind, Statement, classify, split_statements};
