//! Error types.
//!
//! Two layers: [`SheetError`] and [`ParseFormulaError`] are *operation*
//! errors returned from fallible calls, while [`FormulaError`] is a *value*
//! that a cell can hold after evaluation (`#REF!`, `#VALUE!`, `#DIV/0!`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Evaluation-time error carried inside a cell value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum FormulaError {
    /// A formula references an invalid position.
    #[error("#REF!")]
    Ref,
    /// A referenced cell's text cannot be read as a number.
    #[error("#VALUE!")]
    Value,
    /// Division by zero, or any non-finite arithmetic result.
    #[error("#DIV/0!")]
    Div0,
}

/// Why an expression failed to parse.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseFormulaError {
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("malformed number `{0}`")]
    InvalidNumber(String),
    #[error("cell reference `{0}` is out of range")]
    InvalidCellRef(String),
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("missing closing parenthesis")]
    MissingParen,
    #[error("trailing input after expression")]
    TrailingInput,
    #[error("empty expression")]
    Empty,
}

/// Error returned by the sheet's public operations.
///
/// Every variant is recoverable: a failed call leaves the sheet exactly as
/// it was, with no partial writes, stray graph edges, or cleared caches.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetError {
    /// The position's coordinates are out of range.
    #[error("cell position is out of range")]
    InvalidPosition,
    /// The text is a formula that does not parse.
    #[error("invalid formula: {0}")]
    Formula(#[from] ParseFormulaError),
    /// Accepting the write would create a cycle in the dependency graph.
    #[error("write would create a circular dependency")]
    CircularDependency,
}
