//! FILENAME: parser/src/error.rs
//! PURPOSE: The two disjoint error axes of the formula layer (spec.md §7).
//! CONTEXT: `ParseError` is an exception-class failure — a formula that
//! never became a usable AST. `FormulaError` is a value-level result:
//! a legitimate thing a cell can hold and that propagates through
//! arithmetic like any other value. Keeping them as distinct types (rather
//! than one big enum) stops evaluation code from accidentally treating a
//! `#DIV/0!` as something to `?`-propagate out of the whole operation.

use thiserror::Error;

/// A formula failed to parse. Surfaced to callers as `FormulaException` in
/// spec terms.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("formula syntax error: {0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError(message.into())
    }
}

/// A value-level error a cell or formula evaluation can produce. These are
/// not `std::error::Error` failures: they're cell *contents*, propagated
/// through arithmetic per spec.md §4.2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FormulaError {
    /// Reference to a cell that was deleted by a row/col deletion.
    Ref,
    /// A referenced cell's content isn't a finite number.
    Value,
    /// Division by (near) zero, or an arithmetic overflow to infinity/NaN.
    Div0,
}

impl FormulaError {
    pub fn label(&self) -> &'static str {
        match self {
            FormulaError::Ref => "#!REF",
            FormulaError::Value => "#VALUE!",
            FormulaError::Div0 => "#DIV/0!",
        }
    }
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
