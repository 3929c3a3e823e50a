//! FILENAME: engine/src/error.rs
//! PURPOSE: The exception-class failures a `Sheet` operation can raise.
//! CONTEXT: These are distinct from `parser::FormulaError`, which is a
//! legitimate cell *value* (`#VALUE!`, `#DIV/0!`, `#REF!`). Everything
//! here aborts the call that raised it and leaves the sheet's invariants
//! intact — callers never need to inspect partial state after an `Err`.

use parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SheetError {
    #[error("position is out of the addressable grid")]
    InvalidPosition,

    #[error("formula syntax error: {0}")]
    FormulaException(#[from] ParseError),

    #[error("formula would create a circular dependency")]
    CircularDependency,

    #[error("operation would grow the sheet past its addressable size")]
    TableTooBig,
}
