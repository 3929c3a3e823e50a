//! FILENAME: engine/src/cell.rs
//! PURPOSE: Defines the inner-cell variants a grid slot can hold, and the
//! public `CellValue` view returned to callers.
//! CONTEXT: A `CellHolder` (defined alongside here) owns at most one of
//! these variants plus its `used_by` back-edges. Literal and Error cells
//! are self-contained; a `FormulaCell` additionally caches its last
//! computed result because recomputing it requires walking the sheet's
//! dependency graph, which only `Sheet` can do.

use parser::{Formula, FormulaError, Position};
use serde::{Deserialize, Serialize};

/// What `Sheet::get_value` hands back for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(FormulaError),
}

/// A cell whose text is data, not a formula. A leading `'` escapes the
/// text from numeric coercion — the stored text keeps the quote, the
/// displayed value strips it.
#[derive(Debug, Clone)]
pub struct LiteralCell {
    text: String,
    numeric: Option<f64>,
}

impl LiteralCell {
    pub fn new(text: String) -> Self {
        let numeric = if text.starts_with('\'') {
            None
        } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
            None
        } else {
            text.parse::<f64>().ok().filter(|n| n.is_finite())
        };
        LiteralCell { text, numeric }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> CellValue {
        if let Some(rest) = self.text.strip_prefix('\'') {
            return CellValue::Text(rest.to_string());
        }
        match self.numeric {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(self.text.clone()),
        }
    }
}

/// A cell holding one of the three cell-value-level errors, set directly
/// (not through formula evaluation) — currently only reached when a
/// formula's own literal operand over/underflows at parse time.
#[derive(Debug, Clone)]
pub struct ErrorCell {
    text: String,
    error: FormulaError,
}

impl ErrorCell {
    pub fn new(text: String, error: FormulaError) -> Self {
        ErrorCell { text, error }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> CellValue {
        CellValue::Error(self.error)
    }
}

/// A formula cell: its AST (via `parser::Formula`), plus a memoized
/// result and the flag that says whether that memo is stale.
#[derive(Debug, Clone)]
pub struct FormulaCell {
    formula: Formula,
    cached: Result<f64, FormulaError>,
    invalid: bool,
}

impl FormulaCell {
    pub fn new(formula: Formula, initial: Result<f64, FormulaError>) -> Self {
        FormulaCell { formula, cached: initial, invalid: false }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn formula_mut(&mut self) -> &mut Formula {
        &mut self.formula
    }

    pub fn text(&self) -> String {
        format!("={}", self.formula.get_expression())
    }

    pub fn value(&self) -> CellValue {
        match self.cached {
            Ok(n) => CellValue::Number(n),
            Err(e) => CellValue::Error(e),
        }
    }

    pub fn cached(&self) -> Result<f64, FormulaError> {
        self.cached
    }

    pub fn set_cached(&mut self, value: Result<f64, FormulaError>) {
        self.cached = value;
        self.invalid = false;
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    /// True when the cached result currently holds a value-level error.
    /// Used by the cycle-check short-circuit.
    pub fn holds_error(&self) -> bool {
        self.cached.is_err()
    }
}

/// The three non-empty shapes a grid slot can hold.
#[derive(Debug, Clone)]
pub enum CellKind {
    Literal(LiteralCell),
    Error(ErrorCell),
    Formula(FormulaCell),
}

/// One slot in the grid: at most one `CellKind`, plus the back-edges of
/// every formula holder whose AST references this position. `kind` is
/// `None` both for a never-written slot and for a slot kept alive only
/// to host a back-edge target.
#[derive(Debug, Clone, Default)]
pub struct CellHolder {
    kind: Option<CellKind>,
    pub used_by: Vec<Position>,
}

impl CellHolder {
    pub fn new() -> Self {
        CellHolder { kind: None, used_by: Vec::new() }
    }

    pub fn kind(&self) -> Option<&CellKind> {
        self.kind.as_ref()
    }

    pub fn kind_mut(&mut self) -> Option<&mut CellKind> {
        self.kind.as_mut()
    }

    pub fn set_kind(&mut self, kind: Option<CellKind>) {
        self.kind = kind;
    }

    /// Raw cell-value snapshot, no recompute. A formula cell's stale
    /// cache is returned as-is — recomputation is `Sheet`'s job, since it
    /// may need to walk into other holders.
    pub fn value(&self) -> CellValue {
        match &self.kind {
            None => CellValue::Number(0.0),
            Some(CellKind::Literal(l)) => l.value(),
            Some(CellKind::Error(e)) => e.value(),
            Some(CellKind::Formula(f)) => f.value(),
        }
    }

    pub fn text(&self) -> String {
        match &self.kind {
            None => String::new(),
            Some(CellKind::Literal(l)) => l.text().to_string(),
            Some(CellKind::Error(e)) => e.text().to_string(),
            Some(CellKind::Formula(f)) => f.text(),
        }
    }

    /// The text last used to build this cell, for `SetCell`'s
    /// no-op short-circuit. Empty-holder text is the empty string, same
    /// as `text()`.
    pub fn last_call(&self) -> String {
        self.text()
    }

    pub fn referenced_cells(&self) -> Vec<Position> {
        match &self.kind {
            Some(CellKind::Formula(f)) => f.formula().get_referenced_cells().to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn has_formula(&self) -> bool {
        matches!(self.kind, Some(CellKind::Formula(_)))
    }

    pub fn is_invalid(&self) -> bool {
        match &self.kind {
            Some(CellKind::Formula(f)) => f.is_invalid(),
            _ => false,
        }
    }

    pub fn invalidate(&mut self) {
        if let Some(CellKind::Formula(f)) = &mut self.kind {
            f.invalidate();
        }
    }

    pub fn formula_mut(&mut self) -> Option<&mut FormulaCell> {
        match &mut self.kind {
            Some(CellKind::Formula(f)) => Some(f),
            _ => None,
        }
    }

    pub fn formula(&self) -> Option<&FormulaCell> {
        match &self.kind {
            Some(CellKind::Formula(f)) => Some(f),
            _ => None,
        }
    }
}
