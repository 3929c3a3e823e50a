//! FILENAME: parser/src/tests.rs
//! PURPOSE: Consolidated cross-module tests for the parser crate —
//! scenarios that exercise lexing, parsing, formatting, and rewriting
//! together rather than any one module in isolation.

use crate::formula::Formula;
use crate::position::Position;
use crate::{FormulaError, SheetLookup};
use std::collections::HashMap;

struct FakeSheet {
    values: HashMap<Position, Result<f64, FormulaError>>,
}

impl FakeSheet {
    fn new() -> Self {
        FakeSheet { values: HashMap::new() }
    }

    fn with(mut self, pos: Position, value: f64) -> Self {
        self.values.insert(pos, Ok(value));
        self
    }
}

impl SheetLookup for FakeSheet {
    fn resolve(&mut self, pos: Position) -> Result<f64, FormulaError> {
        self.values.get(&pos).cloned().unwrap_or(Ok(0.0))
    }
}

// ========================================
// Parse -> evaluate round trips
// ========================================

#[test]
fn full_pipeline_arithmetic_precedence() {
    let formula = Formula::parse("2+3*4-1").unwrap();
    let mut sheet = FakeSheet::new();
    assert_eq!(formula.evaluate(&mut sheet), Ok(13.0));
}

#[test]
fn full_pipeline_cell_references() {
    let formula = Formula::parse("A1*B1+C1").unwrap();
    let mut sheet = FakeSheet::new()
        .with(Position::new(0, 0), 2.0)
        .with(Position::new(0, 1), 3.0)
        .with(Position::new(0, 2), 1.0);
    assert_eq!(formula.evaluate(&mut sheet), Ok(7.0));
}

// ========================================
// Parse -> format round trips (canonical parenthesization)
// ========================================

#[test]
fn format_drops_all_redundant_parens() {
    for (input, expected) in [
        ("(1)", "1"),
        ("((1))", "1"),
        ("(A1)+(B1)", "A1+B1"),
        ("(A1+B1)", "A1+B1"),
        ("(1+2)*3", "(1+2)*3"),
        ("1*(2+3)", "1*(2+3)"),
        ("1*(2*3)", "1*2*3"),
        ("(1-2)-3", "1-2-3"),
        ("1-(2-3)", "1-(2-3)"),
        ("-(1*2)", "-1*2"),
        ("-(1+2)", "-(1+2)"),
    ] {
        let formula = Formula::parse(input).unwrap();
        assert_eq!(formula.get_expression(), expected, "formatting {input}");
    }
}

// ========================================
// Parse -> rewrite -> format round trips
// ========================================

#[test]
fn insert_row_shifts_reference_and_reformats() {
    let mut formula = Formula::parse("A1+A2").unwrap();
    formula.handle_inserted_rows(1, 1).unwrap();
    assert_eq!(formula.get_expression(), "A1+A3");
}

#[test]
fn delete_row_band_renders_literal_ref_marker() {
    let mut formula = Formula::parse("A5").unwrap();
    formula.handle_deleted_rows(4, 1);
    assert_eq!(formula.get_expression(), "#!REF");
}

#[test]
fn delete_row_band_mixes_deleted_and_renumbered_references() {
    let mut formula = Formula::parse("A1+A5+A10").unwrap();
    let result = formula.handle_deleted_rows(4, 2);
    assert_eq!(result, crate::HandlingResult::ReferencesChanged);
    assert_eq!(formula.get_expression(), "A1+#!REF+A8");
}

// ========================================
// Syntax errors
// ========================================

#[test]
fn malformed_formulas_are_rejected() {
    for bad in ["", "()", "1++", "(1", "1)", "1 2"] {
        assert!(Formula::parse(bad).is_err(), "expected error for {bad:?}");
    }
}

#[test]
fn malformed_cell_label_parses_to_sentinel_not_syntax_error() {
    // A letter run with no trailing digits never lexes as Cell at all,
    // so this is a syntax error, not a successfully-parsed sentinel.
    assert!(Formula::parse("ABC").is_err());
}

#[test]
fn invalid_cell_references_are_rejected_at_parse_time() {
    for bad in [
        "X0",                             // row 0 underflows to -1
        "ABCD1",                          // column wider than 3 letters
        "A123456",                        // row past MAX_ROWS
        "ABCDEFGHIJKLMNOPQRS1234567890",  // both checks at once
        "XFD16385",                       // one row past the last addressable row
        "XFE16384",                       // one column past the last addressable column
        "R2D2",                           // lexes as two cells with no operator between
    ] {
        assert!(Formula::parse(bad).is_err(), "expected error for {bad:?}");
    }
}
