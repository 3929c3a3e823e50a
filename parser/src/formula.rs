//! FILENAME: parser/src/formula.rs
//! PURPOSE: The public façade over one parsed formula — parsing, numeric
//! evaluation against a sheet, canonical text reconstruction, and
//! reference bookkeeping for structural edits.
//! CONTEXT: `engine::Sheet` holds one `Formula` per formula cell. It
//! never touches the AST directly; everything it needs goes through this
//! type, which implements `SheetLookup` for its caller rather than the
//! other way around — the engine supplies cell values, this crate stays
//! ignorant of how a sheet stores them.

use crate::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::error::{FormulaError, ParseError};
use crate::formatter;
use crate::parser::Parser;
use crate::position::Position;
use crate::rewrite::{self, HandlingResult, Overflow};

/// What a `Formula` needs from whatever is hosting it, to resolve a cell
/// reference to a number. Implemented by `engine::Sheet`. Recomputing a
/// referenced formula cell is allowed to have side effects (updating that
/// cell's own cache), hence `&mut self`.
pub trait SheetLookup {
    fn resolve(&mut self, pos: Position) -> Result<f64, FormulaError>;
}

/// A parsed formula: its AST plus the distinct cell positions it
/// references, in first-occurrence order.
#[derive(Debug, Clone)]
pub struct Formula {
    ast: Expression,
    referenced_cells: Vec<Position>,
}

impl Formula {
    /// Parses `text` (the formula body, without a leading `=`) and
    /// computes its deduplicated reference list.
    pub fn parse(text: &str) -> Result<Formula, ParseError> {
        let ast = Parser::parse(text)?;
        let referenced_cells = collect_references(&ast);
        Ok(Formula { ast, referenced_cells })
    }

    /// Numerically evaluates this formula against `sheet`.
    pub fn evaluate<S: SheetLookup>(&self, sheet: &mut S) -> Result<f64, FormulaError> {
        eval(&self.ast, sheet)
    }

    /// Canonical formula text, minimally parenthesized.
    pub fn get_expression(&self) -> String {
        formatter::canonical(&self.ast)
    }

    /// The distinct positions this formula references, in the order they
    /// first appear in the source text. Sentinel positions (deleted
    /// references, parse failures) are never included.
    pub fn get_referenced_cells(&self) -> &[Position] {
        &self.referenced_cells
    }

    /// True if any literal in this formula is outside `f64`'s finite
    /// range. Rust's float parser saturates such a literal to infinity
    /// rather than raising a parse error, so this stands in for the
    /// numeric-overflow exception a hosting sheet is expected to turn
    /// into a stored `#DIV/0!` error cell instead of a live formula.
    pub fn has_overflowed_literal(&self) -> bool {
        fn walk(expr: &Expression) -> bool {
            match expr {
                Expression::Literal(n) => !n.is_finite(),
                Expression::Cell(_) => false,
                Expression::Unary(_, inner) | Expression::Parens(inner) => walk(inner),
                Expression::Binary(_, lhs, rhs) => walk(lhs) || walk(rhs),
            }
        }
        walk(&self.ast)
    }

    pub fn handle_inserted_rows(&mut self, before: i32, count: i32) -> Result<HandlingResult, Overflow> {
        let result = rewrite::handle_inserted_rows(&mut self.ast, before, count)?;
        if result != HandlingResult::NothingChanged {
            self.referenced_cells = collect_references(&self.ast);
        }
        Ok(result)
    }

    pub fn handle_inserted_cols(&mut self, before: i32, count: i32) -> Result<HandlingResult, Overflow> {
        let result = rewrite::handle_inserted_cols(&mut self.ast, before, count)?;
        if result != HandlingResult::NothingChanged {
            self.referenced_cells = collect_references(&self.ast);
        }
        Ok(result)
    }

    pub fn handle_deleted_rows(&mut self, first: i32, count: i32) -> HandlingResult {
        let result = rewrite::handle_deleted_rows(&mut self.ast, first, count);
        if result != HandlingResult::NothingChanged {
            self.referenced_cells = collect_references(&self.ast);
        }
        result
    }

    pub fn handle_deleted_cols(&mut self, first: i32, count: i32) -> HandlingResult {
        let result = rewrite::handle_deleted_cols(&mut self.ast, first, count);
        if result != HandlingResult::NothingChanged {
            self.referenced_cells = collect_references(&self.ast);
        }
        result
    }
}

/// Walks the AST collecting valid, distinct cell positions in
/// first-occurrence order. Sentinels (`REF_DELETED`, `PARSE_ERROR`) are
/// excluded — a formula doesn't "depend on" a reference that can never
/// resolve to a live cell.
fn collect_references(ast: &Expression) -> Vec<Position> {
    let mut raw = Vec::new();
    ast.walk_cells(&mut raw);

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for pos in raw {
        if pos.is_valid() && seen.insert(pos) {
            out.push(pos);
        }
    }
    out
}

fn eval<S: SheetLookup>(expr: &Expression, sheet: &mut S) -> Result<f64, FormulaError> {
    match expr {
        Expression::Literal(n) => Ok(*n),

        Expression::Cell(pos) => {
            if *pos == Position::REF_DELETED {
                return Err(FormulaError::Ref);
            }
            sheet.resolve(*pos)
        }

        Expression::Unary(op, inner) => {
            let value = eval(inner, sheet)?;
            Ok(match op {
                UnaryOperator::Plus => value,
                UnaryOperator::Negate => -value,
            })
        }

        Expression::Parens(inner) => eval(inner, sheet),

        Expression::Binary(op, lhs, rhs) => {
            // The right side is evaluated first (it may drive a cache
            // recompute with its own side effects) but the left
            // operand's error always wins when both sides fail.
            let rhs_result = eval(rhs, sheet);
            let lhs_result = eval(lhs, sheet);
            let lhs_value = lhs_result?;
            let rhs_value = rhs_result?;

            match op {
                BinaryOperator::Add => finite_or_div0(lhs_value + rhs_value),
                BinaryOperator::Subtract => finite_or_div0(lhs_value - rhs_value),
                BinaryOperator::Multiply => finite_or_div0(lhs_value * rhs_value),
                BinaryOperator::Divide => {
                    if rhs_value.abs() <= 1e-200 {
                        Err(FormulaError::Div0)
                    } else {
                        Ok(lhs_value / rhs_value)
                    }
                }
            }
        }
    }
}

fn finite_or_div0(value: f64) -> Result<f64, FormulaError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::Div0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSheet {
        values: HashMap<Position, Result<f64, FormulaError>>,
    }

    impl SheetLookup for FakeSheet {
        fn resolve(&mut self, pos: Position) -> Result<f64, FormulaError> {
            self.values.get(&pos).cloned().unwrap_or(Ok(0.0))
        }
    }

    #[test]
    fn evaluates_arithmetic() {
        let formula = Formula::parse("1+2*3").unwrap();
        let mut sheet = FakeSheet { values: HashMap::new() };
        assert_eq!(formula.evaluate(&mut sheet), Ok(7.0));
    }

    #[test]
    fn absent_cell_reads_as_zero() {
        let formula = Formula::parse("A1+1").unwrap();
        let mut sheet = FakeSheet { values: HashMap::new() };
        assert_eq!(formula.evaluate(&mut sheet), Ok(1.0));
    }

    #[test]
    fn left_error_wins_over_right() {
        let formula = Formula::parse("A1+B1").unwrap();
        let mut values = HashMap::new();
        values.insert(Position::new(0, 0), Err(FormulaError::Value));
        values.insert(Position::new(0, 1), Err(FormulaError::Div0));
        let mut sheet = FakeSheet { values };
        assert_eq!(formula.evaluate(&mut sheet), Err(FormulaError::Value));
    }

    #[test]
    fn division_by_near_zero_is_div0() {
        let formula = Formula::parse("1/0").unwrap();
        let mut sheet = FakeSheet { values: HashMap::new() };
        assert_eq!(formula.evaluate(&mut sheet), Err(FormulaError::Div0));
    }

    #[test]
    fn deleted_reference_is_ref_error() {
        let formula = Formula::parse("A1+1").unwrap();
        let mut values = HashMap::new();
        values.insert(Position::new(0, 0), Err(FormulaError::Ref));
        let mut sheet = FakeSheet { values };
        assert_eq!(formula.evaluate(&mut sheet), Err(FormulaError::Ref));
    }

    #[test]
    fn bare_ref_deleted_sentinel_short_circuits_to_ref_error() {
        // A rewritten reference to a deleted row/col never reaches the
        // resolver at all — the AST node itself carries the sentinel.
        let mut formula = Formula::parse("A1").unwrap();
        formula.handle_deleted_rows(0, 1);
        let mut sheet = FakeSheet { values: HashMap::new() };
        assert_eq!(formula.evaluate(&mut sheet), Err(FormulaError::Ref));
    }

    #[test]
    fn referenced_cells_are_deduplicated_in_first_occurrence_order() {
        let formula = Formula::parse("A1+B1+A1").unwrap();
        assert_eq!(
            formula.get_referenced_cells(),
            &[Position::new(0, 0), Position::new(0, 1)]
        );
    }

    #[test]
    fn detects_overflowed_literal() {
        let formula = Formula::parse("1e400+1").unwrap();
        assert!(formula.has_overflowed_literal());
        let formula = Formula::parse("1+2").unwrap();
        assert!(!formula.has_overflowed_literal());
    }

    #[test]
    fn get_expression_round_trips_minimal_parens() {
        let formula = Formula::parse("(A1+B1)*C1").unwrap();
        assert_eq!(formula.get_expression(), "(A1+B1)*C1");
    }
}
