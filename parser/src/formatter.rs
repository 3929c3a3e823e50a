//! FILENAME: parser/src/formatter.rs
//! PURPOSE: Renders an `Expression` back to its canonical formula text,
//! deciding at render time which `Parens` nodes are redundant.
//! CONTEXT: The parser always keeps an explicit `Parens` node for every
//! pair of parentheses it sees, so the AST reflects exactly what was
//! typed. This module is the only place that ever removes them, following
//! a fixed rule table keyed on the surrounding operator and the shape of
//! the parenthesized operand. A parenthesization that doesn't change the
//! result is redundant and gets dropped; anything that would change
//! precedence if dropped is kept.

use crate::ast::{BinaryOperator, Expression, UnaryOperator};

/// Renders `expr` as canonical formula text (no leading `=`), stripping
/// every `Parens` node whose parentheses don't affect evaluation order.
pub fn canonical(expr: &Expression) -> String {
    render(&normalize(expr.clone()))
}

fn is_additive(op: BinaryOperator) -> bool {
    matches!(op, BinaryOperator::Add | BinaryOperator::Subtract)
}

/// True when `expr` is a `Binary` node whose operator is `+` or `-`.
fn is_additive_binary(expr: &Expression) -> bool {
    matches!(expr, Expression::Binary(op, _, _) if is_additive(*op))
}

/// Unwraps `expr` if it's `Parens(inner)` and `should_unwrap(inner)` holds;
/// otherwise returns it unchanged (re-wrapped if it was a `Parens`).
fn unwrap_if(expr: Expression, should_unwrap: impl Fn(&Expression) -> bool) -> Expression {
    if let Expression::Parens(inner) = expr {
        if should_unwrap(&inner) {
            return *inner;
        }
        return Expression::Parens(inner);
    }
    expr
}

/// Bottom-up pass that decides, node by node, whether a `Parens` wrapper
/// stays or goes. Each case mirrors what it costs to drop the parens for
/// that particular parent/child combination.
fn normalize(expr: Expression) -> Expression {
    match expr {
        Expression::Literal(_) | Expression::Cell(_) => expr,

        Expression::Unary(op, inner) => {
            let inner = normalize(*inner);
            // -(a*b) and -(a/b) read identically without the parens;
            // -(a+b) does not.
            let inner = unwrap_if(inner, |sub| !is_additive_binary(sub));
            Expression::Unary(op, Box::new(inner))
        }

        Expression::Binary(op, lhs, rhs) => {
            let lhs = normalize(*lhs);
            let rhs = normalize(*rhs);
            let (lhs, rhs) = unwrap_for_binary(op, lhs, rhs);
            Expression::Binary(op, Box::new(lhs), Box::new(rhs))
        }

        Expression::Parens(inner) => {
            let inner = normalize(*inner);
            // Parens around something with no lower-precedence content
            // inside never change meaning, regardless of where they sit.
            if matches!(
                inner,
                Expression::Literal(_) | Expression::Cell(_) | Expression::Unary(_, _)
            ) {
                inner
            } else {
                Expression::Parens(Box::new(inner))
            }
        }
    }
}

fn unwrap_for_binary(op: BinaryOperator, lhs: Expression, rhs: Expression) -> (Expression, Expression) {
    let keep_unless_additive = |sub: &Expression| !is_additive_binary(sub);

    match op {
        BinaryOperator::Divide => {
            // a/(b+c) must keep its parens; a/(b*c) need not — only a
            // leading + or - on the left changes what the slash divides.
            let lhs = unwrap_if(lhs, keep_unless_additive);
            // By this point a right operand still wrapped in `Parens` can
            // only be wrapping a `Binary` (atoms were already stripped),
            // and any binary root on the right of `/` changes the result
            // if unparenthesized, so it always keeps its parens.
            (lhs, rhs)
        }
        BinaryOperator::Multiply => {
            let lhs = unwrap_if(lhs, keep_unless_additive);
            let rhs = unwrap_if(rhs, keep_unless_additive);
            (lhs, rhs)
        }
        BinaryOperator::Add => {
            // Addition is associative with both neighbours; parens never
            // change the result on either side.
            let lhs = unwrap_if(lhs, |_| true);
            let rhs = unwrap_if(rhs, |_| true);
            (lhs, rhs)
        }
        BinaryOperator::Subtract => {
            let lhs = unwrap_if(lhs, |_| true);
            // a-(b+c) must keep its parens; a-(b*c) and a-(b) need not.
            let rhs = unwrap_if(rhs, keep_unless_additive);
            (lhs, rhs)
        }
    }
}

fn render(expr: &Expression) -> String {
    match expr {
        Expression::Literal(n) => render_literal(*n),
        Expression::Cell(pos) => {
            let label = pos.to_label();
            if label.is_empty() {
                "#!REF".to_string()
            } else {
                label
            }
        }
        Expression::Unary(op, inner) => format!("{op}{}", render(inner)),
        Expression::Binary(op, lhs, rhs) => format!("{}{op}{}", render(lhs), render(rhs)),
        Expression::Parens(inner) => format!("({})", render(inner)),
    }
}

fn render_literal(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn lit(n: f64) -> Expression {
        Expression::Literal(n)
    }

    fn cell(row: i32, col: i32) -> Expression {
        Expression::Cell(Position::new(row, col))
    }

    fn bin(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Expression {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    fn parens(inner: Expression) -> Expression {
        Expression::Parens(Box::new(inner))
    }

    #[test]
    fn drops_parens_around_atoms() {
        let expr = bin(BinaryOperator::Add, parens(lit(1.0)), parens(cell(0, 0)));
        assert_eq!(canonical(&expr), "1+A1");
    }

    #[test]
    fn keeps_parens_that_change_precedence_under_multiply() {
        // (A1+B1)*C1 must keep its parens.
        let sum = bin(BinaryOperator::Add, cell(0, 0), cell(0, 1));
        let expr = bin(BinaryOperator::Multiply, parens(sum), cell(0, 2));
        assert_eq!(canonical(&expr), "(A1+B1)*C1");
    }

    #[test]
    fn drops_parens_around_product_under_multiply() {
        // (A1*B1)*C1 doesn't need its parens.
        let product = bin(BinaryOperator::Multiply, cell(0, 0), cell(0, 1));
        let expr = bin(BinaryOperator::Multiply, parens(product), cell(0, 2));
        assert_eq!(canonical(&expr), "A1*B1*C1");
    }

    #[test]
    fn divide_right_operand_only_drops_for_atoms() {
        let quotient = bin(BinaryOperator::Divide, cell(0, 0), parens(lit(2.0)));
        assert_eq!(canonical(&quotient), "A1/2");

        let sum = bin(BinaryOperator::Add, cell(0, 0), cell(0, 1));
        let quotient = bin(BinaryOperator::Divide, cell(0, 0), parens(sum));
        assert_eq!(canonical(&quotient), "A1/(A1+B1)");

        let product = bin(BinaryOperator::Multiply, cell(0, 0), cell(0, 1));
        let quotient = bin(BinaryOperator::Divide, cell(0, 0), parens(product));
        assert_eq!(canonical(&quotient), "A1/(A1*B1)");
    }

    #[test]
    fn subtract_keeps_additive_parens_on_the_right_only() {
        let sum = bin(BinaryOperator::Add, cell(0, 0), cell(0, 1));
        let expr = bin(BinaryOperator::Subtract, parens(sum.clone()), cell(0, 2));
        assert_eq!(canonical(&expr), "A1+B1-C1");

        let expr = bin(BinaryOperator::Subtract, cell(0, 2), parens(sum));
        assert_eq!(canonical(&expr), "C1-(A1+B1)");
    }

    #[test]
    fn unary_drops_parens_around_product_keeps_around_sum() {
        let product = bin(BinaryOperator::Multiply, cell(0, 0), cell(0, 1));
        let expr = Expression::Unary(UnaryOperator::Negate, Box::new(parens(product)));
        assert_eq!(canonical(&expr), "-A1*B1");

        let sum = bin(BinaryOperator::Add, cell(0, 0), cell(0, 1));
        let expr = Expression::Unary(UnaryOperator::Negate, Box::new(parens(sum)));
        assert_eq!(canonical(&expr), "-(A1+B1)");
    }

    #[test]
    fn integral_literal_renders_without_decimal() {
        assert_eq!(render_literal(4.0), "4");
        assert_eq!(render_literal(4.5), "4.5");
    }
}
