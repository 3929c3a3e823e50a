//! FILENAME: parser/src/parser.rs
//! PURPOSE: Recursive-descent parser turning a token stream into an
//! `Expression` AST.
//! CONTEXT: The grammar is deliberately small — four arithmetic operators,
//! unary +/-, cell references, numeric literals, and parentheses — so a
//! hand-written descent parser (one function per precedence level) reads
//! more directly than a generated one. Left-associativity for `+ -` and
//! `* /` falls out of the iterative `while` loop in each of `expr`/`term`
//! rather than recursion.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('+' | '-') unary | atom
//! atom   := NUMBER | CELL | '(' expr ')'
//! ```

use crate::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::position::Position;
use crate::token::Token;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok == Token::EOF;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Parser { tokens, pos: 0 }
    }

    /// Parses `input` as a formula body (no leading `=`), requiring the
    /// whole string to be consumed.
    pub fn parse(input: &str) -> Result<Expression, ParseError> {
        let mut parser = Parser::new(input);
        let expr = parser.parse_expr()?;
        parser.expect_eof()?;
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::EOF => Ok(()),
            other => Err(ParseError::new(format!("unexpected trailing {other}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expression::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expression::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let op = match self.peek() {
            Token::Plus => Some(UnaryOperator::Plus),
            Token::Minus => Some(UnaryOperator::Negate),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expression::Unary(op, Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expression, ParseError> {
        match self.advance() {
            Token::Number(n) => Ok(Expression::Literal(n)),
            Token::Cell(label) => {
                let pos = Position::from_label(&label);
                if pos == Position::PARSE_ERROR {
                    Err(ParseError::new(format!("invalid cell reference {label:?}")))
                } else {
                    Ok(Expression::Cell(pos))
                }
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Token::RParen => Ok(Expression::Parens(Box::new(inner))),
                    other => Err(ParseError::new(format!("expected ')', found {other}"))),
                }
            }
            other => Err(ParseError::new(format!("unexpected {other}"))),
        }
    }
}
