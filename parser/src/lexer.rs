//! FILENAME: parser/src/lexer.rs
//! PURPOSE: Scans a raw formula string and produces a stream of Tokens.
//! CONTEXT: First stage of the parsing pipeline. Handles whitespace
//! skipping, number parsing (scientific notation included, via Rust's own
//! f64 parser), and cell labels (an uppercase letter run immediately
//! followed by a digit run).

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.input.next() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => Token::Slash,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some('=') => Token::Equals,

            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.read_number(ch),
            Some(ch) if ch.is_ascii_uppercase() => self.read_cell(ch),

            None => Token::EOF,
            Some(ch) => Token::Illegal(ch),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    /// Reads a decimal number, scientific notation included (`1e10`, `1.5E-3`).
    fn read_number(&mut self, first_char: char) -> Token {
        let mut text = String::from(first_char);
        let mut has_dot = first_char == '.';
        let mut has_exp = false;

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.input.next();
            } else if ch == '.' && !has_dot && !has_exp {
                has_dot = true;
                text.push(ch);
                self.input.next();
            } else if (ch == 'e' || ch == 'E') && !has_exp {
                let mut lookahead = self.input.clone();
                lookahead.next();
                let exp_ok = matches!(lookahead.peek(), Some(c) if c.is_ascii_digit())
                    || matches!(lookahead.peek(), Some('+') | Some('-'));
                if !exp_ok {
                    break;
                }
                has_exp = true;
                text.push(ch);
                self.input.next();
                if matches!(self.input.peek(), Some('+') | Some('-')) {
                    text.push(self.input.next().unwrap());
                }
            } else {
                break;
            }
        }

        match text.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Illegal(first_char),
        }
    }

    /// Reads an uppercase-letter run immediately followed by a digit run,
    /// producing a `Cell` token holding the raw label text. A letter run
    /// with no following digits is not part of the grammar, so only the
    /// first letter is consumed and reported `Illegal` — the remaining
    /// letters are re-lexed on the next call, which still yields a syntax
    /// error overall.
    fn read_cell(&mut self, first_char: char) -> Token {
        let mut letters = String::from(first_char);
        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_uppercase() {
                letters.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        if !matches!(self.input.peek(), Some(c) if c.is_ascii_digit()) {
            return Token::Illegal(first_char);
        }

        let mut label = letters;
        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                label.push(ch);
                self.input.next();
            } else {
                break;
            }
        }
        Token::Cell(label)
    }
}
