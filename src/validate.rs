//! Recursive-descent recognizer for the formula grammar:
//!
//! ```text
//! sequence := primary (binary_op primary)*
//! primary  := operand
//!           | "(" sequence ")"
//!           | "-" primary
//!           | function "(" sequence ")"
//!           | aggregate "(" operand "," sequence "," sequence ")"
//! ```
//!
//! No tree is built here. The only output is the token sequence itself, with
//! every prefix `-` retagged as [`PrecedenceClass::UnaryMinus`].

use crate::error::{FormulaError, FormulaResult};
use crate::token::{PrecedenceClass, Token};

use log::trace;

/// Accepts or rejects `tokens` against the formula grammar.
pub fn validate(tokens: Vec<Token>) -> FormulaResult<Vec<Token>> {
    let mut validator = Validator { tokens };
    let (_, boundary) = validator.sequence(0)?;
    if boundary.class != PrecedenceClass::End {
        return Err(FormulaError::unexpected(boundary, "end of input"));
    }
    trace!("validate: accepted {} tokens", validator.tokens.len());
    Ok(validator.tokens)
}

/// Confirms that every operand is a declared variable, a numeric literal, or
/// one of the reserved names `e`, `pi` (any case) and `r`.
pub fn check_variables<S: AsRef<str>>(
    tokens: Vec<Token>,
    declared: &[S],
) -> FormulaResult<Vec<Token>> {
    for token in tokens.iter().filter(|t| t.class == PrecedenceClass::Operand) {
        let known = token.is_numeric()
            || is_reserved_name(&token.text)
            || declared.iter().any(|name| name.as_ref() == token.text);
        if !known {
            return Err(FormulaError::UnknownVariable(token.text.clone()));
        }
    }
    Ok(tokens)
}

/// Names that resolve without a variable store: `r`, `pi` and `e`.
pub fn is_reserved_name(name: &str) -> bool {
    name == "r" || name.eq_ignore_ascii_case("pi") || name.eq_ignore_ascii_case("e")
}

struct Validator {
    tokens: Vec<Token>,
}

impl Validator {
    /// Returns the position after the boundary token, and the boundary token:
    /// the first token after the sequence that is not a binary operator.
    fn sequence(&mut self, pos: usize) -> FormulaResult<(usize, Token)> {
        let mut pos = self.primary(pos)?;
        loop {
            let next = self.peek(pos);
            if !next.class.is_binary() {
                return Ok((pos + 1, next));
            }
            pos = self.primary(pos + 1)?;
        }
    }

    /// Returns the position after the primary.
    fn primary(&mut self, pos: usize) -> FormulaResult<usize> {
        let token = self.take(pos)?;
        trace!("primary: {token:?} at {pos}");
        match token.class {
            PrecedenceClass::Operand => Ok(pos + 1),
            PrecedenceClass::Structural if token.is_open_paren() => {
                let (pos, boundary) = self.sequence(pos + 1)?;
                expect(&boundary, &Token::structural(")"))?;
                Ok(pos)
            }
            PrecedenceClass::Additive if token.text == "-" => {
                self.tokens[pos] = Token::unary_minus();
                self.primary(pos + 1)
            }
            PrecedenceClass::Prefix if is_aggregate(&token.text) => {
                let pos = self.expect_at(pos + 1, &Token::structural("("))?;
                let counter = self.take(pos)?;
                if counter.class != PrecedenceClass::Operand {
                    return Err(FormulaError::unexpected(counter, "a variable"));
                }
                let pos = self.expect_at(pos + 1, &Token::structural(","))?;
                let (pos, boundary) = self.sequence(pos)?;
                expect(&boundary, &Token::structural(","))?;
                let (pos, boundary) = self.sequence(pos)?;
                expect(&boundary, &Token::structural(")"))?;
                Ok(pos)
            }
            PrecedenceClass::Prefix => {
                let pos = self.expect_at(pos + 1, &Token::structural("("))?;
                let (pos, boundary) = self.sequence(pos)?;
                expect(&boundary, &Token::structural(")"))?;
                Ok(pos)
            }
            _ => Err(FormulaError::unexpected(token, "an operand")),
        }
    }

    fn take(&self, pos: usize) -> FormulaResult<Token> {
        self.tokens
            .get(pos)
            .cloned()
            .ok_or(FormulaError::UnexpectedEndOfInput)
    }

    fn peek(&self, pos: usize) -> Token {
        self.tokens.get(pos).cloned().unwrap_or_else(Token::end)
    }

    fn expect_at(&self, pos: usize, wanted: &Token) -> FormulaResult<usize> {
        expect(&self.take(pos)?, wanted)?;
        Ok(pos + 1)
    }
}

fn expect(actual: &Token, wanted: &Token) -> FormulaResult<()> {
    if actual == wanted {
        Ok(())
    } else if wanted.is_close_paren() {
        Err(FormulaError::UnevenParentheses)
    } else {
        Err(FormulaError::unexpected(actual, wanted))
    }
}

fn is_aggregate(name: &str) -> bool {
    name == "sum" || name == "mult"
}
