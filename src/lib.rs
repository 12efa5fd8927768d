//! Runtime formula parser/evaluator.
//!
//! # Why?
//!
//! User-supplied formulas are parsed once and evaluated many times against
//! changing variable values. Text goes through a fixed pipeline:
//!
//! 1. [`tokenize`] classifies characters into [`Token`]s.
//! 2. [`validate`] checks the token sequence against the grammar.
//! 3. [`check_variables`] whitelists operand names.
//! 4. [`to_postfix`] reorders tokens by precedence.
//! 5. [`build`] assembles an [`Expression`] tree.
//! 6. [`Expression::evaluate`] walks the tree against a [`VariableStore`].
//!
//! [`Formula::parse`] runs steps 1 through 5.
//!
//! # Example
//!
//! ```rust
//! use runtime_formula::*;
//! use std::collections::HashMap;
//!
//! let formula = Formula::parse("(3 + x) * 5 ^ -log(y)", &["x", "y"]).unwrap();
//!
//! let mut store = HashMap::from([("x".to_string(), 5.0), ("y".to_string(), 1.0)]);
//! let output = formula.evaluate(&mut store, ArithmeticMode::Safe).unwrap();
//! assert_eq!(output, 8.0);
//!
//! store.insert("x".to_string(), 7.0);
//! let output = formula.evaluate(&mut store, ArithmeticMode::Safe).unwrap();
//! assert_eq!(output, 10.0);
//! ```

mod error;
mod evaluate;
mod expression;
mod formula;
mod lex;
mod postfix;
mod token;
mod tree;
mod validate;

/// Lexical rules, in the [`pest`] parsing expression grammar language.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use error::{FormulaError, FormulaResult};
pub use evaluate::*;
pub use expression::*;
pub use formula::{Formula, Session};
pub use lex::tokenize;
pub use postfix::to_postfix;
pub use token::{is_numeric_literal, PrecedenceClass, Token};
pub use tree::build;
pub use validate::{check_variables, is_reserved_name, validate};
