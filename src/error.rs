//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Everything that can stop the formula pipeline.
///
/// All variants except [`FormulaError::InternalInconsistency`] describe bad
/// user input. Numeric faults in strict mode are not errors; they surface as
/// `NaN` or infinite results.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// The formula text has zero length.
    #[error("Formula is empty")]
    EmptyInput,

    /// A character no lexical rule accepts.
    #[error("Unexpected character: {0:?}")]
    UnrecognizedCharacter(char),

    #[error("Unexpected symbol: expected {expected}, got {found}")]
    UnexpectedToken { found: String, expected: String },

    /// A closing parenthesis was expected but something else came.
    #[error("Number of parentheses is uneven")]
    UnevenParentheses,

    #[error("Unexpected end of formula")]
    UnexpectedEndOfInput,

    /// An operand names neither a declared variable, a literal, nor a constant.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// The counter of `sum`/`mult` is not a usable variable name.
    #[error("Invalid counting variable: {0}")]
    InvalidBoundVariable(String),

    /// An earlier stage produced input a later stage cannot consume. This is a
    /// bug in the pipeline, not in the formula.
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl FormulaError {
    pub(crate) fn unexpected(found: impl ToString, expected: impl ToString) -> Self {
        Self::UnexpectedToken {
            found: found.to_string(),
            expected: expected.to_string(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::InternalInconsistency(message.into())
    }

    /// True when the error reveals a pipeline defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalInconsistency(_))
    }
}
