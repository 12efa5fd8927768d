use std::fmt;

/// Lexical category of a [`Token`], doubling as its operator precedence.
///
/// Classes `Comparison` through `Power` are the binary infix operators,
/// ordered by binding strength.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PrecedenceClass {
    /// Numeric literal or identifier.
    Operand = 0,
    /// `=`, `!=`, `>`, `<`
    Comparison = 1,
    /// `+`, `-`
    Additive = 2,
    /// `*`, `/`, `%`
    Multiplicative = 3,
    /// `^`
    Power = 4,
    /// Only produced by validation, when a `-` is in prefix position.
    UnaryMinus = 5,
    /// Functions and aggregates. Always followed by a parenthesized argument list.
    Prefix = 6,
    /// `(`, `)`, `,`
    Structural = 7,
    /// End-of-input sentinel.
    End = 8,
}

impl PrecedenceClass {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Comparison | Self::Additive | Self::Multiplicative | Self::Power
        )
    }

    /// Prefix operators bind to what follows them, so they never pop the
    /// operator stack on arrival.
    pub fn is_prefix(self) -> bool {
        matches!(self, Self::UnaryMinus | Self::Prefix)
    }
}

/// A classified slice of formula text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub text: String,
    pub class: PrecedenceClass,
}

impl Token {
    pub fn new(text: impl Into<String>, class: PrecedenceClass) -> Self {
        Self {
            text: text.into(),
            class,
        }
    }

    pub fn operand(text: impl Into<String>) -> Self {
        Self::new(text, PrecedenceClass::Operand)
    }

    pub fn structural(text: impl Into<String>) -> Self {
        Self::new(text, PrecedenceClass::Structural)
    }

    pub fn unary_minus() -> Self {
        Self::new("-", PrecedenceClass::UnaryMinus)
    }

    pub fn end() -> Self {
        Self::new("", PrecedenceClass::End)
    }

    pub fn is(&self, text: &str, class: PrecedenceClass) -> bool {
        self.class == class && self.text == text
    }

    pub fn is_open_paren(&self) -> bool {
        self.is("(", PrecedenceClass::Structural)
    }

    pub fn is_close_paren(&self) -> bool {
        self.is(")", PrecedenceClass::Structural)
    }

    pub fn is_comma(&self) -> bool {
        self.is(",", PrecedenceClass::Structural)
    }

    /// True for operands spelled as a decimal literal.
    pub fn is_numeric(&self) -> bool {
        self.class == PrecedenceClass::Operand && is_numeric_literal(&self.text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            PrecedenceClass::End => f.write_str("end of input"),
            _ => f.write_str(&self.text),
        }
    }
}

/// Digits with at most one decimal point, and at least one digit.
pub fn is_numeric_literal(text: &str) -> bool {
    let mut digits = 0;
    let mut points = 0;
    for c in text.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return false,
        }
    }
    digits > 0 && points <= 1
}
