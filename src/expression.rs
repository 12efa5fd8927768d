use std::collections::{BTreeSet, HashMap};
use std::fmt;

use once_cell::sync::Lazy;

use crate::validate::is_reserved_name;

/// A parsed formula. Each node owns its children.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    // Constant.
    Literal(f64),

    // Named input, or one of the reserved names `r`, `pi`, `e`.
    Variable(String),

    Unary(UnaryOp, Box<Expression>),

    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Bounded accumulation over the counter `variable`, from 1 to the
    /// floored `limit`.
    Aggregate {
        op: AggregateOp,
        variable: String,
        limit: Box<Expression>,
        body: Box<Expression>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Sqrt,
    Log10,
    Ln,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Asin,
    Acos,
    Atan,
    Abs,
    Ceil,
    Floor,
    Factorial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Equal,
    NotEqual,
    Greater,
    Less,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Sum,
    Product,
}

/// What a class-6 token name turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixOp {
    Unary(UnaryOp),
    Aggregate(AggregateOp),
}

static PREFIX_OPERATORS: Lazy<HashMap<&'static str, PrefixOp>> = Lazy::new(|| {
    use PrefixOp::*;
    use UnaryOp::*;

    HashMap::from([
        ("sqrt", Unary(Sqrt)),
        ("log", Unary(Log10)),
        ("ln", Unary(Ln)),
        ("sin", Unary(Sin)),
        ("cos", Unary(Cos)),
        ("tan", Unary(Tan)),
        ("sinh", Unary(Sinh)),
        ("cosh", Unary(Cosh)),
        ("tanh", Unary(Tanh)),
        ("asin", Unary(Asin)),
        ("acos", Unary(Acos)),
        ("atan", Unary(Atan)),
        ("abs", Unary(Abs)),
        ("ceil", Unary(Ceil)),
        ("floor", Unary(Floor)),
        ("!", Unary(Factorial)),
        ("sum", Aggregate(AggregateOp::Sum)),
        ("mult", Aggregate(AggregateOp::Product)),
    ])
});

impl PrefixOp {
    /// Looks up a canonical (lower-case) function name.
    pub fn from_name(name: &str) -> Option<Self> {
        PREFIX_OPERATORS.get(name).copied()
    }
}

impl UnaryOp {
    /// Function name as written in formula text.
    pub fn name(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Sqrt => "sqrt",
            Self::Log10 => "log",
            Self::Ln => "ln",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Abs => "abs",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Factorial => "!",
        }
    }
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "^" => Self::Pow,
            "=" => Self::Equal,
            "!=" => Self::NotEqual,
            ">" => Self::Greater,
            "<" => Self::Less,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "^",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
        }
    }
}

impl AggregateOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Product => "mult",
        }
    }
}

impl Expression {
    pub fn literal(value: f64) -> Self {
        Self::Literal(value)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn unary(op: UnaryOp, only: Expression) -> Self {
        Self::Unary(op, Box::new(only))
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn aggregate(
        op: AggregateOp,
        variable: impl Into<String>,
        limit: Expression,
        body: Expression,
    ) -> Self {
        Self::Aggregate {
            op,
            variable: variable.into(),
            limit: Box::new(limit),
            body: Box::new(body),
        }
    }

    /// Names this expression reads from a variable store.
    ///
    /// Reserved names are left out, as is an aggregate's counter inside its
    /// own body.
    pub fn variable_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variable_names(&mut Vec::new(), &mut names);
        names
    }

    fn collect_variable_names<'a>(
        &'a self,
        bound: &mut Vec<&'a str>,
        names: &mut BTreeSet<String>,
    ) {
        match self {
            Self::Literal(_) => {}
            Self::Variable(name) => {
                if !is_reserved_name(name) && !bound.contains(&name.as_str()) {
                    names.insert(name.clone());
                }
            }
            Self::Unary(_, only) => only.collect_variable_names(bound, names),
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_variable_names(bound, names);
                rhs.collect_variable_names(bound, names);
            }
            Self::Aggregate {
                variable,
                limit,
                body,
                ..
            } => {
                limit.collect_variable_names(bound, names);
                bound.push(variable);
                body.collect_variable_names(bound, names);
                bound.pop();
            }
        }
    }

    /// True if an aggregate somewhere in this tree binds `name`.
    pub fn binds(&self, name: &str) -> bool {
        match self {
            Self::Literal(_) | Self::Variable(_) => false,
            Self::Unary(_, only) => only.binds(name),
            Self::Binary(_, lhs, rhs) => lhs.binds(name) || rhs.binds(name),
            Self::Aggregate {
                variable,
                limit,
                body,
                ..
            } => variable == name || limit.binds(name) || body.binds(name),
        }
    }
}

/// Fully parenthesized; the output tokenizes and validates again.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Variable(name) => f.write_str(name),
            Self::Unary(op, only) => write!(f, "{}({only})", op.name()),
            Self::Binary(op, lhs, rhs) => write!(f, "({lhs}{}{rhs})", op.symbol()),
            Self::Aggregate {
                op,
                variable,
                limit,
                body,
            } => write!(f, "{}({variable},{limit},{body})", op.name()),
        }
    }
}
