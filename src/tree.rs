use crate::error::{FormulaError, FormulaResult};
use crate::expression::{BinaryOp, Expression, PrefixOp, UnaryOp};
use crate::token::{PrecedenceClass, Token};
use crate::validate::is_reserved_name;

/// Assembles an expression tree from a postfix token sequence.
///
/// Only an [`FormulaError::InvalidBoundVariable`] is a user error here; any
/// other failure means an earlier stage handed over malformed postfix.
pub fn build(postfix: Vec<Token>) -> FormulaResult<Expression> {
    let mut stack = NodeStack(Vec::with_capacity(postfix.len()));

    for token in postfix {
        match token.class {
            PrecedenceClass::Operand if token.is_numeric() => {
                let value = token.text.parse::<f64>().map_err(|_| {
                    FormulaError::internal(format!("Unparseable literal {}", token.text))
                })?;
                stack.push(Expression::Literal(value));
            }
            PrecedenceClass::Operand => stack.push(Expression::Variable(token.text)),
            PrecedenceClass::UnaryMinus => {
                let only = stack.pop(&token)?;
                stack.push(Expression::unary(UnaryOp::Negate, only));
            }
            PrecedenceClass::Prefix => match PrefixOp::from_name(&token.text) {
                Some(PrefixOp::Unary(op)) => {
                    let only = stack.pop(&token)?;
                    stack.push(Expression::unary(op, only));
                }
                Some(PrefixOp::Aggregate(op)) => {
                    let body = stack.pop(&token)?;
                    let limit = stack.pop(&token)?;
                    let variable = bound_variable(stack.pop(&token)?)?;
                    if body.binds(&variable) {
                        return Err(FormulaError::InvalidBoundVariable(variable));
                    }
                    stack.push(Expression::aggregate(op, variable, limit, body));
                }
                None => {
                    return Err(FormulaError::internal(format!(
                        "Unexpected function {}",
                        token.text
                    )))
                }
            },
            class if class.is_binary() => {
                let op = BinaryOp::from_symbol(&token.text).ok_or_else(|| {
                    FormulaError::internal(format!("Unexpected operator {}", token.text))
                })?;
                let rhs = stack.pop(&token)?;
                let lhs = stack.pop(&token)?;
                stack.push(Expression::binary(op, lhs, rhs));
            }
            _ => {
                return Err(FormulaError::internal(format!(
                    "Unexpected token {:?} in postfix",
                    token
                )))
            }
        }
    }

    let root = stack.0.pop();
    match (root, stack.0.is_empty()) {
        (Some(root), true) => Ok(root),
        (root, _) => Err(FormulaError::internal(format!(
            "{} nodes left at end of tree construction",
            stack.0.len() + usize::from(root.is_some())
        ))),
    }
}

/// The counter of an aggregate must be a plain, non-reserved variable name.
fn bound_variable(node: Expression) -> FormulaResult<String> {
    match node {
        Expression::Variable(name) if !is_reserved_name(&name) => Ok(name),
        other => Err(FormulaError::InvalidBoundVariable(other.to_string())),
    }
}

struct NodeStack(Vec<Expression>);

impl NodeStack {
    fn push(&mut self, node: Expression) {
        self.0.push(node);
    }

    fn pop(&mut self, consumer: &Token) -> FormulaResult<Expression> {
        self.0.pop().ok_or_else(|| {
            FormulaError::internal(format!("Missing operand for {}", consumer.text))
        })
    }
}
