use crate::token::{PrecedenceClass, Token};

use log::trace;

/// Reorders a validated infix sequence into Reverse Polish Notation.
///
/// Binary operators of equal precedence come out left-associative. Parentheses
/// and commas never reach the output.
pub fn to_postfix(tokens: Vec<Token>) -> Vec<Token> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut operators: Vec<Token> = Vec::new();

    for token in tokens {
        if token.class == PrecedenceClass::Operand {
            output.push(token);
        } else if token.is_close_paren() {
            pop_to_open_paren(&mut operators, &mut output);
            operators.pop();
        } else if token.is_comma() {
            pop_to_open_paren(&mut operators, &mut output);
        } else if token.is_open_paren() || token.class.is_prefix() {
            operators.push(token);
        } else {
            while let Some(top) = operators.last() {
                if top.class == PrecedenceClass::Structural || top.class < token.class {
                    break;
                }
                output.extend(operators.pop());
            }
            operators.push(token);
        }
    }
    output.extend(operators.into_iter().rev());

    trace!(
        "to_postfix: {}",
        output
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    );
    output
}

/// Leaves the opening parenthesis on the stack.
fn pop_to_open_paren(operators: &mut Vec<Token>, output: &mut Vec<Token>) {
    while let Some(top) = operators.last() {
        if top.is_open_paren() {
            break;
        }
        output.extend(operators.pop());
    }
}
