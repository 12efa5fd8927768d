use crate::error::{FormulaError, FormulaResult};
use crate::token::{PrecedenceClass, Token};

use log::trace;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct FormulaLexer;

/// Splits `text` into classified tokens, left to right, longest match first.
///
/// Whitespace is discarded. Fails with [`FormulaError::EmptyInput`] on a
/// zero-length string and with [`FormulaError::UnrecognizedCharacter`] on the
/// first character that cannot start a token.
pub fn tokenize(text: &str) -> FormulaResult<Vec<Token>> {
    if text.is_empty() {
        return Err(FormulaError::EmptyInput);
    }

    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while let Some(first) = rest.chars().next() {
        let lexeme = FormulaLexer::parse(Rule::lexeme, rest)
            .ok()
            .and_then(|mut pairs| pairs.next())
            .and_then(|pair| pair.into_inner().next())
            .ok_or(FormulaError::UnrecognizedCharacter(first))?;
        let consumed = lexeme.as_str().len();
        tokens.push(classify(lexeme)?);
        rest = rest[consumed..].trim_start();
    }

    trace!("tokenize: {} tokens from {text:?}", tokens.len());
    Ok(tokens)
}

fn classify(pair: Pair<Rule>) -> FormulaResult<Token> {
    use PrecedenceClass::*;

    let text = pair.as_str();
    let token = match pair.as_rule() {
        Rule::number | Rule::identifier => Token::new(text, Operand),
        Rule::function => Token::new(text.to_lowercase(), Prefix),
        Rule::factorial => Token::new(text, Prefix),
        Rule::not_equal | Rule::comparison => Token::new(text, Comparison),
        Rule::additive => Token::new(text, Additive),
        Rule::multiplicative => Token::new(text, Multiplicative),
        Rule::power => Token::new(text, Power),
        Rule::structural => Token::new(text, Structural),
        x => {
            return Err(FormulaError::internal(format!(
                "Unexpected lexical rule {x:?}"
            )))
        }
    };
    Ok(token)
}
