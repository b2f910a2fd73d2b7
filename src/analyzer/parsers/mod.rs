pub mod common;
pub mod expression;

use super::core::{ParseError, Parser};
use crate::ast;
use crate::tokenizer::token::{Token, Tokenizer};

/// Tokenizes and parses a complete expression.
///
/// Whitespace tokens are dropped before parsing and every remaining token
/// must be consumed.
#[tracing::instrument(level = "debug")]
pub fn parse_expression_text(text: &str) -> Result<ast::Expression, ParseError> {
    let tokens: Vec<Token> = Tokenizer::new()
        .tokenize(text)?
        .into_iter()
        .map(|span| span.token)
        .filter(|token| !token.is_whitespace())
        .collect();

    let (pos, expr) = expression::parse_expression()
        .parse(&tokens, 0)
        .map_err(|e| e.root_cause().clone())?;
    match tokens.get(pos) {
        Some(token) => Err(ParseError::Unexpected {
            found: token.to_string(),
            position: pos,
        }),
        None => Ok(expr),
    }
}
