//! # Whitespace Token Handling
//!
//! Spaces and tabs are kept as [`Token::Whitespace`] so token positions stay
//! exact; the parser filters them out before building the AST.

use nom::{bytes::complete::take_while1, combinator::map, error::context};

use super::token::{ParserResult, Token};

/// Parses whitespace (spaces and tabs) from the input string.
///
/// # Examples
///
/// ```
/// # use lesim::tokenizer::whitespace::parse_whitespace;
/// # use lesim::tokenizer::token::Token;
/// let input = "   hello";
/// let (rest, token) = parse_whitespace(input).unwrap();
/// assert_eq!(token, Token::Whitespace("   ".to_string()));
/// assert_eq!(rest, "hello");
/// ```
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace",
        map(
            take_while1(|c: char| c == ' ' || c == '\t'),
            |ws: &str| Token::Whitespace(ws.to_string()),
        ),
    )(input)
}
