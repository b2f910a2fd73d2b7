//! # Core Parser Definitions
//!
//! The parser interface and error type of the expression parser combinators.

use thiserror::Error;

use crate::tokenizer::token::TokenizerError;

/// Parser trait defines the core parsing interface.
///
/// Parsers take an input slice and a position, and return either the new
/// position with the parsed value, or a parse error.
///
/// # Type Parameters
///
/// * `I` - The input token type
/// * `O` - The output value type
pub trait Parser<I, O> {
    /// Attempts to parse the input starting at the given position.
    ///
    /// # Returns
    ///
    /// * `Ok((new_pos, output))` - If parsing succeeds, returns the new position and the parsed value
    /// * `Err(error)` - If parsing fails, returns a ParseError
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

/// Result type for parsing operations.
pub type ParseResult<O> = Result<(usize, O), ParseError>;

/// Error type for parsing operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unexpected end of input
    #[error("unexpected end of expression")]
    UnexpectedEOF { position: usize },
    /// Token that no parser accepts
    #[error("unexpected '{found}'")]
    Unexpected { found: String, position: usize },
    /// No alternative matched
    #[error("no alternative matched at token {position}")]
    NoAlternative { position: usize },
    /// Error annotated by the parser that produced it
    #[error("{inner} in {message}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}

impl ParseError {
    pub fn get_position(&self) -> usize {
        match self {
            ParseError::UnexpectedEOF { position }
            | ParseError::Unexpected { position, .. }
            | ParseError::NoAlternative { position } => *position,
            ParseError::WithContext { inner, .. } => inner.get_position(),
        }
    }

    /// Strips context wrappers, returning the innermost error.
    pub fn root_cause(&self) -> &ParseError {
        match self {
            ParseError::WithContext { inner, .. } => inner.root_cause(),
            other => other,
        }
    }
}

impl From<TokenizerError> for ParseError {
    fn from(error: TokenizerError) -> Self {
        match error {
            TokenizerError::ParseError { found, span, .. } => ParseError::Unexpected {
                found: found.chars().take(1).collect(),
                position: span.start,
            },
        }
    }
}
