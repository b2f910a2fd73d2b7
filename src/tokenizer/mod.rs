//! # Expression Tokenizer
//!
//! Lexical analysis for the expressions embedded in simulation scripts: stop
//! conditions, line guards, variable definitions, assignments and probability
//! weights. Raw text is turned into a stream of [`TokenSpan`](token::TokenSpan)s
//! which the [`analyzer`](crate::analyzer) turns into an
//! [`Expression`](crate::ast::Expression).
//!
//! ## Component Structure
//!
//! * [`token`]: Core token types and tokenizer implementation
//! * [`keyword`]: Word operators (`and`, `or`, `not`) and boolean constants
//! * [`symbol`]: Operators and delimiters parsing
//! * [`literal`]: Number literal parsing
//! * [`whitespace`]: Whitespace handling
//!
//! ## Usage Example
//!
//! ```rust
//! use lesim::tokenizer::token::{Tokenizer, TokenSpan};
//!
//! fn tokenize_example() -> Result<Vec<TokenSpan>, Box<dyn std::error::Error>> {
//!     let mut tokenizer = Tokenizer::new();
//!     let tokens = tokenizer.tokenize("count_line(s) >= 3 and b1")?;
//!     Ok(tokens)
//! }
//! ```

pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
