//! # Expression Analyzer
//!
//! Transforms the token stream produced by the [`tokenizer`](crate::tokenizer)
//! into an [`Expression`](crate::ast::Expression) using parser combinators.
//!
//! ## Architecture Design
//!
//! 1. **Core Parser Interface**: The `Parser` trait defines the parsing contract
//! 2. **Combinators**: Small, composable parser units that can be combined
//! 3. **Specialized Parsers**: The precedence ladder of the expression language
//!
//! ```text
//! or  →  and  →  not  →  comparison  →  + -  →  * /  →  unary -  →  primary
//! ```
//!
//! ## Usage Example
//!
//! ```
//! use lesim::analyzer::parsers::parse_expression_text;
//!
//! let expr = parse_expression_text("count(s) >= 10 and rand(1, 3) = 2").unwrap();
//! assert!(expr.is_random());
//! ```

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
