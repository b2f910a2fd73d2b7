//! # Expression Evaluation
//!
//! Runtime evaluation of parsed [`Expression`](crate::ast::Expression)s.
//!
//! * [`expression`]: the [`Value`] type and the [`ExpressionEvaluator`]
//! * [`context`]: name resolution and event counts through [`EvalContext`]
//!
//! Evaluation draws from the caller's random number generator so that a
//! subject's `rand(...)` and `choice(...)` results depend only on its seed.

pub mod context;
pub mod expression;

use thiserror::Error;

pub use context::{EvalContext, VariableContext};
pub use expression::{ExpressionEvaluator, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown variable '{0}'.")]
    UnknownVariable(String),
    #[error("{0}")]
    Eval(String),
    /// An evaluation error attributed to a script line.
    #[error("Error on line {line}: {message}")]
    AtLine { line: usize, message: String },
}

impl EvalError {
    pub fn eval<S: Into<String>>(message: S) -> Self {
        EvalError::Eval(message.into())
    }

    /// Attributes the error to a script line, keeping an existing attribution.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            EvalError::AtLine { .. } => self,
            other => EvalError::AtLine {
                line,
                message: other.to_string(),
            },
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
