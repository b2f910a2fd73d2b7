use thiserror::Error;

use crate::analyzer::ParseError;
use crate::eval::EvalError;
use crate::mechanism::MechanismError;
use crate::script::CompileError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Compile(#[from] CompileError),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("Mechanism error: {0}")]
    Mechanism(#[from] MechanismError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Raised when a [`crate::progress::ProgressReporter`] asks the simulation to stop.
    #[error("Simulation interrupted")]
    Interrupted,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

// エラー作成用のヘルパー関数
impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}
