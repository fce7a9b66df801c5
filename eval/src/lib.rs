pub mod binding;
pub mod builtins;
pub mod evaluator;
pub mod value;

use std::fmt;

pub use binding::ParameterBinding;
pub use evaluator::{EvalOptions, evaluate};
pub use value::{ComplexFormatParseError, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UnknownParameter(String),
    DivisionByZero,
    Domain(String),
    Unsupported(String),
}

impl EvalError {
    pub(crate) fn domain(reason: impl Into<String>) -> Self {
        EvalError::Domain(reason.into())
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownParameter(name) => write!(f, "unknown parameter '{name}'"),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::Domain(reason) => write!(f, "domain error: {reason}"),
            EvalError::Unsupported(what) => write!(f, "cannot evaluate {what}"),
        }
    }
}

impl std::error::Error for EvalError {}
