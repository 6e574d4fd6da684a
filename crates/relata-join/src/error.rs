//! Faults raised by the join kernel.
//!
//! Only programmer/compiler errors live here. A branch that cannot be
//! extended (including a value that a conversion cannot represent) is a
//! zero-cardinality proposal, not an error.

use thiserror::Error;

use crate::value::Variable;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("protocol violation in `{constraint}`: {message}")]
    ProtocolViolation { constraint: String, message: String },

    #[error("`{kind}` has no attribute named `{attribute}`")]
    UnknownAttribute { kind: String, attribute: String },

    #[error("`{kind}` requires attribute `{attribute}`")]
    MissingAttribute { kind: String, attribute: String },

    #[error("`{kind}` accepts at most {max} {slot}, got {got}")]
    Arity {
        kind: String,
        slot: &'static str,
        max: usize,
        got: usize,
    },

    #[error("provider `{0}` is already registered")]
    DuplicateProvider(String),

    #[error("no provider named `{0}`")]
    UnknownProvider(String),

    #[error("no constraint can bind {variable} at its position in the variable order")]
    NoProposer { variable: Variable },

    #[error("{variable} is outside the query's {count} variables")]
    VariableOutOfRange { variable: Variable, count: usize },

    #[error("fact index snapshot: {0}")]
    Snapshot(String),

    #[error("invalid join config: {0}")]
    Config(#[from] serde_json::Error),
}

impl JoinError {
    pub fn protocol(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        JoinError::ProtocolViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

impl From<bincode::Error> for JoinError {
    fn from(err: bincode::Error) -> Self {
        JoinError::Snapshot(err.to_string())
    }
}

impl From<std::io::Error> for JoinError {
    fn from(err: std::io::Error) -> Self {
        JoinError::Snapshot(err.to_string())
    }
}

pub type Result<T, E = JoinError> = std::result::Result<T, E>;
