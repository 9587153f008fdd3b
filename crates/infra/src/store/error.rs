use thiserror::Error;

/// Storage-level failure.
///
/// Anything here is an infrastructure problem except `Constraint`, which means
/// the database refused the data (e.g. a dangling payment method reference).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed in {operation}: {message}")]
    Query {
        operation: &'static str,
        message: String,
    },

    #[error("constraint violated in {operation}: {message}")]
    Constraint {
        operation: &'static str,
        message: String,
    },

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn query(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            operation,
            message: message.into(),
        }
    }

    pub fn constraint(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Constraint {
            operation,
            message: message.into(),
        }
    }
}
