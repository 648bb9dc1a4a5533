//! Invocation errors

use thiserror::Error;

/// The recoverable failure class of an operation invocation.
///
/// These are the failures that a `query` envelope reports back as a
/// `queryError` reply; every other error class is fatal for the envelope.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("no such operation: {0}")]
    UnknownOp(String),

    #[error("{op} expects {expected} arguments, got {got}")]
    Arity {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("{op} argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        op: String,
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{op}: {message}")]
    Failed { op: String, message: String },
}
