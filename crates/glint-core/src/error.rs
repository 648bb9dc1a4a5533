//! Bridge errors

use glint_gl::{InvokeError, TypedViewError};
use thiserror::Error;

/// Failures surfaced while processing one envelope.
///
/// Exactly one class is recoverable: invocation-type errors, which the
/// `query` dispatch path converts into a `queryError` reply. Everything
/// else is fatal for the envelope and propagates to the session loop.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("unknown buffer type key: {0}")]
    UnknownBufferKind(String),

    #[error("buffer reference with no buffers remaining")]
    BufferUnderflow,

    #[error(transparent)]
    MisalignedView(#[from] TypedViewError),

    #[error("query with an empty instruction list")]
    EmptyBatch,
}

impl BridgeError {
    /// The single classification point for the reply-vs-fatal split.
    ///
    /// An unknown buffer type key is grouped with invocation-type errors:
    /// like a bad operation name, it is a malformed call rather than
    /// missing data.
    pub fn is_invocation_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Invoke(_) | BridgeError::UnknownBufferKind(_)
        )
    }
}
