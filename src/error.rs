use thiserror::Error;

use crate::backend::BackendError;
use crate::template::CompileError;

/// Everything that can go wrong between rendering a statement and capturing
/// its scalar. Each failure is logged where it is detected; callers receive
/// the variant and must not retry automatically.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Escaped or literal content exceeded the precomputed render budget.
    #[error("escape budget exhausted after $({})", .variable.unwrap_or("<leading literal>"))]
    BufferExhausted { variable: Option<&'static str> },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("backend timed out waiting for a result")]
    Timeout,

    /// A previous result is still undrained on this connection; the new call
    /// was refused without touching the backend.
    #[error("a previous result is still pending on this connection")]
    ResultPending,

    #[error("no backend name configured")]
    MissingBackend,

    #[error("not connected to any backend")]
    NotConnected,

    /// Distinct from "ran but failed": nothing is configured for this kind.
    #[error("no statement configured for {0}")]
    NoStatement(&'static str),

    #[error("protocol violation: {0}")]
    Protocol(String),
}
