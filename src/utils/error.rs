use crate::access::{AccessStatusCode, AccessUsage};
use crate::session::SuppressedBy;
use thiserror::Error;
use uuid::Uuid;

/// Error currency for the session core: everything admission, lookup and
/// reuse can fail with surfaces through this type.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no access record for token")]
    TokenNotFound,

    #[error("admission proof mismatch")]
    InvalidSignature,

    #[error("access is not usable: {status:?} ({message})")]
    AccessError {
        status: AccessStatusCode,
        usage: AccessUsage,
        message: String,
    },

    #[error("session closed: {reason}")]
    SessionClosed {
        reason: String,
        suppressed_by: SuppressedBy,
        suppressed_by_client_id: Option<Uuid>,
        usage: Option<AccessUsage>,
    },

    #[error("session not found")]
    SessionNotFound,

    #[error("server at capacity ({max_concurrent_sessions} concurrent sessions)")]
    CapacityExceeded { max_concurrent_sessions: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
