use crate::access::AccessController;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Wire request that starts or addresses a tunnel session.
#[derive(Debug, Clone)]
pub struct HelloRequest {
    pub client_id: Uuid,
    pub token_id: Uuid,
    pub user_token: Vec<u8>,
    pub encrypted_client_id: [u8; 16],
}

/// Who displaced a session, from the displaced session's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuppressedBy {
    /// Never suppressed (still live, or disposed for another reason).
    None,
    /// The same `client_id` reconnected (self-suppression).
    YourSelf,
    /// A different client hit the same access's concurrency quota.
    Other,
}

/// Per-client live tunnel state, owned by the [`super::SessionManager`].
///
/// Invariants: `is_disposed ⇒ dispose_time.is_some()`; the transition to
/// disposed is one-way; `session_id` is stable and unique for the process
/// lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u64,
    pub client_id: Uuid,
    pub access_controller: Arc<AccessController>,
    pub created_time: DateTime<Utc>,
    pub dispose_time: Option<DateTime<Utc>>,
    pub is_disposed: bool,
    pub suppressed_by: SuppressedBy,
    pub suppressed_by_client_id: Option<Uuid>,
    pub suppressed_to_client_id: Option<Uuid>,
}

impl Session {
    pub fn new(
        session_id: u64,
        client_id: Uuid,
        access_controller: Arc<AccessController>,
        suppressed_to_client_id: Option<Uuid>,
    ) -> Self {
        Self {
            session_id,
            client_id,
            access_controller,
            created_time: Utc::now(),
            dispose_time: None,
            is_disposed: false,
            suppressed_by: SuppressedBy::None,
            suppressed_by_client_id: None,
            suppressed_to_client_id,
        }
    }

    /// Idempotent disposal. A second call is a no-op and preserves the
    /// original `dispose_time`/`suppressed_by`.
    pub fn dispose(&mut self, suppressed_by: SuppressedBy, suppressed_by_client_id: Option<Uuid>) {
        if self.is_disposed {
            return;
        }
        self.is_disposed = true;
        self.dispose_time = Some(Utc::now());
        self.suppressed_by = suppressed_by;
        self.suppressed_by_client_id = suppressed_by_client_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Access, AccessStatusCode, AccessUsage};

    fn controller() -> Arc<AccessController> {
        Arc::new(AccessController::new(Access {
            access_id: Uuid::new_v4(),
            secret: vec![0u8; 16],
            max_client_count: 0,
            status_code: AccessStatusCode::Ok,
            message: "ok".into(),
            usage: AccessUsage::unlimited(),
        }))
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut session = Session::new(1, Uuid::new_v4(), controller(), None);
        session.dispose(SuppressedBy::Other, Some(Uuid::new_v4()));
        let first_dispose_time = session.dispose_time;
        let first_suppressor = session.suppressed_by_client_id;

        // Second call must not overwrite the original cause.
        session.dispose(SuppressedBy::YourSelf, Some(Uuid::new_v4()));

        assert!(session.is_disposed);
        assert_eq!(session.dispose_time, first_dispose_time);
        assert_eq!(session.suppressed_by, SuppressedBy::Other);
        assert_eq!(session.suppressed_by_client_id, first_suppressor);
    }

    #[test]
    fn fresh_session_is_not_disposed() {
        let session = Session::new(42, Uuid::new_v4(), controller(), None);
        assert!(!session.is_disposed);
        assert!(session.dispose_time.is_none());
        assert_eq!(session.suppressed_by, SuppressedBy::None);
    }
}
