use super::types::{HelloRequest, Session, SuppressedBy};
use crate::access::{
    verify_admission_proof, Access, AccessBackend, AccessController, ClientIdentity, Tracker,
};
use crate::utils::error::{Result, SessionError};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(feature = "metrics")]
use super::metrics;

/// Tunables the manager needs that don't belong to the wire/config surface
/// directly (see [`crate::config::Config`] for where these are sourced from).
#[derive(Debug, Clone, Copy)]
pub struct SessionManagerConfig {
    pub session_timeout: Duration,
    pub reap_interval: Duration,
    pub max_concurrent_sessions: Option<usize>,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(300),
            max_concurrent_sessions: None,
        }
    }
}

type SessionHandle = Arc<RwLock<Session>>;

/// Owns every live (and recently-disposed, pending reap) session, plus the
/// secondary indices that keep lookups off the O(n) path:
///
/// - `client_index`: last session admitted for a given `client_id`.
/// - `access_index`: every session currently sharing an `access_id`, used to
///   enforce per-access concurrency quotas without scanning `sessions`.
/// - `controller_index`: a weak cache of `AccessController`s, so a second
///   client on the same access reuses the same controller instead of minting
///   a duplicate one that would drift from the first.
pub struct SessionManager {
    sessions: DashMap<u64, SessionHandle>,
    client_index: DashMap<Uuid, u64>,
    access_index: DashMap<Uuid, DashSet<u64>>,
    controller_index: DashMap<Uuid, Weak<AccessController>>,
    next_session_id: AtomicU64,
    last_reap: Mutex<DateTime<Utc>>,
    backend: Arc<dyn AccessBackend>,
    tracker: Arc<dyn Tracker>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AccessBackend>,
        tracker: Arc<dyn Tracker>,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            client_index: DashMap::new(),
            access_index: DashMap::new(),
            controller_index: DashMap::new(),
            next_session_id: AtomicU64::new(1),
            last_reap: Mutex::new(Utc::now()),
            backend,
            tracker,
            config,
        }
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Admit a new tunnel session for a Hello, running the full admission
    /// algorithm: access validation, reaping, suppression, allocation.
    pub async fn create_session(&self, hello: HelloRequest, client_ip: IpAddr) -> Result<Session> {
        let identity = ClientIdentity {
            client_id: hello.client_id,
            client_ip,
            token_id: hello.token_id,
            user_token: hello.user_token,
        };

        let controller = self
            .validate_admission(&identity, &hello.encrypted_client_id)
            .await?;

        self.reap_if_due().await;

        let mut suppressed = self.find_live_by_client(identity.client_id).await;
        let mut cause = SuppressedBy::YourSelf;

        if suppressed.is_none() {
            let max_client_count = controller.max_client_count().await;
            if max_client_count > 0 {
                suppressed = self
                    .find_quota_candidate(controller.access_id(), max_client_count)
                    .await;
                cause = SuppressedBy::Other;
            }
        }

        if suppressed.is_none() {
            if let Some(max) = self.config.max_concurrent_sessions {
                if self.sessions.len() >= max {
                    #[cfg(feature = "metrics")]
                    metrics::record_rejected_admission("capacity");
                    return Err(SessionError::CapacityExceeded {
                        max_concurrent_sessions: max,
                    });
                }
            }
        }

        let mut suppressed_to_client_id = None;
        if let Some((old_id, handle)) = suppressed {
            let mut guard = handle.write().await;
            guard.dispose(cause, Some(identity.client_id));
            suppressed_to_client_id = Some(guard.client_id);
            drop(guard);

            #[cfg(feature = "metrics")]
            metrics::record_suppression(if cause == SuppressedBy::YourSelf {
                "self"
            } else {
                "quota"
            });

            debug!(old_session_id = old_id, new_client_id = %identity.client_id, ?cause, "session suppressed");
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(
            session_id,
            identity.client_id,
            controller.clone(),
            suppressed_to_client_id,
        );

        self.sessions
            .insert(session_id, Arc::new(RwLock::new(session.clone())));
        self.client_index.insert(identity.client_id, session_id);
        self.access_index
            .entry(controller.access_id())
            .or_insert_with(DashSet::new)
            .insert(session_id);

        #[cfg(feature = "metrics")]
        metrics::record_session_start();

        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            tracker.track_event("session", "created").await;
        });

        info!(session_id, client_id = %identity.client_id, "session created");
        Ok(session)
    }

    /// Resolve a session by its `client_id`, surfacing the same closure
    /// semantics as [`Self::get_by_id`] when a disposed session still sits in
    /// the index awaiting reap.
    pub async fn find_by_client_id(&self, client_id: Uuid) -> Result<Session> {
        let session_id = self
            .client_index
            .get(&client_id)
            .map(|entry| *entry.value())
            .ok_or(SessionError::SessionNotFound)?;
        self.get_by_id(session_id).await
    }

    /// Resolve a session by its `session_id`. A live access record that has
    /// turned non-OK disposes the session in place before this call returns.
    pub async fn get_by_id(&self, session_id: u64) -> Result<Session> {
        let handle = self
            .sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::SessionNotFound)?;

        {
            let mut guard = handle.write().await;
            if !guard.is_disposed {
                let status = guard.access_controller.status().await;
                if !status.is_ok() {
                    guard.dispose(SuppressedBy::None, None);
                }
            }
        }

        let guard = handle.read().await;
        if guard.is_disposed {
            let usage = guard.access_controller.usage().await;
            let reason = match guard.suppressed_by {
                SuppressedBy::YourSelf => "reconnected from the same client".to_string(),
                SuppressedBy::Other => {
                    "displaced by another client sharing this access".to_string()
                }
                SuppressedBy::None => {
                    let message = guard.access_controller.message().await;
                    format!("access no longer valid: {message}")
                }
            };
            return Err(SessionError::SessionClosed {
                reason,
                suppressed_by: guard.suppressed_by,
                suppressed_by_client_id: guard.suppressed_by_client_id,
                usage: Some(usage),
            });
        }

        Ok(guard.clone())
    }

    /// Dispose every live session. Called on shutdown.
    pub async fn dispose(&self) {
        let handles: Vec<SessionHandle> = self.sessions.iter().map(|e| e.value().clone()).collect();
        for handle in handles {
            let mut guard = handle.write().await;
            guard.dispose(SuppressedBy::None, None);
        }
    }

    /// Validate a Hello against the access backend, returning the (possibly
    /// newly-minted) controller for that access. Refreshes an existing
    /// controller in place rather than creating a duplicate.
    async fn validate_admission(
        &self,
        identity: &ClientIdentity,
        encrypted_client_id: &[u8; 16],
    ) -> Result<Arc<AccessController>> {
        let access = self
            .backend
            .get_access(identity)
            .await
            .map_err(SessionError::Config)?
            .ok_or(SessionError::TokenNotFound)?;

        if !verify_admission_proof(&access.secret, identity.client_id, encrypted_client_id)
            .unwrap_or(false)
        {
            #[cfg(feature = "metrics")]
            metrics::record_rejected_admission("bad_signature");
            return Err(SessionError::InvalidSignature);
        }

        if !access.status_code.is_ok() {
            #[cfg(feature = "metrics")]
            metrics::record_rejected_admission("access_error");
            return Err(SessionError::AccessError {
                status: access.status_code,
                usage: access.usage,
                message: access.message.clone(),
            });
        }

        Ok(self.controller_for(access).await)
    }

    /// Look up (or create) the `AccessController` for an `access_id`,
    /// refreshing it with the freshly-fetched record either way.
    async fn controller_for(&self, access: Access) -> Arc<AccessController> {
        let access_id = access.access_id;

        if let Some(weak) = self.controller_index.get(&access_id) {
            if let Some(controller) = weak.upgrade() {
                controller.refresh(access).await;
                return controller;
            }
        }

        let controller = Arc::new(AccessController::new(access));
        self.controller_index
            .insert(access_id, Arc::downgrade(&controller));
        controller
    }

    async fn find_live_by_client(&self, client_id: Uuid) -> Option<(u64, SessionHandle)> {
        let session_id = *self.client_index.get(&client_id)?.value();
        let handle = self.sessions.get(&session_id)?.value().clone();
        let is_disposed = handle.read().await.is_disposed;
        if is_disposed {
            None
        } else {
            Some((session_id, handle))
        }
    }

    /// Among sessions sharing `access_id`, find the oldest still-live one if
    /// the live count has reached `max_client_count`.
    async fn find_quota_candidate(
        &self,
        access_id: Uuid,
        max_client_count: u32,
    ) -> Option<(u64, SessionHandle)> {
        let ids: Vec<u64> = self
            .access_index
            .get(&access_id)
            .map(|set| set.iter().map(|id| *id).collect())
            .unwrap_or_default();

        let mut live: Vec<(u64, SessionHandle, DateTime<Utc>)> = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(handle) = self.sessions.get(&id).map(|e| e.value().clone()) else {
                continue;
            };
            let guard = handle.read().await;
            if !guard.is_disposed {
                live.push((id, handle.clone(), guard.created_time));
            }
        }

        if live.len() < max_client_count as usize {
            return None;
        }

        live.into_iter()
            .min_by_key(|(id, _, created)| (*created, *id))
            .map(|(id, handle, _)| (id, handle))
    }

    async fn reap_if_due(&self) {
        {
            let mut last = self.last_reap.lock().expect("last_reap mutex poisoned");
            let now = Utc::now();
            let elapsed = now.signed_duration_since(*last);
            if elapsed
                < chrono::Duration::from_std(self.config.reap_interval)
                    .unwrap_or(chrono::Duration::zero())
            {
                return;
            }
            *last = now;
        }
        self.reap_expired().await;
    }

    async fn reap_expired(&self) {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(self.config.session_timeout)
            .unwrap_or(chrono::Duration::zero());

        let handles: Vec<(u64, SessionHandle)> = self
            .sessions
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut stale = Vec::new();
        for (id, handle) in handles {
            let guard = handle.read().await;
            if let Some(dispose_time) = guard.dispose_time {
                if now.signed_duration_since(dispose_time) >= timeout {
                    stale.push(id);
                }
            }
        }

        let reaped = stale.len() as u64;
        for id in stale {
            self.remove_session(id).await;
        }

        #[cfg(feature = "metrics")]
        metrics::record_reaped(reaped);
        if reaped > 0 {
            warn!(count = reaped, "reaped disposed sessions");
        }
    }

    async fn remove_session(&self, session_id: u64) {
        let Some((_, handle)) = self.sessions.remove(&session_id) else {
            return;
        };
        let guard = handle.read().await;
        let client_id = guard.client_id;
        let access_id = guard.access_controller.access_id();
        #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
        let duration = guard
            .dispose_time
            .map(|t| (t - guard.created_time).num_seconds());
        drop(guard);

        self.client_index
            .remove_if(&client_id, |_, v| *v == session_id);
        if let Some(set) = self.access_index.get(&access_id) {
            set.remove(&session_id);
        }

        #[cfg(feature = "metrics")]
        metrics::record_session_close(duration);
    }
}
