//! Client identity binding and access admission.
//!
//! An [`AccessController`] owns one [`Access`] record and is shared by every
//! live [`crate::session::Session`] carrying the same `access_id`. The
//! backend that actually issues and refreshes `Access` records lives outside
//! this crate (C1 in the design doc) and is reached through the
//! [`AccessBackend`] trait so tests can substitute an in-memory fake.

mod controller;
mod crypto;
mod static_backend;

pub use controller::AccessController;
pub use crypto::{compute_admission_proof, verify_admission_proof, CryptoError};
pub use static_backend::StaticAccessBackend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Immutable identity derived from an incoming Hello. Built once, never
/// mutated for the life of the connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: Uuid,
    pub client_ip: IpAddr,
    pub token_id: Uuid,
    pub user_token: Vec<u8>,
}

/// Lifecycle/entitlement state of an [`Access`] record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatusCode {
    Ok,
    Expired,
    TrafficOverUsage,
    RevokedByAdmin,
}

impl AccessStatusCode {
    pub fn is_ok(self) -> bool {
        matches!(self, AccessStatusCode::Ok)
    }
}

/// Response code surfaced to the caller alongside admission/lookup failures.
/// Distinct from `AccessStatusCode`: it classifies *why the call failed*,
/// not the raw access state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    Ok,
    AccessError,
    SessionClosed,
}

/// Usage snapshot attached to both successful and failed responses so a
/// client can render a quota/expiry banner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccessUsage {
    pub used_traffic: u64,
    pub max_traffic: u64,
    pub expiration_time: Option<DateTime<Utc>>,
}

impl AccessUsage {
    pub fn unlimited() -> Self {
        Self {
            used_traffic: 0,
            max_traffic: 0,
            expiration_time: None,
        }
    }
}

/// Record returned by the access backend (C1). Owned by the
/// `AccessController` that holds it; refreshed in place on every admission
/// that shares the same `access_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    pub access_id: Uuid,
    pub secret: Vec<u8>,
    pub max_client_count: u32,
    pub status_code: AccessStatusCode,
    pub message: String,
    pub usage: AccessUsage,
}

impl Access {
    pub fn response_code(&self) -> ResponseCode {
        match self.status_code {
            AccessStatusCode::Ok => ResponseCode::Ok,
            _ => ResponseCode::AccessError,
        }
    }
}

/// External access backend contract (C1). `add_usage` is not called from
/// this crate's admission path, but the controller's status recomputation
/// depends on the backend keeping usage counters monotone.
#[async_trait::async_trait]
pub trait AccessBackend: Send + Sync {
    async fn get_access(
        &self,
        identity: &ClientIdentity,
    ) -> std::result::Result<Option<Access>, String>;

    async fn add_usage(
        &self,
        access_id: Uuid,
        delta_traffic: u64,
    ) -> std::result::Result<Access, String>;
}

/// Fire-and-forget tracking sink (analytics/telemetry). Errors are always
/// swallowed by the caller; see design note on tracking events.
#[async_trait::async_trait]
pub trait Tracker: Send + Sync {
    async fn track_event(&self, category: &str, action: &str);
}

/// A tracker that discards every event. Used where no tracking backend is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracker;

#[async_trait::async_trait]
impl Tracker for NullTracker {
    async fn track_event(&self, _category: &str, _action: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_status_maps_to_response_code() {
        let mut access = Access {
            access_id: Uuid::new_v4(),
            secret: vec![0u8; 16],
            max_client_count: 0,
            status_code: AccessStatusCode::Ok,
            message: "ok".into(),
            usage: AccessUsage::unlimited(),
        };
        assert_eq!(access.response_code(), ResponseCode::Ok);

        access.status_code = AccessStatusCode::Expired;
        assert_eq!(access.response_code(), ResponseCode::AccessError);
    }
}
