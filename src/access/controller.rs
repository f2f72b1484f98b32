use super::{Access, AccessStatusCode, AccessUsage, ResponseCode};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Owns one [`Access`] record on behalf of every live session that carries
/// its `access_id`. Shared by `Arc`; its lifetime is the longest-living
/// session referencing it (see the controller index in
/// [`crate::session::SessionManager`]).
#[derive(Debug)]
pub struct AccessController {
    access_id: Uuid,
    access: RwLock<Access>,
}

impl AccessController {
    pub fn new(access: Access) -> Self {
        Self {
            access_id: access.access_id,
            access: RwLock::new(access),
        }
    }

    pub fn access_id(&self) -> Uuid {
        self.access_id
    }

    /// Replace the held access record in place. Called whenever a new
    /// session joins this controller, or when the backend reports updated
    /// usage/status for an existing one.
    pub async fn refresh(&self, fresh: Access) {
        debug_assert_eq!(fresh.access_id, self.access_id);
        *self.access.write().await = fresh;
    }

    pub async fn status(&self) -> AccessStatusCode {
        self.access.read().await.status_code
    }

    pub async fn response_code(&self) -> ResponseCode {
        self.access.read().await.response_code()
    }

    pub async fn usage(&self) -> AccessUsage {
        self.access.read().await.usage
    }

    pub async fn message(&self) -> String {
        self.access.read().await.message.clone()
    }

    pub async fn max_client_count(&self) -> u32 {
        self.access.read().await.max_client_count
    }

    pub async fn secret(&self) -> Vec<u8> {
        self.access.read().await.secret.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_access(status: AccessStatusCode) -> Access {
        Access {
            access_id: Uuid::new_v4(),
            secret: vec![0u8; 16],
            max_client_count: 2,
            status_code: status,
            message: "ok".into(),
            usage: AccessUsage::unlimited(),
        }
    }

    #[tokio::test]
    async fn refresh_replaces_record_in_place() {
        let access = sample_access(AccessStatusCode::Ok);
        let access_id = access.access_id;
        let controller = AccessController::new(access);

        assert_eq!(controller.status().await, AccessStatusCode::Ok);

        let mut updated = sample_access(AccessStatusCode::Expired);
        updated.access_id = access_id;
        controller.refresh(updated).await;

        assert_eq!(controller.status().await, AccessStatusCode::Expired);
        assert_eq!(controller.response_code().await, ResponseCode::AccessError);
    }
}
