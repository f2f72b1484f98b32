//! A file-backed [`AccessBackend`] for standalone deployments that have no
//! separate access-issuing service: access records are loaded once from a
//! TOML file keyed by `token_id`, mirroring how the teacher binary loaded
//! its static user list.

use super::{Access, AccessBackend, AccessStatusCode, AccessUsage, ClientIdentity};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct StaticAccessFile {
    #[serde(default)]
    access: Vec<StaticAccessEntry>,
}

#[derive(Debug, Deserialize)]
struct StaticAccessEntry {
    token_id: Uuid,
    access_id: Uuid,
    secret: String,
    #[serde(default)]
    max_client_count: u32,
    #[serde(default)]
    max_traffic: u64,
}

pub struct StaticAccessBackend {
    by_token: RwLock<HashMap<Uuid, Access>>,
}

impl StaticAccessBackend {
    pub fn empty() -> Self {
        Self {
            by_token: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        let file: StaticAccessFile =
            toml::from_str(content).map_err(|e| format!("invalid static access file: {e}"))?;

        let by_token = file
            .access
            .into_iter()
            .map(|entry| {
                let access = Access {
                    access_id: entry.access_id,
                    secret: entry.secret.into_bytes(),
                    max_client_count: entry.max_client_count,
                    status_code: AccessStatusCode::Ok,
                    message: "ok".to_string(),
                    usage: AccessUsage {
                        used_traffic: 0,
                        max_traffic: entry.max_traffic,
                        expiration_time: None,
                    },
                };
                (entry.token_id, access)
            })
            .collect();

        Ok(Self {
            by_token: RwLock::new(by_token),
        })
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("failed to read static access file: {e}"))?;
        Self::from_toml_str(&content)
    }
}

#[async_trait::async_trait]
impl AccessBackend for StaticAccessBackend {
    async fn get_access(
        &self,
        identity: &ClientIdentity,
    ) -> std::result::Result<Option<Access>, String> {
        Ok(self.by_token.read().await.get(&identity.token_id).cloned())
    }

    async fn add_usage(
        &self,
        access_id: Uuid,
        delta_traffic: u64,
    ) -> std::result::Result<Access, String> {
        let mut guard = self.by_token.write().await;
        let access = guard
            .values_mut()
            .find(|a| a.access_id == access_id)
            .ok_or_else(|| "unknown access".to_string())?;
        access.usage.used_traffic += delta_traffic;
        Ok(access.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn loads_entries_keyed_by_token_id() {
        let toml = r#"
            [[access]]
            token_id = "00000000-0000-0000-0000-000000000001"
            access_id = "00000000-0000-0000-0000-0000000000aa"
            secret = "0123456789abcdef"
            max_client_count = 2
            max_traffic = 1000000
        "#;
        let backend = StaticAccessBackend::from_toml_str(toml).unwrap();

        let identity = ClientIdentity {
            client_id: Uuid::new_v4(),
            client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            token_id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
            user_token: vec![],
        };

        let access = backend.get_access(&identity).await.unwrap().unwrap();
        assert_eq!(access.max_client_count, 2);
    }

    #[tokio::test]
    async fn unknown_token_returns_none() {
        let backend = StaticAccessBackend::empty();
        let identity = ClientIdentity {
            client_id: Uuid::new_v4(),
            client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            token_id: Uuid::new_v4(),
            user_token: vec![],
        };
        assert!(backend.get_access(&identity).await.unwrap().is_none());
    }
}
