//! REMS entitlement lookups: does a user hold a permit for a permit-gated dataset.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::client::ClientError;
use crate::config::RemsConfig;

#[async_trait]
pub trait PermitRegistry: Send + Sync {
    async fn has_permit(&self, record_id: &str, user_id: &str) -> Result<bool, ClientError>;
}

/// Used when REMS is switched off: nobody holds a permit.
pub struct NoPermits;

#[async_trait]
impl PermitRegistry for NoPermits {
    async fn has_permit(&self, _record_id: &str, _user_id: &str) -> Result<bool, ClientError> { Ok(false) }
}

pub struct RemsClient {
    client: reqwest::Client,
    base: String,
    api_key: String,
}

const SERVICE: &str = "rems";

impl RemsClient {
    pub fn new(client: reqwest::Client, cfg: &RemsConfig) -> Result<Self, ClientError> {
        if cfg.url.is_empty() {
            return Err(ClientError::Config { service: SERVICE, message: "FINDER_REMS_URL is empty".into() });
        }
        Ok(Self { client, base: cfg.url.clone(), api_key: cfg.api_key.clone() })
    }
}

#[async_trait]
impl PermitRegistry for RemsClient {
    async fn has_permit(&self, record_id: &str, user_id: &str) -> Result<bool, ClientError> {
        let url = format!("{}/api/entitlements", self.base);
        let resp = self
            .client
            .get(url)
            .query(&[("resource", record_id), ("user", user_id)])
            .header("x-rems-api-key", &self.api_key)
            .header("x-rems-user-id", "owner")
            .header("accept", "application/json")
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status { service: SERVICE, status: status.as_u16() });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })?;
        let granted = entitlements_granted(&body)
            .ok_or_else(|| ClientError::Decode { service: SERVICE, message: "expected an array of entitlements".into() })?;
        debug!(target: "rems", record_id, granted, "entitlement lookup");
        Ok(granted)
    }
}

fn entitlements_granted(body: &Value) -> Option<bool> { body.as_array().map(|a| !a.is_empty()) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entitlement_array_semantics() {
        assert_eq!(entitlements_granted(&json!([])), Some(false));
        assert_eq!(entitlements_granted(&json!([{"resource": "cr-1"}])), Some(true));
        assert_eq!(entitlements_granted(&json!({"error": "x"})), None);
    }

    #[test]
    fn client_requires_url() {
        let cfg = RemsConfig { enabled: true, url: String::new(), api_key: "k".into() };
        assert!(RemsClient::new(reqwest::Client::new(), &cfg).is_err());
    }

    #[tokio::test]
    async fn disabled_registry_grants_nothing() {
        assert!(!NoPermits.has_permit("cr-1", "u").await.unwrap());
    }
}
