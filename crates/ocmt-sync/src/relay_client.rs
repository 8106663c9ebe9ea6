//! `reqwest`-based client for a relay hosted as a separate process (§6). A
//! drop-in alternative to `ocmt_relay::LocalRelay` behind the same
//! `RelayService` trait, so nothing above this layer needs to know which one
//! it is talking to.

use async_trait::async_trait;
use ocmt_capability::{EncryptedSnapshot, SignedRevocation};
use ocmt_core::CapabilityId;
use ocmt_crypto::PublicKey;
use ocmt_relay::{IsRevokedResult, RelayError, RelayService, Result as RelayResult};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Talks to a relay process's HTTP surface (§6: `revocations.*` and
/// `snapshots.*`). Every call maps transport failures to
/// `RelayError::Network` rather than panicking or retrying — retry policy is
/// the caller's job, matching how `ocmt-capability`'s transports stay
/// retry-free at this layer.
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self { base_url: base_url.into(), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> RelayResult<Option<T>> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RelayError::Network(format!("relay responded {}", response.status())));
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| RelayError::Network(e.to_string()))
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> RelayResult<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RelayError::Network(format!("relay responded {}", response.status())));
        }
        response.json().await.map_err(|e| RelayError::Network(e.to_string()))
    }
}

#[derive(serde::Serialize)]
struct ListRevocationsQuery<'a> {
    revoked_by: Option<&'a PublicKey>,
    limit: Option<usize>,
    offset: usize,
}

#[async_trait]
impl RelayService for RelayClient {
    async fn add_revocation(&self, record: SignedRevocation) -> RelayResult<SignedRevocation> {
        self.post_json("revocations", &record).await
    }

    async fn is_revoked(&self, id: CapabilityId) -> RelayResult<IsRevokedResult> {
        self.get_json(&format!("revocations/{id}/status"))
            .await?
            .ok_or_else(|| RelayError::Network("relay returned no status for revocation check".to_string()))
    }

    async fn list_revocations(
        &self,
        revoked_by: Option<PublicKey>,
        limit: Option<usize>,
        offset: usize,
    ) -> RelayResult<Vec<SignedRevocation>> {
        let query = ListRevocationsQuery { revoked_by: revoked_by.as_ref(), limit, offset };
        self.post_json("revocations/list", &query).await
    }

    async fn store_snapshot(&self, snapshot: EncryptedSnapshot) -> RelayResult<()> {
        let _: serde_json::Value = self.post_json("snapshots", &snapshot).await?;
        Ok(())
    }

    async fn get_snapshot(&self, id: CapabilityId) -> RelayResult<Option<EncryptedSnapshot>> {
        self.get_json(&format!("snapshots/{id}")).await
    }

    async fn delete_snapshot(&self, id: CapabilityId) -> RelayResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("snapshots/{id}")))
            .send()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(RelayError::Network(format!("relay responded {}", response.status())));
        }
        Ok(())
    }
}
