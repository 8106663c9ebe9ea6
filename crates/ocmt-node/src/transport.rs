//! The `reqwest`-based LIVE-tier peer transport (§4.4), and the explicitly
//! out-of-scope DELEGATED handshake seam (§9 open question 4).

use async_trait::async_trait;
use ocmt_capability::{DelegationTransport, PeerTransport, TransportError};
use ocmt_crypto::PublicKey;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Resolves a peer container's HTTP endpoint from its identity public key.
/// How peers publish this mapping is a directory concern out of this
/// core's scope, mirroring `ocmt_sync::SubjectKeyDirectory`.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn endpoint_url(&self, issuer: PublicKey) -> Option<String>;
}

/// Dispatches a LIVE capability's `execute` call over HTTP to the issuer's
/// container, grounded on the same `Client::builder().timeout(..)` pattern
/// used for every outbound peer call in this stack.
pub struct HttpPeerTransport {
    http: reqwest::Client,
    directory: Arc<dyn PeerDirectory>,
}

impl HttpPeerTransport {
    pub fn new(directory: Arc<dyn PeerDirectory>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self { http, directory }
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn call(&self, issuer: PublicKey, operation: &str, params: &Value) -> Result<Value, TransportError> {
        let base = self
            .directory
            .endpoint_url(issuer)
            .await
            .ok_or_else(|| TransportError::Unreachable("no endpoint on file for issuer".to_string()))?;
        let url = format!("{}/capabilities/execute-live", base.trim_end_matches('/'));

        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "operation": operation, "params": params }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unreachable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Unreachable(format!("peer responded {}", response.status())));
        }
        response.json().await.map_err(|e| TransportError::Unreachable(e.to_string()))
    }
}

/// DELEGATED's handshake is out of this core's scope (§9 open question 4):
/// this always fails, marking the seam a hosting application replaces with
/// its own wrapped-credential transport.
pub struct UnimplementedDelegationTransport;

#[async_trait]
impl DelegationTransport for UnimplementedDelegationTransport {
    async fn execute(
        &self,
        _wrapped_credential: &[u8],
        _operation: &str,
        _params: &Value,
    ) -> Result<Value, TransportError> {
        Err(TransportError::Unreachable("delegated transport not configured".to_string()))
    }
}
