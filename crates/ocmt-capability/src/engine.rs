//! The capability engine: issue, verify, revoke, list, and execute (§4.4).

use crate::error::{CapabilityError, Result};
use crate::scope::{self, ParamAllowList};
use crate::token::{CapabilityHeader, CapabilityToken};
use crate::transport::{
    CachedSnapshotSource, DelegationTransport, PeerTransport, RevocationChecker, RevocationPublisher,
};
use ocmt_core::{CapabilityId, Clock, SystemClock, Tier};
use ocmt_crypto::PublicKey;
use ocmt_vault::{CapabilityScope, CapabilitySummary, IssuedCapabilityRecord, Vault};
use serde_json::Value;
use std::time::Duration;

/// Retry policy around transport calls only, never local verification or
/// scope checks (§4.4).
const RETRY_DELAYS_MS: [u64; 3] = [100, 400, 1600];

/// Result of `issue`.
pub struct IssueResult {
    pub id: CapabilityId,
    pub token: String,
}

/// Result of `revoke`.
pub struct RevokeOutcome {
    pub success: bool,
    pub relay_notified: bool,
    pub relay_error: Option<String>,
}

/// Everything `execute` needs beyond the token and operation: the injected
/// transports that let the core stay free of real network/async-runtime
/// dependencies in its tests.
pub struct ExecuteContext<'a> {
    pub peer_transport: &'a dyn PeerTransport,
    pub snapshot_source: &'a dyn CachedSnapshotSource,
    pub delegation_transport: &'a dyn DelegationTransport,
    pub revocation_checker: &'a dyn RevocationChecker,
}

pub struct CapabilityEngine {
    allow_list: ParamAllowList,
    clock: Box<dyn Clock>,
}

impl CapabilityEngine {
    pub fn new(allow_list: ParamAllowList) -> Self {
        Self { allow_list, clock: Box::new(SystemClock) }
    }

    pub fn with_clock(allow_list: ParamAllowList, clock: Box<dyn Clock>) -> Self {
        Self { allow_list, clock }
    }

    /// Draw a fresh id, sign a header over the issuer's identity, and
    /// persist the issued-capability record (§4.4 `issue`).
    pub async fn issue(
        &self,
        vault: &Vault,
        subject_public_key: PublicKey,
        resource: &str,
        scope: Vec<String>,
        tier: Tier,
        expires_in_seconds: u64,
    ) -> Result<IssueResult> {
        let identity = vault.identity().await?;
        let now = self.clock.now();
        let id = CapabilityId::random();
        let header = CapabilityHeader {
            iss: identity.public_key(),
            sub: subject_public_key,
            resource: resource.to_string(),
            scope: scope.clone(),
            tier,
            id,
            exp: now + expires_in_seconds,
            iat: now,
        };
        let signed = CapabilityToken::sign(header, &identity)?;
        let wire = signed.to_wire()?;

        let next_snapshot_due_at = match tier {
            Tier::Cached => Some(now + crate::DEFAULT_REFRESH_INTERVAL_SECS),
            _ => None,
        };

        vault
            .insert_issued_capability(
                id,
                IssuedCapabilityRecord {
                    subject_public_key,
                    resource: resource.to_string(),
                    scope,
                    tier,
                    expires_at: now + expires_in_seconds,
                    created_at: now,
                    revoked: false,
                    last_snapshot_at: None,
                    next_snapshot_due_at,
                },
            )
            .await?;

        tracing::info!(%id, resource, "capability issued");
        Ok(IssueResult { id, token: wire })
    }

    /// Parse and verify a token's signature and temporal claims (§4.4
    /// `verify`). Does not check revocation or scope — those are the
    /// caller's job at `execute` time.
    pub fn verify(&self, wire: &str, expected_subject: Option<&PublicKey>) -> Result<CapabilityToken> {
        let token = CapabilityToken::from_wire(wire)?;
        token.verify(self.clock.now(), expected_subject)?;
        Ok(token)
    }

    /// Mark an issued capability revoked and best-effort notify the relay
    /// (§4.4 `revoke`). Idempotent: revoking twice still reports success.
    pub async fn revoke(
        &self,
        vault: &Vault,
        id: CapabilityId,
        reason: Option<String>,
        publisher: &dyn RevocationPublisher,
    ) -> Result<RevokeOutcome> {
        let record = vault.get_issued_capability(id).await?.ok_or(CapabilityError::NotFound)?;
        vault.mark_issued_revoked(id).await?;

        let identity = vault.identity().await?;
        let now = self.clock.now();
        let signed = crate::revocation::SignedRevocation::sign(
            id,
            now,
            reason,
            Some(record.expires_at),
            &identity,
        )?;

        match publisher.publish(&signed).await {
            Ok(()) => Ok(RevokeOutcome { success: true, relay_notified: true, relay_error: None }),
            Err(e) => {
                tracing::warn!(%id, error = %e, "revocation relay push failed, local revocation stands");
                Ok(RevokeOutcome { success: true, relay_notified: false, relay_error: Some(e.to_string()) })
            }
        }
    }

    pub async fn list_capabilities(&self, vault: &Vault, scope: CapabilityScope) -> Result<Vec<CapabilitySummary>> {
        Ok(vault.list_capabilities(scope).await?)
    }

    /// Resolve, verify, check revocation, enforce scope, and dispatch a
    /// received capability by tier (§4.4 `execute`).
    pub async fn execute(
        &self,
        vault: &Vault,
        id: CapabilityId,
        operation: &str,
        params: serde_json::Map<String, Value>,
        ctx: ExecuteContext<'_>,
    ) -> Result<Value> {
        let record = vault.get_received_capability(id).await?.ok_or(CapabilityError::NotFound)?;
        let token = CapabilityToken::from_wire(&record.token)?;
        token.verify(self.clock.now(), None)?;

        if ctx.revocation_checker.is_revoked(id).await {
            return Err(CapabilityError::Revoked);
        }

        scope::enforce(&record.resource, &record.scope, operation, &params, &self.allow_list)?;

        match record.tier {
            Tier::Live => self.execute_live(record.issuer_public_key, operation, &params, ctx.peer_transport).await,
            Tier::Cached => self.execute_cached(id, &record, ctx.snapshot_source).await,
            Tier::Delegated => self.execute_delegated(&record, operation, &params, ctx.delegation_transport).await,
        }
    }

    async fn execute_live(
        &self,
        issuer: PublicKey,
        operation: &str,
        params: &serde_json::Map<String, Value>,
        transport: &dyn PeerTransport,
    ) -> Result<Value> {
        let params_value = Value::Object(params.clone());
        with_retries(|| transport.call(issuer, operation, &params_value)).await
    }

    /// Prefer the locally cached, already-decrypted snapshot bytes; fall
    /// back to the injected source (relay fetch + decrypt) if absent.
    async fn execute_cached(
        &self,
        id: CapabilityId,
        record: &ocmt_vault::ReceivedCapabilityRecord,
        source: &dyn CachedSnapshotSource,
    ) -> Result<Value> {
        if let Some(bytes) = &record.local_snapshot_ciphertext {
            return serde_json::from_slice(bytes)
                .map_err(|e| crate::error::VerifyError::MalformedToken(e.to_string()).into());
        }
        let bytes = with_retries(|| source.get_decrypted(id))
            .await?
            .ok_or(CapabilityError::NoSnapshotAvailable)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| crate::error::VerifyError::MalformedToken(e.to_string()).into())
    }

    async fn execute_delegated(
        &self,
        record: &ocmt_vault::ReceivedCapabilityRecord,
        operation: &str,
        params: &serde_json::Map<String, Value>,
        transport: &dyn DelegationTransport,
    ) -> Result<Value> {
        let wrapped = record
            .local_snapshot_ciphertext
            .as_deref()
            .ok_or(CapabilityError::NoSnapshotAvailable)?;
        let params_value = Value::Object(params.clone());
        with_retries(|| transport.execute(wrapped, operation, &params_value)).await
    }
}

/// Retry a fallible transport call up to 3 extra times with the schedule
/// from §4.4. Only wraps transport I/O; never the verification/scope steps
/// above it in `execute`.
async fn with_retries<F, Fut, T, E>(mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for delay_ms in RETRY_DELAYS_MS {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e.to_string());
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
    match call().await {
        Ok(value) => Ok(value),
        Err(e) => Err(CapabilityError::Transport(last_err.unwrap_or_else(|| e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use ocmt_vault::ReceivedCapabilityRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    struct NoopPeer;
    #[async_trait]
    impl PeerTransport for NoopPeer {
        async fn call(&self, _issuer: PublicKey, _op: &str, params: &Value) -> std::result::Result<Value, TransportError> {
            Ok(params.clone())
        }
    }

    struct UnreachablePeer(AtomicU32);
    #[async_trait]
    impl PeerTransport for UnreachablePeer {
        async fn call(&self, _issuer: PublicKey, _op: &str, _params: &Value) -> std::result::Result<Value, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Unreachable("offline".into()))
        }
    }

    struct NoSnapshot;
    #[async_trait]
    impl CachedSnapshotSource for NoSnapshot {
        async fn get_decrypted(&self, _id: CapabilityId) -> std::result::Result<Option<Vec<u8>>, TransportError> {
            Ok(None)
        }
    }

    struct NoDelegation;
    #[async_trait]
    impl DelegationTransport for NoDelegation {
        async fn execute(&self, _w: &[u8], _op: &str, _p: &Value) -> std::result::Result<Value, TransportError> {
            Err(TransportError::Unreachable("not used".into()))
        }
    }

    struct NeverRevoked;
    #[async_trait]
    impl RevocationChecker for NeverRevoked {
        async fn is_revoked(&self, _id: CapabilityId) -> bool {
            false
        }
    }

    struct AlwaysRevoked;
    #[async_trait]
    impl RevocationChecker for AlwaysRevoked {
        async fn is_revoked(&self, _id: CapabilityId) -> bool {
            true
        }
    }

    struct NoopPublisher;
    #[async_trait]
    impl RevocationPublisher for NoopPublisher {
        async fn publish(&self, _r: &crate::revocation::SignedRevocation) -> std::result::Result<(), TransportError> {
            Ok(())
        }
    }

    struct FailingPublisher;
    #[async_trait]
    impl RevocationPublisher for FailingPublisher {
        async fn publish(&self, _r: &crate::revocation::SignedRevocation) -> std::result::Result<(), TransportError> {
            Err(TransportError::Unreachable("relay down".into()))
        }
    }

    fn allow_list() -> ParamAllowList {
        ParamAllowList::new().allow("calendar", ["start"])
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.enc"));
        vault.initialize("correct horse battery staple").await.unwrap();
        vault.unlock("correct horse battery staple").await.unwrap();
        let engine = CapabilityEngine::new(allow_list());

        let subject = ocmt_crypto::IdentityKeyPair::generate();
        let result = engine
            .issue(&vault, subject.public_key(), "calendar", vec!["read".into()], ocmt_core::Tier::Live, 3600)
            .await
            .unwrap();

        let token = engine.verify(&result.token, None).unwrap();
        assert_eq!(token.header.resource, "calendar");
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_reports_relay_failure() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.enc"));
        vault.initialize("correct horse battery staple").await.unwrap();
        vault.unlock("correct horse battery staple").await.unwrap();
        let engine = CapabilityEngine::new(allow_list());

        let subject = ocmt_crypto::IdentityKeyPair::generate();
        let issued = engine
            .issue(&vault, subject.public_key(), "calendar", vec!["read".into()], ocmt_core::Tier::Live, 3600)
            .await
            .unwrap();

        let outcome = engine.revoke(&vault, issued.id, None, &FailingPublisher).await.unwrap();
        assert!(outcome.success);
        assert!(!outcome.relay_notified);
        assert!(outcome.relay_error.is_some());

        let second = engine.revoke(&vault, issued.id, None, &NoopPublisher).await.unwrap();
        assert!(second.success);

        let record = vault.get_issued_capability(issued.id).await.unwrap().unwrap();
        assert!(record.revoked);
    }

    #[tokio::test]
    async fn execute_live_dispatches_through_transport() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.enc"));
        vault.initialize("correct horse battery staple").await.unwrap();
        vault.unlock("correct horse battery staple").await.unwrap();
        let issuer = vault.identity().await.unwrap();
        let engine = CapabilityEngine::new(allow_list());

        let token = CapabilityToken::sign(
            CapabilityHeader {
                iss: issuer.public_key(),
                sub: issuer.public_key(),
                resource: "calendar".into(),
                scope: vec!["read".into()],
                tier: ocmt_core::Tier::Live,
                id: CapabilityId::random(),
                exp: 9_999_999_999,
                iat: 0,
            },
            &issuer,
        )
        .unwrap();
        let id = token.header.id;
        vault
            .insert_received_capability(
                id,
                ReceivedCapabilityRecord {
                    issuer_container_id: "peer-1".into(),
                    issuer_public_key: issuer.public_key(),
                    token: token.to_wire().unwrap(),
                    resource: "calendar".into(),
                    scope: vec!["read".into()],
                    tier: ocmt_core::Tier::Live,
                    expires_at: 9_999_999_999,
                    local_snapshot_ciphertext: None,
                    local_snapshot_meta: None,
                },
            )
            .await
            .unwrap();

        let mut params = serde_json::Map::new();
        params.insert("start".to_string(), json!("2026-01-01"));

        let result = engine
            .execute(
                &vault,
                id,
                "read",
                params,
                ExecuteContext {
                    peer_transport: &NoopPeer,
                    snapshot_source: &NoSnapshot,
                    delegation_transport: &NoDelegation,
                    revocation_checker: &NeverRevoked,
                },
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"start": "2026-01-01"}));
    }

    #[tokio::test]
    async fn execute_rejects_revoked_capability() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.enc"));
        vault.initialize("correct horse battery staple").await.unwrap();
        vault.unlock("correct horse battery staple").await.unwrap();
        let issuer = vault.identity().await.unwrap();
        let engine = CapabilityEngine::new(allow_list());

        let token = CapabilityToken::sign(
            CapabilityHeader {
                iss: issuer.public_key(),
                sub: issuer.public_key(),
                resource: "calendar".into(),
                scope: vec!["read".into()],
                tier: ocmt_core::Tier::Live,
                id: CapabilityId::random(),
                exp: 9_999_999_999,
                iat: 0,
            },
            &issuer,
        )
        .unwrap();
        let id = token.header.id;
        vault
            .insert_received_capability(
                id,
                ReceivedCapabilityRecord {
                    issuer_container_id: "peer-1".into(),
                    issuer_public_key: issuer.public_key(),
                    token: token.to_wire().unwrap(),
                    resource: "calendar".into(),
                    scope: vec!["read".into()],
                    tier: ocmt_core::Tier::Live,
                    expires_at: 9_999_999_999,
                    local_snapshot_ciphertext: None,
                    local_snapshot_meta: None,
                },
            )
            .await
            .unwrap();

        let result = engine
            .execute(
                &vault,
                id,
                "read",
                serde_json::Map::new(),
                ExecuteContext {
                    peer_transport: &NoopPeer,
                    snapshot_source: &NoSnapshot,
                    delegation_transport: &NoDelegation,
                    revocation_checker: &AlwaysRevoked,
                },
            )
            .await;

        assert!(matches!(result, Err(CapabilityError::Revoked)));
    }

    #[tokio::test]
    async fn execute_rejects_scope_violation_without_transport_call() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.enc"));
        vault.initialize("correct horse battery staple").await.unwrap();
        vault.unlock("correct horse battery staple").await.unwrap();
        let issuer = vault.identity().await.unwrap();
        let engine = CapabilityEngine::new(allow_list());

        let token = CapabilityToken::sign(
            CapabilityHeader {
                iss: issuer.public_key(),
                sub: issuer.public_key(),
                resource: "calendar".into(),
                scope: vec!["read".into()],
                tier: ocmt_core::Tier::Live,
                id: CapabilityId::random(),
                exp: 9_999_999_999,
                iat: 0,
            },
            &issuer,
        )
        .unwrap();
        let id = token.header.id;
        vault
            .insert_received_capability(
                id,
                ReceivedCapabilityRecord {
                    issuer_container_id: "peer-1".into(),
                    issuer_public_key: issuer.public_key(),
                    token: token.to_wire().unwrap(),
                    resource: "calendar".into(),
                    scope: vec!["read".into()],
                    tier: ocmt_core::Tier::Live,
                    expires_at: 9_999_999_999,
                    local_snapshot_ciphertext: None,
                    local_snapshot_meta: None,
                },
            )
            .await
            .unwrap();

        let unreachable = UnreachablePeer(AtomicU32::new(0));

        let result = engine
            .execute(
                &vault,
                id,
                "write",
                serde_json::Map::new(),
                ExecuteContext {
                    peer_transport: &unreachable,
                    snapshot_source: &NoSnapshot,
                    delegation_transport: &NoDelegation,
                    revocation_checker: &NeverRevoked,
                },
            )
            .await;

        assert!(matches!(result, Err(CapabilityError::ScopeViolation)));
        assert_eq!(unreachable.0.load(Ordering::SeqCst), 0);
    }
}
