//! The container's RPC surface (§6): one async trait per the operation
//! list, plus an in-process implementation wrapping a [`Container`]. Every
//! call is authenticated by a caller-supplied bearer token compared in
//! constant time, never accepted from a query parameter.

use crate::container::Container;
use crate::error::{NodeError, Result};
use async_trait::async_trait;
use ocmt_capability::{ExecuteContext, ParamAllowList};
use ocmt_core::{CapabilityId, Tier};
use ocmt_crypto::PublicKey;
use ocmt_session::SessionStatus;
use ocmt_vault::{CapabilitySummary, CapabilityScope, IntegrationPayload, IntegrationSummary};
use ocmt_sync::{FetchOutcome, SyncSnapshotsOutcome};
use serde_json::Value;
use std::collections::HashMap;

/// Arguments to `capabilities.issue`.
pub struct IssueRequest {
    pub subject_public_key: PublicKey,
    pub resource: String,
    pub scope: Vec<String>,
    pub tier: Tier,
    pub expires_in_seconds: u64,
}

/// Arguments to `capabilities.store`: a capability wire token received out
/// of band from its issuer.
pub struct StoreCapabilityRequest {
    pub issuer_container_id: String,
    pub token_wire: String,
}

/// Arguments to `capabilities.execute`.
pub struct ExecuteRequest {
    pub id: CapabilityId,
    pub operation: String,
    pub params: serde_json::Map<String, Value>,
}

/// Bulk import/export payload for `import`/`export` (§6): integration
/// credentials only — capability records are container-specific and do not
/// migrate across identities.
pub type IntegrationBundle = HashMap<String, IntegrationPayload>;

/// The container's full RPC surface, matching spec.md §6 one operation at
/// a time. `client_id` is the caller identity the session layer's rate
/// limiting and backoff key off of — a bearer token's owner, in practice.
#[async_trait]
pub trait ContainerService: Send + Sync {
    async fn status(&self) -> SessionStatus;
    async fn initialize(&self, password: &str) -> Result<()>;
    async fn unlock(&self, client_id: &str, password: &str) -> Result<PublicKey>;
    async fn lock(&self) -> Result<()>;
    async fn extend(&self) -> Result<()>;

    async fn list_integrations(&self, client_id: &str) -> Result<Vec<IntegrationSummary>>;
    async fn get_integration(&self, client_id: &str, provider: &str) -> Result<Option<IntegrationPayload>>;
    async fn set_integration(&self, client_id: &str, provider: &str, payload: IntegrationPayload) -> Result<()>;
    async fn remove_integration(&self, client_id: &str, provider: &str) -> Result<()>;

    async fn issue_capability(&self, client_id: &str, request: IssueRequest) -> Result<String>;
    async fn revoke_capability(&self, client_id: &str, id: CapabilityId, reason: Option<String>) -> Result<()>;
    async fn list_capabilities(&self, client_id: &str, scope: CapabilityScope) -> Result<Vec<CapabilitySummary>>;
    async fn store_capability(&self, client_id: &str, request: StoreCapabilityRequest) -> Result<CapabilityId>;
    async fn execute_capability(&self, client_id: &str, request: ExecuteRequest) -> Result<Value>;

    async fn sync_snapshots(&self) -> Result<SyncSnapshotsOutcome>;
    async fn fetch_snapshots(&self) -> Result<FetchOutcome>;

    async fn export(&self) -> Result<IntegrationBundle>;
    async fn import(&self, client_id: &str, bundle: IntegrationBundle) -> Result<()>;
}

/// Wraps one [`Container`] and dispatches every `ContainerService` call
/// into its session/capability/sync layers.
pub struct LocalContainerService {
    container: Container,
    bearer_token: String,
}

impl LocalContainerService {
    pub fn new(container: Container, bearer_token: String) -> Self {
        Self { container, bearer_token }
    }

    /// Constant-time bearer-token check (§6: "compared in constant time,
    /// never accepted from a query parameter"). Every mutating or
    /// secret-revealing call goes through this first.
    pub fn authenticate(&self, presented_token: &str) -> Result<()> {
        if ocmt_crypto::constant_time_eq(presented_token.as_bytes(), self.bearer_token.as_bytes()) {
            Ok(())
        } else {
            Err(NodeError::Unauthenticated)
        }
    }
}

#[async_trait]
impl ContainerService for LocalContainerService {
    async fn status(&self) -> SessionStatus {
        self.container.session.status().await
    }

    async fn initialize(&self, password: &str) -> Result<()> {
        self.container.vault.initialize(password).await?;
        Ok(())
    }

    async fn unlock(&self, client_id: &str, password: &str) -> Result<PublicKey> {
        Ok(self.container.session.unlock(client_id, password).await?)
    }

    async fn lock(&self) -> Result<()> {
        self.container.session.lock().await;
        Ok(())
    }

    async fn extend(&self) -> Result<()> {
        Ok(self.container.session.extend_session().await?)
    }

    async fn list_integrations(&self, client_id: &str) -> Result<Vec<IntegrationSummary>> {
        Ok(self.container.session.list_integrations(client_id).await?)
    }

    async fn get_integration(&self, client_id: &str, provider: &str) -> Result<Option<IntegrationPayload>> {
        Ok(self.container.session.get_integration(client_id, provider).await?)
    }

    async fn set_integration(&self, client_id: &str, provider: &str, payload: IntegrationPayload) -> Result<()> {
        Ok(self.container.session.set_integration(client_id, provider, payload).await?)
    }

    async fn remove_integration(&self, client_id: &str, provider: &str) -> Result<()> {
        Ok(self.container.session.remove_integration(client_id, provider).await?)
    }

    async fn issue_capability(&self, client_id: &str, request: IssueRequest) -> Result<String> {
        self.container.session.check_rate_limit(client_id)?;
        let result = self
            .container
            .capabilities
            .issue(
                self.container.session.vault(),
                request.subject_public_key,
                &request.resource,
                request.scope,
                request.tier,
                request.expires_in_seconds,
            )
            .await?;
        Ok(result.token)
    }

    async fn revoke_capability(&self, client_id: &str, id: CapabilityId, reason: Option<String>) -> Result<()> {
        self.container.session.check_rate_limit(client_id)?;
        self.container
            .capabilities
            .revoke(self.container.session.vault(), id, reason, self.container.sync.as_ref())
            .await?;
        Ok(())
    }

    async fn list_capabilities(&self, client_id: &str, scope: CapabilityScope) -> Result<Vec<CapabilitySummary>> {
        Ok(self.container.session.list_capabilities(client_id, scope).await?)
    }

    async fn store_capability(&self, client_id: &str, request: StoreCapabilityRequest) -> Result<CapabilityId> {
        self.container.session.check_rate_limit(client_id)?;
        let token = self.container.capabilities.verify(&request.token_wire, None)?;
        let id = token.header.id;
        self.container
            .vault
            .insert_received_capability(
                id,
                ocmt_vault::ReceivedCapabilityRecord {
                    issuer_container_id: request.issuer_container_id,
                    issuer_public_key: token.header.iss,
                    token: request.token_wire,
                    resource: token.header.resource,
                    scope: token.header.scope,
                    tier: token.header.tier,
                    expires_at: token.header.exp,
                    local_snapshot_ciphertext: None,
                    local_snapshot_meta: None,
                },
            )
            .await?;
        Ok(id)
    }

    async fn execute_capability(&self, client_id: &str, request: ExecuteRequest) -> Result<Value> {
        self.container.session.check_rate_limit(client_id)?;
        let ctx = ExecuteContext {
            peer_transport: self.container.peer_transport.as_ref(),
            snapshot_source: self.container.sync.as_ref(),
            delegation_transport: self.container.delegation_transport.as_ref(),
            revocation_checker: self.container.sync.as_ref(),
        };
        Ok(self
            .container
            .capabilities
            .execute(self.container.session.vault(), request.id, &request.operation, request.params, ctx)
            .await?)
    }

    async fn sync_snapshots(&self) -> Result<SyncSnapshotsOutcome> {
        Ok(self.container.sync.sync_snapshots().await?)
    }

    async fn fetch_snapshots(&self) -> Result<FetchOutcome> {
        Ok(self.container.sync.fetch_all_available_snapshots().await?)
    }

    async fn export(&self) -> Result<IntegrationBundle> {
        Ok(self.container.vault.export_integrations().await?)
    }

    async fn import(&self, client_id: &str, bundle: IntegrationBundle) -> Result<()> {
        self.container.session.check_rate_limit(client_id)?;
        for (provider, payload) in bundle {
            self.container.session.set_integration(client_id, &provider, payload).await?;
        }
        Ok(())
    }
}
