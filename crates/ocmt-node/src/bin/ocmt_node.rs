//! Minimal CLI over one container's `ContainerService` (§6, §9). Reads
//! `OCMT_BASE_DIR`/`OCMT_VAULT_PASSWORD`/`OCMT_REFRESH_INTERVAL_SECS`/
//! `OCMT_RELAY_URL` for its runtime configuration.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use ocmt_capability::ParamAllowList;
use ocmt_core::{CapabilityId, Tier};
use ocmt_crypto::{PublicKey, X25519PublicKey};
use ocmt_node::{
    Container, ContainerService, ExecuteRequest, IssueRequest, LocalContainerService, NodeConfig,
    PeerDirectory, StoreCapabilityRequest,
};
use ocmt_sync::SnapshotSource;
use ocmt_vault::CapabilityScope;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ocmt-node")]
#[command(about = "Distributed trust core container", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Caller identity used for rate limiting and backoff bookkeeping.
    #[arg(long, global = true, default_value = "cli")]
    client_id: String,

    /// Bearer token this process expects for every call.
    #[arg(long, global = true, env = "OCMT_BEARER_TOKEN", default_value = "")]
    bearer_token: String,
}

#[derive(Subcommand)]
enum Command {
    /// Report initialization, lock, and session state.
    Status,
    /// Create the vault for the first time.
    Init {
        password: String,
    },
    /// Unlock the vault for this session.
    Unlock {
        password: String,
    },
    /// Lock the vault immediately.
    Lock,
    /// Push the expiry of the active session out by the TTL.
    Extend,
    /// Issue a capability to a subject (base64url Ed25519 public key).
    Issue {
        subject_public_key: String,
        resource: String,
        #[arg(long, value_delimiter = ',')]
        scope: Vec<String>,
        #[arg(long, value_enum, default_value = "live")]
        tier: TierArg,
        #[arg(long, default_value_t = 3600)]
        expires_in_seconds: u64,
    },
    /// Revoke a previously issued capability.
    Revoke {
        id: String,
        reason: Option<String>,
    },
    /// List issued or received capabilities.
    List {
        #[arg(value_enum)]
        scope: ScopeArg,
    },
    /// Store a capability token received out of band.
    Store {
        issuer_container_id: String,
        token_wire: String,
    },
    /// Execute an operation against a received capability.
    Execute {
        id: String,
        operation: String,
        #[arg(default_value = "{}")]
        params_json: String,
    },
    /// Push due CACHED snapshots to the relay.
    Sync,
    /// Fetch and decrypt any available received snapshots.
    Fetch,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TierArg {
    Live,
    Cached,
    Delegated,
}

impl From<TierArg> for Tier {
    fn from(value: TierArg) -> Self {
        match value {
            TierArg::Live => Tier::Live,
            TierArg::Cached => Tier::Cached,
            TierArg::Delegated => Tier::Delegated,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ScopeArg {
    Issued,
    Received,
}

impl From<ScopeArg> for CapabilityScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Issued => CapabilityScope::Issued,
            ScopeArg::Received => CapabilityScope::Received,
        }
    }
}

fn parse_public_key(s: &str) -> Result<PublicKey> {
    let bytes = ocmt_core::ids::base64_url_decode(s).ok_or_else(|| anyhow!("not valid base64url"))?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| anyhow!("expected 32 bytes"))?;
    Ok(PublicKey::from_bytes(bytes))
}

/// No directory service is configured for this CLI: LIVE execution and
/// snapshot sealing to unknown subjects fail closed rather than guessing.
struct NoDirectory;

#[async_trait]
impl PeerDirectory for NoDirectory {
    async fn endpoint_url(&self, _issuer: PublicKey) -> Option<String> {
        None
    }
}

#[async_trait]
impl ocmt_sync::SubjectKeyDirectory for NoDirectory {
    async fn x25519_public_key(&self, _subject: PublicKey) -> Option<X25519PublicKey> {
        None
    }
}

/// Materializes a CACHED snapshot's payload as `{"resource": <name>}`. A
/// real deployment supplies its own application-specific source.
struct EchoSnapshotSource;

#[async_trait]
impl SnapshotSource for EchoSnapshotSource {
    async fn materialize(&self, resource: &str) -> Result<Vec<u8>, ocmt_sync::SyncError> {
        serde_json::to_vec(&serde_json::json!({ "resource": resource }))
            .map_err(|e| ocmt_sync::SyncError::SourceFailed(e.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = NodeConfig::from_env();
    std::fs::create_dir_all(&config.base_dir)?;

    let directory = Arc::new(NoDirectory);
    let container = Container::build(config, ParamAllowList::new(), Arc::new(EchoSnapshotSource), directory.clone(), directory)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    let service = LocalContainerService::new(container, cli.bearer_token.clone());
    service.authenticate(&cli.bearer_token).map_err(|e| anyhow!(e.to_string()))?;

    match cli.command {
        Command::Status => {
            let status = service.status().await;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "initialized": status.initialized,
                "locked": status.locked,
                "expiresInSecs": status.expires_in_secs,
                "publicKey": status.public_key.map(|k| k.to_string()),
            }))?);
        }
        Command::Init { password } => {
            service.initialize(&password).await.map_err(|e| anyhow!(e.to_string()))?;
            println!("vault initialized");
        }
        Command::Unlock { password } => {
            let key = service.unlock(&cli.client_id, &password).await.map_err(|e| anyhow!(e.to_string()))?;
            println!("unlocked as {key}");
        }
        Command::Lock => {
            service.lock().await.map_err(|e| anyhow!(e.to_string()))?;
            println!("locked");
        }
        Command::Extend => {
            service.extend().await.map_err(|e| anyhow!(e.to_string()))?;
            println!("session extended");
        }
        Command::Issue { subject_public_key, resource, scope, tier, expires_in_seconds } => {
            let subject_public_key = parse_public_key(&subject_public_key)?;
            let token = service
                .issue_capability(
                    &cli.client_id,
                    IssueRequest { subject_public_key, resource, scope, tier: tier.into(), expires_in_seconds },
                )
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            println!("{token}");
        }
        Command::Revoke { id, reason } => {
            let id = CapabilityId::parse(&id).map_err(|e| anyhow!(e.to_string()))?;
            service.revoke_capability(&cli.client_id, id, reason).await.map_err(|e| anyhow!(e.to_string()))?;
            println!("revoked");
        }
        Command::List { scope } => {
            let summaries =
                service.list_capabilities(&cli.client_id, scope.into()).await.map_err(|e| anyhow!(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Store { issuer_container_id, token_wire } => {
            let id = service
                .store_capability(&cli.client_id, StoreCapabilityRequest { issuer_container_id, token_wire })
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            println!("{id}");
        }
        Command::Execute { id, operation, params_json } => {
            let id = CapabilityId::parse(&id).map_err(|e| anyhow!(e.to_string()))?;
            let params: serde_json::Value = serde_json::from_str(&params_json)?;
            let params = params.as_object().cloned().ok_or_else(|| anyhow!("params must be a JSON object"))?;
            let result = service
                .execute_capability(&cli.client_id, ExecuteRequest { id, operation, params })
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Sync => {
            let outcome = service.sync_snapshots().await.map_err(|e| anyhow!(e.to_string()))?;
            println!("pushed {}/{} (errors: {:?})", outcome.pushed, outcome.refreshed, outcome.errors);
        }
        Command::Fetch => {
            let outcome = service.fetch_snapshots().await.map_err(|e| anyhow!(e.to_string()))?;
            println!("fetched {} (errors: {:?})", outcome.fetched, outcome.errors);
        }
    }

    Ok(())
}
