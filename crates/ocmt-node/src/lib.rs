//! Runtime glue for one container process (§6, §9): wires the vault,
//! session manager, capability engine, and sync engine into a single
//! [`Container`] handle and exposes it through [`ContainerService`].

pub mod config;
pub mod container;
pub mod error;
pub mod service;
pub mod transport;

pub use config::NodeConfig;
pub use container::{BuildError, Container};
pub use error::{NodeError, Result};
pub use service::{
    ContainerService, ExecuteRequest, IntegrationBundle, IssueRequest, LocalContainerService,
    StoreCapabilityRequest,
};
pub use transport::{HttpPeerTransport, PeerDirectory, UnimplementedDelegationTransport};
