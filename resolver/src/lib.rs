//! Router metadata resolution for Traefik.
//!
//! Fetches routers and entrypoints from the Traefik control API, resolves
//! each router's externally reachable URLs by cross-referencing the
//! Kubernetes load-balancer service's port list, and serves the result as
//! an immutable snapshot.

pub mod entrypoint;
pub mod kubernetes;
pub mod metrics_defs;
pub mod ports;
pub mod router;
pub mod rule;
pub mod snapshot;
pub mod traefik;

pub use entrypoint::{EntryPoint, Transport};
pub use ports::ServicePortDirectory;
pub use router::{Protocol, Router, ServicePort};
pub use snapshot::{LookupError, RefreshError, Snapshot, SnapshotStore};
pub use traefik::TraefikClient;
