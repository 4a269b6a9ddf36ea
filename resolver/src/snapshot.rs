//! Point-in-time snapshots of resolved routers and entrypoints.

use crate::entrypoint::{EntryPoint, resolve_entry_point};
use crate::metrics_defs::{
    SNAPSHOT_ENTRY_POINTS, SNAPSHOT_REFRESH, SNAPSHOT_REFRESH_DURATION, SNAPSHOT_REFRESH_FAILED,
    SNAPSHOT_ROUTERS,
};
use crate::ports::ServicePortDirectory;
use crate::router::{Router, resolve_router};
use crate::traefik::{TraefikApiError, TraefikClient};
use crate::{counter, gauge, histogram};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{AcquireError, Semaphore};

/// The complete resolved state of one fetch-and-resolve cycle. Every
/// router's protocol and port were computed against the entrypoints in the
/// same snapshot, never a mixture of old and new data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub routers: IndexMap<String, Router>,
    pub entry_points: IndexMap<String, EntryPoint>,
}

impl Snapshot {
    pub fn router(&self, name: &str) -> Option<&Router> {
        self.routers.get(name)
    }

    pub fn entry_point(&self, name: &str) -> Option<&EntryPoint> {
        self.entry_points.get(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RefreshError {
    #[error("traefik api fetch failed: {0}")]
    Fetch(#[from] TraefikApiError),
    #[error("refresh serialization lost: {0}")]
    Serialization(#[from] AcquireError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LookupError {
    #[error("traefik router not found: {0}")]
    RouterNotFound(String),
    #[error("traefik entrypoint not found: {0}")]
    EntryPointNotFound(String),
}

/// Owns the current snapshot and replaces it wholesale on refresh.
///
/// Readers clone an `Arc` to the current snapshot and keep a consistent
/// view while a refresh prepares its replacement; the swap itself is a
/// single pointer write under the lock. Refreshes are serialized by a
/// one-permit semaphore so no two cycles interleave.
pub struct SnapshotStore {
    client: TraefikClient,
    ports: ServicePortDirectory,
    current: RwLock<Arc<Snapshot>>,
    refresh_lock: Semaphore,
}

impl SnapshotStore {
    pub fn new(client: TraefikClient, ports: ServicePortDirectory) -> Self {
        SnapshotStore {
            client,
            ports,
            current: RwLock::new(Arc::new(Snapshot::default())),
            refresh_lock: Semaphore::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn router_by_name(&self, name: &str) -> Result<Router, LookupError> {
        self.snapshot()
            .router(name)
            .cloned()
            .ok_or_else(|| LookupError::RouterNotFound(name.to_string()))
    }

    pub fn entry_point_by_name(&self, name: &str) -> Result<EntryPoint, LookupError> {
        self.snapshot()
            .entry_point(name)
            .cloned()
            .ok_or_else(|| LookupError::EntryPointNotFound(name.to_string()))
    }

    /// Runs one fetch-and-resolve cycle and swaps in the result. On any
    /// fetch or decode failure the previous snapshot stays fully intact
    /// and the error is returned to the caller.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let result = self.run_cycle().await;
        match &result {
            Ok(()) => counter!(SNAPSHOT_REFRESH).increment(1),
            Err(_) => counter!(SNAPSHOT_REFRESH_FAILED).increment(1),
        }
        result
    }

    async fn run_cycle(&self) -> Result<(), RefreshError> {
        // Hold the permit for the whole cycle.
        let _permit = self.refresh_lock.acquire().await?;
        let started = Instant::now();

        let raw_entry_points = self.client.fetch_entry_points().await?;
        tracing::info!(
            count = raw_entry_points.len(),
            "received entrypoints from traefik api"
        );

        let mut entry_points = IndexMap::new();
        for raw in raw_entry_points {
            let entry_point = resolve_entry_point(raw, &self.ports);
            entry_points.insert(entry_point.name.clone(), entry_point);
        }

        let raw_routers = self.client.fetch_routers().await?;
        tracing::info!(count = raw_routers.len(), "received routers from traefik api");

        let mut routers = IndexMap::new();
        for raw in raw_routers {
            let router = resolve_router(raw, &entry_points);
            routers.insert(router.name.clone(), router);
        }

        gauge!(SNAPSHOT_ROUTERS).set(routers.len() as f64);
        gauge!(SNAPSHOT_ENTRY_POINTS).set(entry_points.len() as f64);
        histogram!(SNAPSHOT_REFRESH_DURATION).record(started.elapsed().as_secs_f64());

        let next = Arc::new(Snapshot {
            routers,
            entry_points,
        });
        *self.current.write() = next;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router as AxumRouter;
    use axum::routing::get;
    use std::net::SocketAddr;

    /// Serves canned Traefik API fixtures on an ephemeral port. Aborting
    /// the returned handle closes the listener.
    async fn spawn_mock_api(
        entrypoints: serde_json::Value,
        routers: serde_json::Value,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let app = AxumRouter::new()
            .route(
                "/entrypoints",
                get(move || {
                    let body = entrypoints.clone();
                    async move { axum::Json(body) }
                }),
            )
            .route(
                "/http/routers",
                get(move || {
                    let body = routers.clone();
                    async move { axum::Json(body) }
                }),
            );

        serve_on_ephemeral_port(app).await
    }

    async fn serve_on_ephemeral_port(app: AxumRouter) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, handle)
    }

    fn fixture_entrypoints() -> serde_json::Value {
        serde_json::json!([
            {"name": "web", "address": ":80/tcp"},
            {"name": "websecure", "address": ":443/tcp", "http": {"tls": {}}},
            {"name": "dns", "address": ":53/udp"}
        ])
    }

    fn fixture_routers() -> serde_json::Value {
        serde_json::json!([
            {
                "name": "whoami@kubernetes",
                "entryPoints": ["web"],
                "rule": "Host(`example.com`) && PathPrefix(`/api`)",
                "service": "whoami",
                "status": "enabled",
                "provider": "kubernetes"
            },
            {
                "name": "dashboard@internal",
                "entryPoints": ["websecure"],
                "rule": "Host(`traefik.example.com`)",
                "service": "api@internal",
                "status": "enabled",
                "provider": "internal"
            }
        ])
    }

    fn directory() -> ServicePortDirectory {
        ServicePortDirectory::new([
            ("web".to_string(), 8080),
            ("websecure".to_string(), 443),
            ("dns".to_string(), 53),
        ])
    }

    #[tokio::test]
    async fn refresh_resolves_routers_against_same_cycle_entrypoints() {
        let (addr, _server) = spawn_mock_api(fixture_entrypoints(), fixture_routers()).await;
        let store = SnapshotStore::new(TraefikClient::new(format!("http://{addr}")), directory());

        store.refresh().await.unwrap();

        let whoami = store.router_by_name("whoami@kubernetes").unwrap();
        assert_eq!(whoami.urls, vec!["http://example.com:8080/api"]);

        let dashboard = store.router_by_name("dashboard@internal").unwrap();
        assert_eq!(dashboard.urls, vec!["https://traefik.example.com/"]);

        let web = store.entry_point_by_name("web").unwrap();
        assert_eq!(web.service_port, Some(8080));

        assert_eq!(
            store.router_by_name("missing@file"),
            Err(LookupError::RouterNotFound("missing@file".to_string()))
        );
        assert_eq!(
            store.entry_point_by_name("missing"),
            Err(LookupError::EntryPointNotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn refresh_is_idempotent_for_identical_upstream_data() {
        let (addr, _server) = spawn_mock_api(fixture_entrypoints(), fixture_routers()).await;
        let store = SnapshotStore::new(TraefikClient::new(format!("http://{addr}")), directory());

        store.refresh().await.unwrap();
        let first = store.snapshot();
        store.refresh().await.unwrap();
        let second = store.snapshot();

        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_previous_snapshot_intact() {
        use axum::response::IntoResponse;
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Routers endpoint serves valid JSON once, then errors with 500.
        // Aborting the serve task would not cut off reqwest's pooled
        // keep-alive connection, so the failure has to come from the handler.
        let hits = Arc::new(AtomicUsize::new(0));
        let app = AxumRouter::new()
            .route(
                "/entrypoints",
                get(|| async { axum::Json(fixture_entrypoints()) }),
            )
            .route(
                "/http/routers",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                            axum::Json(fixture_routers()).into_response()
                        } else {
                            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }),
            );
        let (addr, _server) = serve_on_ephemeral_port(app).await;

        let store = SnapshotStore::new(TraefikClient::new(format!("http://{addr}")), directory());

        store.refresh().await.unwrap();
        let populated = store.snapshot();
        assert!(!populated.routers.is_empty());

        assert!(store.refresh().await.is_err());
        assert_eq!(*store.snapshot(), *populated);
    }

    #[tokio::test]
    async fn decode_failure_fails_the_whole_cycle() {
        use axum::response::IntoResponse;
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Routers endpoint serves valid JSON once, then garbage.
        let hits = Arc::new(AtomicUsize::new(0));
        let app = AxumRouter::new()
            .route(
                "/entrypoints",
                get(|| async { axum::Json(fixture_entrypoints()) }),
            )
            .route(
                "/http/routers",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                            axum::Json(fixture_routers()).into_response()
                        } else {
                            "not json".into_response()
                        }
                    }
                }),
            );
        let (addr, _server) = serve_on_ephemeral_port(app).await;

        let store = SnapshotStore::new(TraefikClient::new(format!("http://{addr}")), directory());
        store.refresh().await.unwrap();
        let populated = store.snapshot();
        assert!(!populated.routers.is_empty());

        assert!(store.refresh().await.is_err());
        assert_eq!(*store.snapshot(), *populated);
    }

    #[tokio::test]
    async fn router_without_resolvable_information_gets_the_sentinel() {
        let entrypoints = serde_json::json!([]);
        let routers = serde_json::json!([
            {
                "name": "orphan@file",
                "entryPoints": ["nonexistent"],
                "rule": "PathPrefix(`/internal`)",
                "service": "orphan",
                "status": "enabled",
                "provider": "file"
            }
        ]);
        let (addr, _server) = spawn_mock_api(entrypoints, routers).await;
        let store = SnapshotStore::new(
            TraefikClient::new(format!("http://{addr}")),
            ServicePortDirectory::default(),
        );

        store.refresh().await.unwrap();
        let orphan = store.router_by_name("orphan@file").unwrap();
        assert_eq!(orphan.service_port, crate::router::ServicePort::Unresolved);
        assert_eq!(orphan.urls, vec![crate::router::UNKNOWN_URL]);
    }
}
