//! HTTP presentation layer for the resolved snapshot.
//!
//! Responses are negotiated on the exact `Accept` header value:
//! `application/json` and `application/xml` get machine-readable payloads,
//! everything else gets HTML.

use crate::config::Listener;
use askama_axum::Template;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use resolver::{EntryPoint, Router, ServicePort, SnapshotStore, Transport};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub async fn serve(listener: Listener, store: Arc<SnapshotStore>) -> Result<(), ApiError> {
    let addr = format!("{}:{}", listener.host, listener.port);
    tracing::info!(%addr, "serving http api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app(store)).await?;
    Ok(())
}

pub fn app(store: Arc<SnapshotStore>) -> AxumRouter {
    AxumRouter::new()
        .route("/", get(index))
        .route("/traefik/router/view/:router_name", get(router_view))
        .route(
            "/traefik/entrypoint/view/:entrypoint_name",
            get(entrypoint_view),
        )
        .route("/refresh", post(refresh))
        .route("/healthz", get(healthz))
        .with_state(store)
}

enum Negotiated {
    Json,
    Xml,
    Html,
}

fn negotiate(headers: &HeaderMap) -> Negotiated {
    match headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
    {
        Some("application/json") => Negotiated::Json,
        Some("application/xml") => Negotiated::Xml,
        _ => Negotiated::Html,
    }
}

fn xml_response<T: Serialize>(root: &str, value: &T) -> Response {
    let mut body = String::new();
    let result = quick_xml::se::Serializer::with_root(&mut body, Some(root))
        .and_then(|serializer| value.serialize(serializer));

    match result {
        Ok(_) => ([(header::CONTENT_TYPE, "application/xml")], body).into_response(),
        Err(err) => {
            tracing::error!(%err, "xml serialization failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Serialize)]
struct RoutersDoc<'a> {
    router: Vec<&'a Router>,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    title: String,
    routers: Vec<RouterRow>,
}

struct RouterRow {
    name: String,
    html_id: String,
    rule: String,
    status: String,
    provider: String,
    urls: Vec<String>,
}

impl From<&Router> for RouterRow {
    fn from(router: &Router) -> Self {
        RouterRow {
            name: router.name.clone(),
            html_id: router.html_id.clone(),
            rule: router.rule.clone(),
            status: router.status.clone(),
            provider: router.provider.clone(),
            urls: router.urls.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "router.html")]
struct RouterTemplate {
    title: String,
    name: String,
    rule: String,
    service: String,
    provider: String,
    status: String,
    priority: i64,
    scheme: String,
    port: String,
    entry_points: Vec<String>,
    urls: Vec<String>,
}

impl From<&Router> for RouterTemplate {
    fn from(router: &Router) -> Self {
        RouterTemplate {
            title: router.name.clone(),
            name: router.name.clone(),
            rule: router.rule.clone(),
            service: router.service.clone(),
            provider: router.provider.clone(),
            status: router.status.clone(),
            priority: router.priority,
            scheme: router.protocol.scheme().to_string(),
            port: display_port(router.service_port),
            entry_points: router.entry_points.clone(),
            urls: router.urls.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "entrypoint.html")]
struct EntryPointTemplate {
    title: String,
    name: String,
    address: String,
    transport: String,
    listen_port: String,
    service_port: String,
    tls: bool,
}

impl From<&EntryPoint> for EntryPointTemplate {
    fn from(entry_point: &EntryPoint) -> Self {
        EntryPointTemplate {
            title: entry_point.name.clone(),
            name: entry_point.name.clone(),
            address: entry_point.address.clone(),
            transport: display_transport(entry_point.transport),
            listen_port: display_optional_port(entry_point.listen_port),
            service_port: display_optional_port(entry_point.service_port),
            tls: entry_point.tls,
        }
    }
}

fn display_port(port: ServicePort) -> String {
    match port {
        ServicePort::Resolved(port) => port.to_string(),
        ServicePort::Unresolved => "unresolved".to_string(),
    }
}

fn display_optional_port(port: Option<u16>) -> String {
    match port {
        Some(port) => port.to_string(),
        None => "unresolved".to_string(),
    }
}

fn display_transport(transport: Transport) -> String {
    match transport {
        Transport::Tcp => "tcp",
        Transport::Udp => "udp",
        Transport::Unknown => "unknown",
    }
    .to_string()
}

async fn index(State(store): State<Arc<SnapshotStore>>, headers: HeaderMap) -> Response {
    let snapshot = store.snapshot();
    let routers: Vec<&Router> = snapshot.routers.values().collect();

    match negotiate(&headers) {
        Negotiated::Json => Json(&routers).into_response(),
        Negotiated::Xml => xml_response("routers", &RoutersDoc { router: routers }),
        Negotiated::Html => IndexTemplate {
            title: "Ingress Snitch".to_string(),
            routers: routers.iter().map(|router| RouterRow::from(*router)).collect(),
        }
        .into_response(),
    }
}

async fn router_view(
    State(store): State<Arc<SnapshotStore>>,
    Path(router_name): Path<String>,
    headers: HeaderMap,
) -> Response {
    match store.router_by_name(&router_name) {
        Ok(router) => match negotiate(&headers) {
            Negotiated::Json => Json(&router).into_response(),
            Negotiated::Xml => xml_response("router", &router),
            Negotiated::Html => RouterTemplate::from(&router).into_response(),
        },
        Err(err) => (StatusCode::NOT_FOUND, err.to_string()).into_response(),
    }
}

async fn entrypoint_view(
    State(store): State<Arc<SnapshotStore>>,
    Path(entrypoint_name): Path<String>,
    headers: HeaderMap,
) -> Response {
    match store.entry_point_by_name(&entrypoint_name) {
        Ok(entry_point) => match negotiate(&headers) {
            Negotiated::Json => Json(&entry_point).into_response(),
            Negotiated::Xml => xml_response("entrypoint", &entry_point),
            Negotiated::Html => EntryPointTemplate::from(&entry_point).into_response(),
        },
        Err(err) => (StatusCode::NOT_FOUND, err.to_string()).into_response(),
    }
}

/// Runs one fetch-and-resolve cycle on demand.
async fn refresh(State(store): State<Arc<SnapshotStore>>) -> Response {
    match store.refresh().await {
        Ok(()) => {
            let snapshot = store.snapshot();
            Json(serde_json::json!({
                "routers": snapshot.routers.len(),
                "entryPoints": snapshot.entry_points.len(),
            }))
            .into_response()
        }
        Err(err) => {
            tracing::error!(%err, "on-demand refresh failed");
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}
