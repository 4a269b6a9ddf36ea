//! Router resolution: protocol/port selection and URL synthesis.

use crate::entrypoint::{EntryPoint, Transport};
use crate::rule::{parse_hosts, parse_paths};
use crate::traefik::{RawRouter, RawRouterTls};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Placeholder URL for routers whose rule yields no hostname. Signals
/// "insufficient rule information", not an error.
pub const UNKNOWN_URL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Plaintext,
    Tls,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Plaintext => "http",
            Protocol::Tls => "https",
        }
    }
}

/// Externally exposed port of a router, or an explicit marker that none
/// could be resolved. The unresolved marker renders as port `0` in URLs,
/// which keeps it distinguishable from any real port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePort {
    Resolved(u16),
    Unresolved,
}

impl ServicePort {
    /// Default ports are elided from URLs: 80 for plaintext, 443 for TLS.
    pub fn is_default_for(self, protocol: Protocol) -> bool {
        matches!(
            (self, protocol),
            (ServicePort::Resolved(80), Protocol::Plaintext)
                | (ServicePort::Resolved(443), Protocol::Tls)
        )
    }

    pub fn url_value(self) -> u16 {
        match self {
            ServicePort::Resolved(port) => port,
            ServicePort::Unresolved => 0,
        }
    }
}

impl Serialize for ServicePort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ServicePort::Resolved(port) => serializer.serialize_some(port),
            ServicePort::Unresolved => serializer.serialize_none(),
        }
    }
}

/// One resolved router. Carries the Traefik record's passthrough metadata
/// untouched, plus the derived protocol, port and URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub name: String,
    pub entry_points: Vec<String>,
    pub service: String,
    pub rule: String,
    pub priority: i64,
    pub status: String,
    pub using: Vec<String>,
    pub provider: String,
    pub tls: Option<RawRouterTls>,
    pub protocol: Protocol,
    pub service_port: ServicePort,
    pub urls: Vec<String>,
    /// Router name with characters invalid in HTML ids replaced.
    pub html_id: String,
}

/// Resolves one raw router against the entrypoints of the same snapshot.
///
/// Only TCP entrypoints influence the result; UDP listeners cannot serve
/// the HTTP/HTTPS traffic these URLs describe. When a router names several
/// TCP entrypoints, the last one in list order wins for both protocol and
/// port. Traefik never defines which entrypoint should take precedence, so
/// the upstream behavior is kept as-is rather than guessed at.
pub fn resolve_router(raw: RawRouter, entry_points: &IndexMap<String, EntryPoint>) -> Router {
    let mut protocol = Protocol::Plaintext;
    let mut service_port = ServicePort::Unresolved;

    for entry_point_name in &raw.entry_points {
        let Some(entry_point) = entry_points.get(entry_point_name) else {
            tracing::warn!(
                router = %raw.name,
                entrypoint = %entry_point_name,
                "router references unknown entrypoint"
            );
            continue;
        };

        if entry_point.transport != Transport::Tcp {
            continue;
        }

        service_port = match entry_point.service_port {
            Some(port) => ServicePort::Resolved(port),
            None => ServicePort::Unresolved,
        };
        protocol = if entry_point.tls {
            Protocol::Tls
        } else {
            Protocol::Plaintext
        };
    }

    if service_port == ServicePort::Unresolved {
        tracing::warn!(
            router = %raw.name,
            "no entrypoint port resolved, possibly not exposed by the service"
        );
    }

    let hosts = parse_hosts(&raw.rule);
    let paths = parse_paths(&raw.rule);
    let urls = synthesize_urls(protocol, service_port, &hosts, &paths);

    Router {
        html_id: sanitize_html_id(&raw.name),
        name: raw.name,
        entry_points: raw.entry_points,
        service: raw.service,
        rule: raw.rule,
        priority: raw.priority,
        status: raw.status,
        using: raw.using,
        provider: raw.provider,
        tls: raw.tls,
        protocol,
        service_port,
        urls,
    }
}

/// Builds one URL per hostname as `scheme://host[:port]path`, using only
/// the first path prefix. No hostnames at all yields the `Unknown`
/// sentinel so the result is never empty.
pub fn synthesize_urls(
    protocol: Protocol,
    port: ServicePort,
    hosts: &[String],
    paths: &[String],
) -> Vec<String> {
    if hosts.is_empty() {
        return vec![UNKNOWN_URL.to_string()];
    }

    let scheme = protocol.scheme();
    let path = paths.first().map(String::as_str).unwrap_or("/");

    hosts
        .iter()
        .map(|host| {
            if port.is_default_for(protocol) {
                format!("{scheme}://{host}{path}")
            } else {
                format!("{scheme}://{host}:{}{path}", port.url_value())
            }
        })
        .collect()
}

/// Replaces characters that are invalid in HTML ids. Traefik router names
/// carry an `@provider` suffix.
fn sanitize_html_id(name: &str) -> String {
    name.replace('@', "_")
}
