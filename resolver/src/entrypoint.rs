//! Resolution of Traefik entrypoints against the Service Port Directory.

use crate::ports::ServicePortDirectory;
use crate::traefik::RawEntryPoint;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
    Unknown,
}

/// One Traefik listener, with its transport and externally exposed port
/// resolved. Entrypoints with an unrecognized address keep transport
/// `unknown` and contribute nothing to router resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub name: String,
    pub address: String,
    pub transport: Transport,
    /// Port parsed out of the listener address.
    pub listen_port: Option<u16>,
    /// Port the load-balancer service exposes for this entrypoint.
    pub service_port: Option<u16>,
    /// Whether the entrypoint carries TLS termination config.
    pub tls: bool,
}

/// Extracts the port and transport from a listener address of the fixed
/// form `[host]:<port>/<transport>`. Anything else is unrecognized.
fn parse_address(address: &str) -> Option<(u16, Transport)> {
    let (head, transport) = address.rsplit_once('/')?;
    let transport = match transport {
        "tcp" => Transport::Tcp,
        "udp" => Transport::Udp,
        _ => return None,
    };
    let (_, port) = head.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    Some((port, transport))
}

/// Resolves one raw entrypoint. A port the directory cannot resolve is
/// logged and left absent, never fatal.
pub fn resolve_entry_point(raw: RawEntryPoint, ports: &ServicePortDirectory) -> EntryPoint {
    let (listen_port, transport) = match parse_address(&raw.address) {
        Some((port, transport)) => (Some(port), transport),
        None => (None, Transport::Unknown),
    };

    let service_port = match transport {
        Transport::Tcp | Transport::Udp => match ports.lookup(&raw.name) {
            Ok(port) => {
                tracing::debug!(
                    entrypoint = %raw.name,
                    port,
                    "load-balancer service serves entrypoint"
                );
                Some(port)
            }
            Err(err) => {
                tracing::warn!(entrypoint = %raw.name, %err, "entrypoint port unresolved");
                None
            }
        },
        Transport::Unknown => None,
    };

    EntryPoint {
        tls: raw.declares_tls(),
        name: raw.name,
        address: raw.address,
        transport,
        listen_port,
        service_port,
    }
}
