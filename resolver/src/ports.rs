//! Maps Traefik entrypoint names to the ports the load-balancer service
//! actually exposes.

use indexmap::IndexMap;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PortLookupError {
    #[error("no service port targets entrypoint {0}")]
    NotFound(String),
}

/// Name-to-port mapping derived from the load-balancer service's port list.
///
/// Built once at start-up and never mutated; a process restart is the
/// refresh mechanism for the service definition itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePortDirectory {
    ports: IndexMap<String, u16>,
}

impl ServicePortDirectory {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, u16)>,
    {
        ServicePortDirectory {
            ports: pairs.into_iter().collect(),
        }
    }

    /// Collects the (targetPort name, exposed port) pairs of a Kubernetes
    /// Service. Only string target ports can refer to an entrypoint by
    /// name; numeric target ports are skipped.
    pub fn from_service(service: &Service) -> Self {
        let mut ports = IndexMap::new();

        for port in service
            .spec
            .iter()
            .flat_map(|spec| spec.ports.iter().flatten())
        {
            let Some(IntOrString::String(target)) = &port.target_port else {
                continue;
            };
            match u16::try_from(port.port) {
                Ok(exposed) => {
                    ports.insert(target.clone(), exposed);
                }
                Err(_) => {
                    tracing::warn!(
                        target_port = %target,
                        port = port.port,
                        "service port out of range, skipping"
                    );
                }
            }
        }

        ServicePortDirectory { ports }
    }

    pub fn lookup(&self, entrypoint_name: &str) -> Result<u16, PortLookupError> {
        self.ports
            .get(entrypoint_name)
            .copied()
            .ok_or_else(|| PortLookupError::NotFound(entrypoint_name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
