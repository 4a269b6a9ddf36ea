//! One-time discovery of the Traefik load-balancer service in the cluster.

use crate::ports::ServicePortDirectory;
use k8s_openapi::api::core::v1::Service;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};

#[derive(thiserror::Error, Debug)]
pub enum KubernetesError {
    #[error("kubernetes client error: {0}")]
    Client(#[from] kube::Error),
    #[error("service {name} not found in namespace {namespace}")]
    ServiceNotFound { name: String, namespace: String },
}

/// Lists services in the configured namespace (or the whole cluster when no
/// namespace is given), finds the load-balancer service by name and derives
/// the Service Port Directory from its port list.
///
/// Failure here is fatal to start-up: every later port resolution depends
/// on the directory.
pub async fn load_service_ports(
    service_name: &str,
    namespace: Option<&str>,
) -> Result<ServicePortDirectory, KubernetesError> {
    let client = Client::try_default().await?;

    let services: Api<Service> = match namespace {
        Some(ns) if !ns.is_empty() => Api::namespaced(client, ns),
        _ => Api::all(client),
    };

    let list = services.list(&ListParams::default()).await?;
    tracing::info!(
        count = list.items.len(),
        namespace = namespace.unwrap_or("<all>"),
        "listed cluster services"
    );

    let service = list
        .items
        .into_iter()
        .find(|service| service.name_any() == service_name)
        .ok_or_else(|| KubernetesError::ServiceNotFound {
            name: service_name.to_string(),
            namespace: namespace.unwrap_or("<all>").to_string(),
        })?;

    let directory = ServicePortDirectory::from_service(&service);
    if directory.is_empty() {
        tracing::warn!(
            service = service_name,
            "load-balancer service declares no named target ports"
        );
    }

    Ok(directory)
}
