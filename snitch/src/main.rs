//! Ingress Snitch: reconstructs the externally reachable URL of every
//! Traefik router by cross-referencing the control API with the
//! load-balancer service's exposed ports.

mod api;
mod config;

use clap::Parser;
use config::Config;
use metrics_exporter_statsd::StatsdBuilder;
use resolver::kubernetes::load_service_ports;
use resolver::{SnapshotStore, TraefikClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Shows where your Traefik ingress routes actually lead")]
struct Cli {
    /// Path to a YAML config file. Environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "could not load configuration");
            std::process::exit(1);
        }
    };

    if let Some(metrics_config) = &config.metrics {
        if let Err(err) = init_metrics(&metrics_config.statsd_host, metrics_config.statsd_port) {
            tracing::error!(%err, "could not initialize statsd exporter");
            std::process::exit(1);
        }
        resolver::metrics_defs::describe();
    }

    tracing::info!(
        api_url = %config.traefik.api_url,
        service = %config.traefik.service_name,
        namespace = %config.traefik.namespace,
        "starting ingress snitch"
    );

    // All later port resolution depends on the directory, so failing to
    // build it aborts start-up.
    let namespace = match config.traefik.namespace.as_str() {
        "" => None,
        ns => Some(ns),
    };
    let ports = match load_service_ports(&config.traefik.service_name, namespace).await {
        Ok(ports) => ports,
        Err(err) => {
            tracing::error!(%err, "could not build the service port directory");
            std::process::exit(1);
        }
    };

    let store = Arc::new(SnapshotStore::new(
        TraefikClient::new(config.traefik.api_url.clone()),
        ports,
    ));

    // A failed initial fetch is not fatal: the store keeps serving the
    // empty snapshot and POST /refresh can recover later.
    if let Err(err) = store.refresh().await {
        tracing::error!(%err, "initial snapshot refresh failed");
    }

    if let Err(err) = api::serve(config.listener.clone(), store).await {
        tracing::error!(%err, "http api terminated");
        std::process::exit(1);
    }
}

fn init_metrics(host: &str, port: u16) -> Result<(), String> {
    let recorder = StatsdBuilder::from(host, port)
        .build(Some("snitch"))
        .map_err(|err| err.to_string())?;
    metrics::set_global_recorder(recorder).map_err(|err| err.to_string())?;
    Ok(())
}
