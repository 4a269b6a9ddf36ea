use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Where to find Traefik: its control API and the load-balancer service
/// that fronts it in the cluster.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct TraefikConfig {
    pub api_url: String,
    pub service_name: String,
    /// Namespace of the load-balancer service. Empty means search all
    /// namespaces.
    pub namespace: String,
}

impl Default for TraefikConfig {
    fn default() -> Self {
        TraefikConfig {
            api_url: "http://traefik.traefik:9000/api".into(),
            service_name: "traefik".into(),
            namespace: String::new(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub traefik: TraefikConfig,
    pub metrics: Option<MetricsConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// Loads the config file when given, defaults otherwise, then lets the
    /// environment override the Traefik settings.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("TRAEFIK_API_URL") {
            self.traefik.api_url = url;
        }
        if let Some(name) = get("TRAEFIK_SERVICE_NAME") {
            self.traefik.service_name = name;
        }
        if let Some(namespace) = get("TRAEFIK_NAMESPACE") {
            self.traefik.namespace = namespace;
        }
    }
}
