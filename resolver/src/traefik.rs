//! HTTP client for the Traefik control API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};

const BASE_DELAY: u64 = 500;
const MAX_RETRIES: u32 = 3;

/// A router record as returned by `GET <base>/http/routers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRouter {
    pub name: String,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub using: Vec<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub tls: Option<RawRouterTls>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawRouterTls {
    #[serde(default)]
    pub options: String,
}

/// An entrypoint record as returned by `GET <base>/entrypoints`. Traefik
/// nests plenty of listener configuration here; only the address and the
/// presence of an `http.tls` block matter for URL resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntryPoint {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub http: RawEntryPointHttp,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntryPointHttp {
    #[serde(default)]
    pub tls: Option<serde_json::Value>,
}

impl RawEntryPoint {
    pub fn declares_tls(&self) -> bool {
        self.http.tls.is_some()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TraefikApiError {
    #[error("traefik api request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("traefik api unavailable after {MAX_RETRIES} retries")]
    RetriesExceeded,
}

pub struct TraefikClient {
    client: reqwest::Client,
    base_url: String,
}

impl TraefikClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        TraefikClient {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_routers(&self) -> Result<Vec<RawRouter>, TraefikApiError> {
        self.fetch("http/routers").await
    }

    pub async fn fetch_entry_points(&self) -> Result<Vec<RawEntryPoint>, TraefikApiError> {
        self.fetch("entrypoints").await
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, TraefikApiError> {
        const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
            StatusCode::TOO_MANY_REQUESTS,     // 429
            StatusCode::INTERNAL_SERVER_ERROR, // 500
            StatusCode::BAD_GATEWAY,           // 502
            StatusCode::SERVICE_UNAVAILABLE,   // 503
            StatusCode::GATEWAY_TIMEOUT,       // 504
        ];

        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%url, "fetching from traefik api");

        let mut retries = 0;
        loop {
            let response = self.client.get(&url).send().await?;

            if !response.status().is_success() {
                if RETRIABLE_STATUS_CODES.contains(&response.status()) && retries < MAX_RETRIES {
                    // Backoff between retries
                    let retry_millis = BASE_DELAY * 2_u64.pow(retries);
                    sleep(Duration::from_millis(retry_millis)).await;
                    retries += 1;
                    continue;
                }
                return Err(TraefikApiError::RetriesExceeded);
            }

            // A body that does not match the schema fails the whole fetch,
            // the same path as a transport error.
            return Ok(response.json::<T>().await?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_record_deserializes_from_api_json() {
        let body = r#"{
            "entryPoints": ["web", "websecure"],
            "service": "whoami",
            "rule": "Host(`example.com`) && PathPrefix(`/api`)",
            "priority": 42,
            "status": "enabled",
            "using": ["web"],
            "name": "whoami@kubernetes",
            "provider": "kubernetes",
            "tls": {"options": "default"}
        }"#;

        let router: RawRouter = serde_json::from_str(body).unwrap();
        assert_eq!(router.name, "whoami@kubernetes");
        assert_eq!(router.entry_points, vec!["web", "websecure"]);
        assert_eq!(router.priority, 42);
        assert_eq!(
            router.tls,
            Some(RawRouterTls {
                options: "default".to_string()
            })
        );
    }

    #[test]
    fn router_record_tolerates_missing_fields() {
        let router: RawRouter = serde_json::from_str(r#"{"name": "bare@internal"}"#).unwrap();
        assert_eq!(router.name, "bare@internal");
        assert!(router.entry_points.is_empty());
        assert!(router.tls.is_none());
    }

    #[test]
    fn entrypoint_record_detects_tls() {
        let plain: RawEntryPoint =
            serde_json::from_str(r#"{"name": "web", "address": ":80/tcp"}"#).unwrap();
        assert!(!plain.declares_tls());

        let secure: RawEntryPoint = serde_json::from_str(
            r#"{"name": "websecure", "address": ":443/tcp", "http": {"tls": {"options": "default"}}}"#,
        )
        .unwrap();
        assert!(secure.declares_tls());
    }
}
