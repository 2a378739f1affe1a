//! Live network access over reqwest

use crate::error::{Result, WorkerError};
use crate::host::Network;
use crate::types::FetchRequest;
use async_trait::async_trait;
use reqwest::{Client, Method};
use shell_cache::ResponseSnapshot;
use tracing::{debug, warn};

/// Headers that describe the hop rather than the resource
const HOP_HEADERS: &[&str] = &[
    "connection",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub(crate) fn is_hop_header(name: &str) -> bool {
    HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// HTTP client used for live fetches
pub struct ReqwestNetwork {
    client: Client,
}

impl ReqwestNetwork {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| WorkerError::Network(format!("invalid method {}: {}", request.method, e)))?;

        debug!(method = %method, url = %request.url, "Fetching from network");

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            if is_hop_header(name) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Network fetch failed");
            WorkerError::from(e)
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_header(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, size = body.len(), "Fetched from network");
        Ok(ResponseSnapshot::new(status, headers, body))
    }
}
