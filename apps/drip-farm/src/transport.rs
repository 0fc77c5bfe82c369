//! Shared HTTP transport handed to claim drivers.
//!
//! Drivers never build their own client: the farm creates one
//! [`ReqwestTransport`] from the `[transport]` config (proxy, user agent) and
//! passes it around as an `Arc<dyn HttpTransport>`. Tests swap in a mock.

use anyhow::Result;
use async_trait::async_trait;
use core_logic::config::{HttpMethod, TransportConfig};
use core_logic::error::NetworkError;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

/// Fixed per-request timeout for faucet endpoints.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, NetworkError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(REQUEST_TIMEOUT);

        if let Some(proxy_conf) = &config.proxy {
            let mut proxy =
                reqwest::Proxy::all(&proxy_conf.url).map_err(|e| NetworkError::InvalidProxy {
                    url: proxy_conf.url.clone(),
                    reason: e.to_string(),
                })?;
            if let (Some(u), Some(p)) = (&proxy_conf.username, &proxy_conf.password) {
                proxy = proxy.basic_auth(u, p);
            }
            builder = builder.proxy(proxy);
            info!("Using proxy: {}", proxy_conf.url);
        } else {
            info!("Not using proxy");
        }

        Ok(Self {
            client: builder.build()?,
            timeout: REQUEST_TIMEOUT,
        })
    }

    fn classify(&self, endpoint: &str, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                endpoint: endpoint.to_string(),
            }
        } else if err.is_connect() {
            NetworkError::ConnectionRefused {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_builder() {
            NetworkError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        } else {
            NetworkError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, NetworkError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(&request.url, e))?;

        Ok(HttpReply { status, body })
    }
}
