//! HTTP-backed claims.
//!
//! Sends the wallet address (and API key, if configured) to the faucet
//! endpoint and reads the paid amount from a `200` response. Every transport
//! problem is turned into a failed [`ClaimOutcome`]; nothing escapes as an
//! `Err`.

use super::{ClaimContext, ClaimDriver, ClaimOutcome, SimulatedClaim};
use crate::transport::{HttpRequest, REQUEST_TIMEOUT};
use anyhow::Result;
use async_trait::async_trait;
use core_logic::config::{FaucetConfig, RequestEncoding};
use core_logic::error::NetworkError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Longest body excerpt carried into a failure message.
pub const BODY_SNIPPET_CHARS: usize = 200;

/// Reads the claimed amount out of a successful response body.
pub trait AmountExtractor: Send + Sync {
    fn extract(&self, body: &str, faucet: &FaucetConfig) -> Option<f64>;
}

/// Accepts a bare number, a JSON number, or a JSON object holding the number
/// (or a numeric string) under `amount_field`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAmountExtractor;

impl AmountExtractor for DefaultAmountExtractor {
    fn extract(&self, body: &str, faucet: &FaucetConfig) -> Option<f64> {
        let trimmed = body.trim();
        if let Ok(value) = trimmed.trim_matches('"').parse::<f64>() {
            return valid_amount(value);
        }

        match serde_json::from_str::<Value>(trimmed).ok()? {
            Value::Number(n) => n.as_f64().and_then(valid_amount),
            Value::Object(map) => match map.get(&faucet.amount_field)? {
                Value::Number(n) => n.as_f64().and_then(valid_amount),
                Value::String(s) => s.trim().parse::<f64>().ok().and_then(valid_amount),
                _ => None,
            },
            _ => None,
        }
    }
}

fn valid_amount(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}

pub struct HttpDriver {
    fallback: SimulatedClaim,
    extractor: Arc<dyn AmountExtractor>,
}

impl HttpDriver {
    pub fn new() -> Self {
        Self {
            fallback: SimulatedClaim::from_entropy(),
            extractor: Arc::new(DefaultAmountExtractor),
        }
    }

    /// Seeds the simulated fallback used when a faucet has no endpoint.
    pub fn seeded(seed: u64) -> Self {
        Self {
            fallback: SimulatedClaim::seeded(seed),
            extractor: Arc::new(DefaultAmountExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn AmountExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    fn interpret(&self, status: u16, body: &str, faucet: &FaucetConfig) -> ClaimOutcome {
        if status != 200 {
            let snippet = body_snippet(body);
            return if snippet.is_empty() {
                ClaimOutcome::failure(format!("HTTP {}", status))
            } else {
                ClaimOutcome::failure(format!("HTTP {}: {}", status, snippet))
            };
        }

        match self.extractor.extract(body, faucet) {
            Some(amount) => ClaimOutcome::success(amount, "ok"),
            None => {
                debug!("Could not read amount from {} response", faucet.name);
                ClaimOutcome::success(0.0, "ok (amount unparsed)")
            }
        }
    }
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the outgoing request for one claim.
pub fn build_request(faucet: &FaucetConfig, wallet: &str) -> Result<HttpRequest, NetworkError> {
    let endpoint = faucet
        .endpoint()
        .ok_or_else(|| NetworkError::InvalidEndpoint {
            endpoint: String::new(),
            reason: "no endpoint configured".to_string(),
        })?;

    let url = Url::parse(endpoint).map_err(|e| NetworkError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetworkError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    let mut params = vec![(faucet.address_param.clone(), wallet.to_string())];
    if let Some(key) = faucet.api_key.as_deref().filter(|k| !k.is_empty()) {
        params.push((faucet.api_key_param.clone(), key.to_string()));
    }

    let (query, json) = match faucet.send_as {
        RequestEncoding::Query => (params, None),
        RequestEncoding::Json => {
            let body = params
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect::<serde_json::Map<_, _>>();
            (Vec::new(), Some(Value::Object(body)))
        }
    };

    Ok(HttpRequest {
        method: faucet.method,
        url: url.to_string(),
        query,
        json,
        headers: faucet
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

/// First [`BODY_SNIPPET_CHARS`] characters of the trimmed body.
pub fn body_snippet(body: &str) -> String {
    body.trim().chars().take(BODY_SNIPPET_CHARS).collect()
}

#[async_trait]
impl ClaimDriver<ClaimContext> for HttpDriver {
    fn name(&self) -> &str {
        "http"
    }

    async fn claim(&self, ctx: &ClaimContext) -> Result<ClaimOutcome> {
        let faucet = ctx.faucet.as_ref();

        if faucet.endpoint().is_none() {
            info!(
                "[SIM] No endpoint for {} ({}) -> wallet: {}, simulating",
                faucet.name,
                ctx.coin(),
                ctx.wallet
            );
            return Ok(self.fallback.roll("simulated-ok", "simulated-fail"));
        }

        info!(
            "[HTTP] Claiming from faucet: {} ({}) -> wallet: {}",
            faucet.name,
            ctx.coin(),
            ctx.wallet
        );

        let request = match build_request(faucet, &ctx.wallet) {
            Ok(request) => request,
            Err(e) => return Ok(ClaimOutcome::failure(e.to_string())),
        };
        let endpoint = request.url.clone();

        // The transport is pluggable, so the deadline is enforced here too.
        let reply = match tokio::time::timeout(REQUEST_TIMEOUT, ctx.transport.send(request)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Ok(ClaimOutcome::failure(e.to_string())),
            Err(_) => {
                let e = NetworkError::Timeout {
                    timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
                    endpoint,
                };
                return Ok(ClaimOutcome::failure(e.to_string()));
            }
        };

        Ok(self.interpret(reply.status, &reply.body, faucet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_logic::config::HttpMethod;

    fn faucet() -> FaucetConfig {
        FaucetConfig::new("drip_b", "LTC")
            .with_driver("http")
            .with_endpoint("https://faucet.example.com/claim")
    }

    #[test]
    fn test_extract_plain_and_json() {
        let f = faucet();
        let ex = DefaultAmountExtractor;
        assert_eq!(ex.extract("5", &f), Some(5.0));
        assert_eq!(ex.extract(" \"5\" \n", &f), Some(5.0));
        assert_eq!(ex.extract("0.25", &f), Some(0.25));
        assert_eq!(ex.extract(r#"{"amount": 7}"#, &f), Some(7.0));
        assert_eq!(ex.extract(r#"{"amount": "1.5"}"#, &f), Some(1.5));
        assert_eq!(ex.extract(r#"{"paid": 7}"#, &f), None);
        assert_eq!(ex.extract("-3", &f), None);
        assert_eq!(ex.extract("<html>thanks</html>", &f), None);
    }

    #[test]
    fn test_extract_custom_field() {
        let mut f = faucet();
        f.amount_field = "reward".to_string();
        assert_eq!(
            DefaultAmountExtractor.extract(r#"{"reward": 12, "amount": 1}"#, &f),
            Some(12.0)
        );
    }

    #[test]
    fn test_build_query_request() {
        let mut f = faucet();
        f.api_key = Some("k3y".to_string());
        let req = build_request(&f, "ltc1qwallet").unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://faucet.example.com/claim");
        assert_eq!(
            req.query,
            vec![
                ("address".to_string(), "ltc1qwallet".to_string()),
                ("api_key".to_string(), "k3y".to_string()),
            ]
        );
        assert!(req.json.is_none());
    }

    #[test]
    fn test_build_json_post_request() {
        let mut f = faucet();
        f.method = HttpMethod::Post;
        f.send_as = RequestEncoding::Json;
        f.address_param = "wallet".to_string();
        let req = build_request(&f, "ltc1qwallet").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert!(req.query.is_empty());
        assert_eq!(req.json, Some(serde_json::json!({"wallet": "ltc1qwallet"})));
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let f = faucet().with_endpoint("ftp://faucet.example.com");
        assert!(matches!(
            build_request(&f, "w"),
            Err(NetworkError::InvalidEndpoint { .. })
        ));
        let f = faucet().with_endpoint("not a url");
        assert!(build_request(&f, "w").is_err());
    }

    #[test]
    fn test_snippet_is_bounded() {
        let body = "x".repeat(1000);
        assert_eq!(body_snippet(&body).chars().count(), BODY_SNIPPET_CHARS);
        assert_eq!(body_snippet("  short  "), "short");
    }

    #[test]
    fn test_interpret_statuses() {
        let driver = HttpDriver::seeded(1);
        let f = faucet();

        let ok = driver.interpret(200, "5", &f);
        assert_eq!(ok, ClaimOutcome::success(5.0, "ok"));

        let unparsed = driver.interpret(200, "thanks!", &f);
        assert!(unparsed.success);
        assert_eq!(unparsed.amount, 0.0);
        assert_eq!(unparsed.message, "ok (amount unparsed)");

        let down = driver.interpret(503, "Service Unavailable", &f);
        assert!(!down.success);
        assert_eq!(down.message, "HTTP 503: Service Unavailable");

        assert_eq!(driver.interpret(429, "", &f).message, "HTTP 429");
    }
}
