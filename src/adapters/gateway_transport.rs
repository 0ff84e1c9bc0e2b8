//! HTTP plumbing shared by the gateway adapters: client timeout, circuit
//! breaker and status-code mapping.

use std::time::Duration;

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::ConfigError;
use crate::ports::GatewayError;

const FAILURE_THRESHOLD: u32 = 3;
const RESET_TIMEOUT_SECS: u64 = 30;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Clone)]
pub struct GatewayTransport {
    client: Client,
    base_url: Url,
    circuit_breaker: Breaker,
}

impl GatewayTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl {
            name: "gateway base url",
            value: base_url.to_string(),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(RESET_TIMEOUT_SECS),
            Duration::from_secs(RESET_TIMEOUT_SECS * 2),
        );
        let policy = failure_policy::consecutive_failures(FAILURE_THRESHOLD, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(Self {
            client,
            base_url,
            circuit_breaker,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Joins path segments onto the base url, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidResponse("gateway base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request through the breaker. Only outages count as breaker
    /// failures; a 401 or 404 leaves it closed.
    pub async fn send_json(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let call = async move {
            let response = request.send().await.map_err(map_transport_error)?;
            let status = response.status();

            if status.is_success() {
                return response
                    .json::<Value>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()));
            }

            let body = response.text().await.unwrap_or_default();
            Err(map_status(status, &body))
        };

        match self
            .circuit_breaker
            .call_with(|err: &GatewayError| err.is_outage(), call)
            .await
        {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::Unavailable(
                "gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(err)) => Err(err),
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

pub(crate) fn map_status(status: StatusCode, body: &str) -> GatewayError {
    let detail = truncate(body, 200);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth(format!("status {}", status.as_u16())),
        StatusCode::NOT_FOUND => GatewayError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::Unavailable(format!("status 429: {}", detail)),
        s if s.is_server_error() => GatewayError::Unavailable(format!("status {}: {}", s.as_u16(), detail)),
        s => GatewayError::InvalidResponse(format!("status {}: {}", s.as_u16(), detail)),
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
