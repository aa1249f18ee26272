//! Direct HTTP channel for write commands.
//!
//! Each call is an independent `POST` of the wire request with its own
//! deadline; no connection state leaks between attempts.

use crate::error::{GatewayError, GatewayResult};
use crate::transport::{looks_like_dns, BoxFuture, Transport, TransportError};
use crate::wire::{WireRequest, WireResponse};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Direct channel settings.
#[derive(Debug, Clone)]
pub struct DirectClientConfig {
    /// Gateway endpoint accepting wire requests as JSON bodies.
    pub url: String,
    pub connect_timeout: Duration,
    /// Whole-exchange deadline per attempt.
    pub request_timeout: Duration,
}

impl DirectClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP transport built on `reqwest`.
pub struct DirectClient {
    client: Client,
    url: String,
    shutdown: CancellationToken,
}

impl DirectClient {
    pub fn new(config: DirectClientConfig, shutdown: CancellationToken) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::ClientSetup(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url,
            shutdown,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for DirectClient {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn call<'a>(
        &'a self,
        request: &'a WireRequest,
    ) -> BoxFuture<'a, Result<WireResponse, TransportError>> {
        Box::pin(async move {
            if self.shutdown.is_cancelled() {
                return Err(TransportError::Shutdown);
            }

            debug!(url = %self.url, action = %request.action, req_id = %request.req_id, "POST wire request");
            let response = self
                .client
                .post(&self.url)
                .json(request)
                .send()
                .await
                .map_err(request_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let detail = format!("HTTP {status}: {body}");
                // A 5xx may come from a proxy after the venue saw the request.
                return Err(if status.is_server_error() {
                    TransportError::Io(detail)
                } else {
                    TransportError::Protocol(detail)
                });
            }

            let text = response.text().await.map_err(request_error)?;
            WireResponse::decode(&text)
                .map_err(|e| TransportError::Protocol(format!("malformed reply: {e}")))
        })
    }
}

/// Map a reqwest error onto the transport taxonomy.
///
/// Connect-phase failures (including connect timeouts) happen before any
/// byte of the request is written.
fn request_error(e: reqwest::Error) -> TransportError {
    let text = error_chain(&e);
    if e.is_connect() {
        if looks_like_dns(&text) {
            TransportError::Dns(text)
        } else {
            TransportError::ConnectionRefused(text)
        }
    } else if e.is_timeout() {
        TransportError::Timeout(text)
    } else if e.is_builder() || e.is_decode() {
        TransportError::Protocol(text)
    } else if e.is_request() || e.is_body() {
        TransportError::ConnectionReset(text)
    } else {
        TransportError::Io(text)
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
