//! HTTP client abstraction and the reqwest-backed implementation

use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Method, Url};
use std::time::Duration;

/// Transport-ready request: URL parsed, body serialized, headers merged.
/// Built once per run by `RequestSpec::prepare` and shared by every runner.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Response data the runner cares about. The body is read to completion
/// so latency covers the full transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body_size: usize,
}

/// HTTP client trait for abstraction and testing
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send the request and read the full response.
    ///
    /// Failures are `AppError::Transport` or `AppError::Timeout`; a non-2xx
    /// status is a response, not an error.
    async fn execute(&self, request: &PreparedRequest) -> Result<HttpResponse>;
}

/// `HttpClient` backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: &PreparedRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status_code = response.status().as_u16();

        let body = response
            .bytes()
            .await
            .map_err(classify)?;

        Ok(HttpResponse {
            status_code,
            body_size: body.len(),
        })
    }
}

/// Map a reqwest failure to a per-request error, keeping the root cause
/// (e.g. "Connection refused") in the message.
fn classify(error: reqwest::Error) -> AppError {
    let message = describe(&error);
    if error.is_timeout() {
        AppError::timeout(message)
    } else {
        AppError::transport(message)
    }
}

fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
