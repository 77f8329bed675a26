//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the only place I/O happens. `UreqTransport` drives a
//! blocking `ureq` agent on tokio's blocking pool so store actions stay
//! async. HTTP status-as-error is disabled on the agent: 4xx/5xx responses
//! come back as data and `DatasourceClient::parse_response` interprets them.

use std::future::Future;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one HTTP round-trip.
///
/// An `Err` means no response was obtained. Any response, whatever its
/// status, is returned as `Ok`.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ApiError>> + Send;
}

/// `Transport` backed by a shared `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
    }
}

fn execute_blocking(agent: &ureq::Agent, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let headers = &req.headers;
    let result = match (req.method, req.body.as_deref()) {
        (HttpMethod::Get, _) => with_headers(agent.get(&req.url), headers).call(),
        (HttpMethod::Delete, _) => with_headers(agent.delete(&req.url), headers).call(),
        (HttpMethod::Post, Some(body)) => {
            with_headers(agent.post(&req.url), headers).send(body.as_bytes())
        }
        (HttpMethod::Post, None) => with_headers(agent.post(&req.url), headers).send_empty(),
        (HttpMethod::Put, Some(body)) => {
            with_headers(agent.put(&req.url), headers).send(body.as_bytes())
        }
        (HttpMethod::Put, None) => with_headers(agent.put(&req.url), headers).send_empty(),
    };
    let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
