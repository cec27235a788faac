//! Blocking HTTP transport backed by `ureq`.

use ureq::http::{Method, Request};
use ureq::Agent;

use crate::error::CouchError;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Executes requests with a shared `ureq::Agent`.
///
/// The agent is configured so 4xx/5xx responses come back as data: the
/// server's error envelope is a normal reply for this client. Reply bodies
/// are read whole; `with_body_limit` caps them if the caller wants a bound.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    body_limit: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .build()
            .new_agent();
        Self::with_agent(agent)
    }

    /// Use a caller-configured agent (timeouts, proxies, TLS).
    pub fn with_agent(agent: Agent) -> Self {
        Self {
            agent,
            body_limit: u64::MAX,
        }
    }

    /// Fail with `CouchError::Transport` on reply bodies over `bytes`.
    pub fn with_body_limit(mut self, bytes: u64) -> Self {
        self.body_limit = bytes;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CouchError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| CouchError::Configuration(e.to_string()))?;
        let mut builder = Request::builder().method(method).uri(request.url());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(authorization) = request.authorization() {
            builder = builder.header("Authorization", authorization);
        }

        let sent = match &request.body {
            Some(body) => builder
                .body(body.as_bytes())
                .map(|req| self.agent.run(req)),
            None => builder.body(()).map(|req| self.agent.run(req)),
        };
        let mut response = sent
            .map_err(|e| CouchError::Configuration(e.to_string()))?
            .map_err(|e| CouchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_string()
            .map_err(|e| CouchError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
