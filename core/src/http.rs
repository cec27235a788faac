//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! request builder produces `HttpRequest` values and the dispatcher hands
//! them to a `Transport`, which performs the network round-trip and returns
//! an `HttpResponse`. Everything above the transport stays deterministic and
//! can be exercised with an in-memory transport in tests.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be logged,
//! recorded or replayed without lifetime concerns.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::CouchError;

/// HTTP method for a request. `Copy` is CouchDB's document copy verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Copy,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Copy => "COPY",
        }
    }

    /// Methods whose payload travels in the query string rather than the body.
    pub fn encodes_data_as_query(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully normalized HTTP request described as plain data.
///
/// Built by `RequestOptions::normalize`. `path` is always absolute and
/// already carries any query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub host: String,
    pub port: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// `user:password` credential, sent as Basic auth.
    pub auth: Option<String>,
    /// Whether the caller wants the response headers surfaced in the reply.
    pub want_headers: bool,
}

impl HttpRequest {
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    /// Value for the `Authorization` header derived from `auth`.
    pub fn authorization(&self) -> Option<String> {
        self.auth
            .as_ref()
            .map(|auth| format!("Basic {}", STANDARD.encode(auth)))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Case-insensitive header lookup over an ordered header list.
pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Executes one HTTP round-trip.
///
/// Implementations must perform exactly one request per call and report
/// connection-level failures as `CouchError::Transport`. Non-2xx statuses are
/// not failures: they come back as an ordinary `HttpResponse`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CouchError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, CouchError>,
{
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CouchError> {
        self(request)
    }
}
