//! Error types for the CouchDB client.
//!
//! # Design
//! Three failure families travel through the same `Result` channel:
//! `Configuration` is returned before any I/O when a request cannot be
//! resolved, `Transport` carries connection-level failures reported by the
//! transport, and the JSON variants cover composite operations that need to
//! look inside a reply. The server's own `{"error": ...}` envelope is not an
//! error here: it arrives as a successful `Reply` and callers inspect it via
//! `Reply::application_error`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors returned by `CouchClient` and its operation handles.
#[derive(Debug, thiserror::Error)]
pub enum CouchError {
    /// The request could not be resolved to a host, port and path, or its
    /// payload cannot be expressed for the chosen method.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transport failed to complete the HTTP round-trip.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A reply body could not be decoded into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A multi-step operation needed a value from an intermediate reply and
    /// the server answered with an error envelope instead.
    #[error("server rejected intermediate request: {0}")]
    Application(ApplicationError),

    /// A multi-step operation needed a field the reply did not contain.
    #[error("reply is missing `{field}`")]
    MissingField { field: &'static str },
}

impl From<serde_json::Error> for CouchError {
    fn from(e: serde_json::Error) -> Self {
        CouchError::Deserialization(e.to_string())
    }
}

/// The server's JSON error envelope, e.g. `{"error":"conflict","reason":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationError {
    pub error: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
