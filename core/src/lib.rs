//! Blocking client for the CouchDB HTTP API.
//!
//! # Overview
//! Turns logical operations (create a database, update a document, query a
//! view, log in) into normalized `HttpRequest` values, runs them through a
//! `Transport` and hands back the decoded JSON reply.
//!
//! # Design
//! - `RequestOptions::normalize` is the single place where paths, query
//!   strings, default headers and credentials are resolved. It never does
//!   I/O, so configuration mistakes fail before anything is sent.
//! - `CouchClient::run` performs exactly one transport call per request and
//!   reports transport failures through the returned `Result`.
//! - The server's `{"error": ...}` envelope is a successful reply; callers
//!   check `Reply::application_error` or the JSON themselves.
//! - Operation groups (`databases()`, `documents()`, `bulk()`, `designs()`,
//!   `views()`, `server()`, `session()`) borrow the client and compose one to
//!   three requests each.
//! - The `ureq` feature (on by default) provides `UreqTransport`; any
//!   `Fn(&HttpRequest) -> Result<HttpResponse, CouchError>` is a transport too.

pub mod bulk;
pub mod client;
pub mod config;
pub mod database;
pub mod design;
pub mod document;
pub mod error;
pub mod http;
pub mod request;
pub mod server;
pub mod session;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;
pub mod view;

#[cfg(test)]
mod testing;

pub use client::CouchClient;
pub use config::ConnectionConfig;
pub use error::{ApplicationError, CouchError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use request::RequestOptions;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{Reply, ReplyBody};
