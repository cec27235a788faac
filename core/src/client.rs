//! The dispatcher: resolves request options, runs them through a transport
//! and hands back the reply.
//!
//! # Design
//! `CouchClient` owns the `ConnectionConfig`, the transport and an optional
//! cached session token; it carries no other state between calls. `run`
//! issues exactly one transport call per invocation and delivers either a
//! `Reply` or an error through the same `Result`. Configuration problems
//! surface before the transport is touched.
//!
//! The operation groups (`databases()`, `documents()`, ...) are thin handles
//! borrowing the client, so they share its settings without any inheritance.

use serde_json::Value;
use tracing::{debug, warn};

use crate::bulk::Bulk;
use crate::config::ConnectionConfig;
use crate::database::Databases;
use crate::design::Designs;
use crate::document::Documents;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{absolute_path, RequestOptions};
use crate::server::Server;
use crate::session::Session;
use crate::types::Reply;
use crate::view::Views;

/// Blocking client for a CouchDB server.
#[derive(Debug, Clone)]
pub struct CouchClient<T> {
    config: ConnectionConfig,
    session: Option<String>,
    transport: T,
}

impl<T: Transport> CouchClient<T> {
    /// Build a client without contacting the server, ignoring `config.cookies`.
    /// Public construction goes through `connect` so cookie sessions are
    /// always established up front.
    pub(crate) fn new(config: ConnectionConfig, transport: T) -> Self {
        Self {
            config,
            session: None,
            transport,
        }
    }

    /// Build a client and, when `config.cookies` is set, log in once and
    /// cache the session token for every later request.
    pub fn connect(config: ConnectionConfig, transport: T) -> Result<Self, CouchError> {
        let mut client = Self::new(config, transport);
        if client.config.cookies {
            let (Some(user), Some(password)) =
                (client.config.user.clone(), client.config.password.clone())
            else {
                return Err(CouchError::Configuration(
                    "cookie sessions need both user and password".to_string(),
                ));
            };
            let token = client.session().get(&user, &password)?;
            debug!(user = %user, "cached session cookie");
            client.session = Some(token);
        }
        Ok(client)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Normalize `options`, execute them and wrap the response.
    pub fn run(&self, options: RequestOptions) -> Result<Reply, CouchError> {
        let request = options.normalize(&self.config, self.session.as_deref())?;
        debug!(method = %request.method, path = %request.path, "dispatching request");
        let response = self.transport.execute(&request).inspect_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "request failed");
        })?;
        debug!(status = response.status, "received response");
        Ok(Reply::from_response(response, request.want_headers))
    }

    /// Like `run`, but requires a JSON body.
    pub(crate) fn run_json(&self, options: RequestOptions) -> Result<Value, CouchError> {
        self.run(options)?.into_json()
    }

    /// GET `path`, sending `query` as the query string.
    pub fn get(&self, path: &str, query: Option<Value>) -> Result<Value, CouchError> {
        self.run_json(with_data(HttpMethod::Get, path, query))
    }

    pub fn put(&self, path: &str, data: Option<Value>) -> Result<Value, CouchError> {
        self.run_json(with_data(HttpMethod::Put, path, data))
    }

    pub fn post(&self, path: &str, data: Option<Value>) -> Result<Value, CouchError> {
        self.run_json(with_data(HttpMethod::Post, path, data))
    }

    /// DELETE `path`, sending `query` (typically `{"rev": ...}`) as the query string.
    pub fn delete(&self, path: &str, query: Option<Value>) -> Result<Value, CouchError> {
        self.run_json(with_data(HttpMethod::Delete, path, query))
    }

    pub fn databases(&self) -> Databases<'_, T> {
        Databases::new(self)
    }

    pub fn documents(&self) -> Documents<'_, T> {
        Documents::new(self)
    }

    pub fn bulk(&self) -> Bulk<'_, T> {
        Bulk::new(self)
    }

    pub fn designs(&self) -> Designs<'_, T> {
        Designs::new(self)
    }

    pub fn views(&self) -> Views<'_, T> {
        Views::new(self)
    }

    pub fn server(&self) -> Server<'_, T> {
        Server::new(self)
    }

    pub fn session(&self) -> Session<'_, T> {
        Session::new(self)
    }
}

#[cfg(feature = "ureq")]
impl CouchClient<crate::transport::UreqTransport> {
    /// Connect over HTTP with the bundled `ureq` transport.
    pub fn open(config: ConnectionConfig) -> Result<Self, CouchError> {
        Self::connect(config, crate::transport::UreqTransport::new())
    }
}

fn with_data(method: HttpMethod, path: &str, data: Option<Value>) -> RequestOptions {
    let options = RequestOptions::new(method, absolute_path(path));
    match data {
        Some(data) => options.data(data),
        None => options,
    }
}
