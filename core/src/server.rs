//! Server-level endpoints: welcome, `_replicate`, `_uuids`, `_all_dbs`,
//! `_stats`, `_restart`, `_active_tasks`.

use serde_json::{json, Value};

use crate::client::CouchClient;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{segments, RequestOptions};
use crate::types::{reject_application_error, Uuids};

#[derive(Debug)]
pub struct Server<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Server<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// GET `/`, the welcome document.
    pub fn info(&self) -> Result<Value, CouchError> {
        self.client.run_json(RequestOptions::new(HttpMethod::Get, "/"))
    }

    pub fn version(&self) -> Result<String, CouchError> {
        let info = reject_application_error(self.info()?)?;
        info.get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(CouchError::MissingField { field: "version" })
    }

    /// POST `/_replicate`, copying `source` into `target`.
    pub fn replicate(
        &self,
        source: &str,
        target: &str,
        create_target: bool,
    ) -> Result<Value, CouchError> {
        self.client.run_json(
            RequestOptions::new(HttpMethod::Post, "/_replicate").data(json!({
                "source": source,
                "target": target,
                "create_target": create_target,
            })),
        )
    }

    /// GET `/_uuids?count=N`.
    pub fn uuids(&self, count: u32) -> Result<Value, CouchError> {
        self.client.run_json(
            RequestOptions::new(HttpMethod::Get, "/_uuids").data(json!({ "count": count })),
        )
    }

    /// A single server-generated id.
    pub(crate) fn next_uuid(&self) -> Result<String, CouchError> {
        let reply = reject_application_error(self.uuids(1)?)?;
        let Uuids { uuids } = serde_json::from_value(reply)?;
        uuids
            .into_iter()
            .next()
            .ok_or(CouchError::MissingField { field: "uuids" })
    }

    /// GET `/_all_dbs`.
    pub fn all_dbs(&self) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Get, "/_all_dbs"))
    }

    /// GET `/_stats`, narrowed to `/_stats/{group}` or `/_stats/{group}/{key}`.
    pub fn stats(&self, group: Option<&str>, key: Option<&str>) -> Result<Value, CouchError> {
        let mut parts = vec!["_stats"];
        if let Some(group) = group {
            parts.push(group);
            parts.extend(key);
        }
        self.client
            .run_json(RequestOptions::new(HttpMethod::Get, segments(&parts)))
    }

    /// POST `/_restart`. The server wants a JSON content type even with no
    /// meaningful body.
    pub fn restart(&self) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Post, "/_restart").data(json!({})))
    }

    /// GET `/_active_tasks`.
    pub fn active_tasks(&self) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Get, "/_active_tasks"))
    }
}
