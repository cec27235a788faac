//! Design documents: `/{db}/_design/{name}`.

use serde_json::{json, Value};
use tracing::debug;

use crate::client::CouchClient;
use crate::document::{into_object, revision_of};
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{encode_segment, segments, RequestOptions};
use crate::types::{application_error, reject_application_error};

#[derive(Debug)]
pub struct Designs<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Designs<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// PUT the design document. Without a `_rev`, a second create of the
    /// same name answers `{"error":"conflict"}`.
    pub fn create(&self, db: &str, name: &str, design: Value) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Put, path(db, name)).data(design))
    }

    pub fn get(&self, db: &str, name: &str) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Get, path(db, name)))
    }

    /// GET `.../_info`: view index status.
    pub fn info(&self, db: &str, name: &str) -> Result<Value, CouchError> {
        self.client.run_json(RequestOptions::new(
            HttpMethod::Get,
            segments(&[db, "_design", name, "_info"]),
        ))
    }

    /// Store `design`, filling in the current `_rev` when the caller left it
    /// out. A design document that does not exist yet is simply created.
    pub fn update(&self, db: &str, name: &str, design: Value) -> Result<Value, CouchError> {
        let mut design = into_object(design)?;
        if !design.contains_key("_rev") {
            let current = self.get(db, name)?;
            match application_error(&current) {
                Some(err) if err.error == "not_found" => {
                    debug!(db, name, "design document is new");
                }
                Some(err) => return Err(CouchError::Application(err)),
                None => {
                    design.insert("_rev".to_string(), Value::String(revision_of(&current)?));
                }
            }
        }
        self.create(db, name, Value::Object(design))
    }

    /// COPY the design document to `_design/{destination}` in the same database.
    pub fn copy(&self, db: &str, name: &str, destination: &str) -> Result<Value, CouchError> {
        self.client.run_json(
            RequestOptions::new(HttpMethod::Copy, path(db, name))
                .header("Destination", format!("_design/{}", encode_segment(destination))),
        )
    }

    /// DELETE the design document at its current revision.
    pub fn destroy(&self, db: &str, name: &str) -> Result<Value, CouchError> {
        let rev = revision_of(&reject_application_error(self.get(db, name)?)?)?;
        self.client.run_json(
            RequestOptions::new(HttpMethod::Delete, path(db, name)).data(json!({ "rev": rev })),
        )
    }
}

fn path(db: &str, name: &str) -> String {
    segments(&[db, "_design", name])
}
