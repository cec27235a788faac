//! Single-document operations: `/{db}/{id}`.
//!
//! Several of these are two-step compositions (look up a revision or an id,
//! then write). The steps run back to back with no rollback: if the second
//! request fails, whatever the first one did stays done.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::CouchClient;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{segments, RequestOptions};
use crate::types::reject_application_error;

#[derive(Debug)]
pub struct Documents<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Documents<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// PUT `doc` at `/{db}/{id}`.
    ///
    /// The id is `doc["_id"]` when present; otherwise one is requested from
    /// `/_uuids` first. The server's acknowledgement is returned unchanged.
    /// A non-string `_id` is rejected before anything is sent.
    pub fn create(&self, db: &str, doc: Value) -> Result<Value, CouchError> {
        let doc = into_object(doc)?;
        let id = match doc.get("_id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(CouchError::Configuration(format!(
                    "document `_id` must be a string, got {other}"
                )))
            }
            None => {
                let id = self.client.server().next_uuid()?;
                debug!(db, id = %id, "allocated document id");
                id
            }
        };
        self.client.run_json(
            RequestOptions::new(HttpMethod::Put, segments(&[db, id.as_str()])).data(Value::Object(doc)),
        )
    }

    /// GET `/{db}/{id}` with optional query parameters (`rev`, `revs`, ...).
    pub fn get(&self, db: &str, id: &str, query: Option<Value>) -> Result<Value, CouchError> {
        let mut options = RequestOptions::new(HttpMethod::Get, segments(&[db, id]));
        options.data = query;
        self.client.run_json(options)
    }

    /// Current `_rev` of a document.
    pub fn revision(&self, db: &str, id: &str) -> Result<String, CouchError> {
        let doc = reject_application_error(self.get(db, id, None)?)?;
        revision_of(&doc)
    }

    /// Fetch the document, overwrite its top-level fields with `changes` and
    /// store the whole result again.
    ///
    /// The fetched `_rev` rides along, so a concurrent writer makes the
    /// server answer `{"error":"conflict"}`. Fields in `changes` replace
    /// fetched ones wholesale, `_id` and `_rev` included.
    pub fn update(&self, db: &str, id: &str, changes: Value) -> Result<Value, CouchError> {
        let changes = into_object(changes)?;
        let mut doc = into_object(reject_application_error(self.get(db, id, None)?)?)?;
        doc.extend(changes);
        if !doc.contains_key("_id") {
            doc.insert("_id".to_string(), Value::String(id.to_string()));
        }
        self.create(db, Value::Object(doc))
    }

    /// Soft delete: replace the document with a `_deleted` tombstone.
    pub fn remove(&self, db: &str, id: &str) -> Result<Value, CouchError> {
        let rev = self.revision(db, id)?;
        self.client.run_json(
            RequestOptions::new(HttpMethod::Put, segments(&[db, id])).data(json!({
                "_id": id,
                "_rev": rev,
                "_deleted": true,
            })),
        )
    }

    /// Hard delete: DELETE `/{db}/{id}?rev=...`.
    pub fn destroy(&self, db: &str, id: &str) -> Result<Value, CouchError> {
        let rev = self.revision(db, id)?;
        self.client.run_json(
            RequestOptions::new(HttpMethod::Delete, segments(&[db, id])).data(json!({ "rev": rev })),
        )
    }
}

pub(crate) fn into_object(value: Value) -> Result<Map<String, Value>, CouchError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CouchError::Configuration(format!(
            "documents must be JSON objects, got {other}"
        ))),
    }
}

pub(crate) fn revision_of(doc: &Value) -> Result<String, CouchError> {
    doc.get("_rev")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(CouchError::MissingField { field: "_rev" })
}
