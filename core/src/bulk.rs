//! Many-document operations over `_bulk_docs` and `_all_docs`.

use serde_json::{json, Value};
use tracing::debug;

use crate::client::CouchClient;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{segments, RequestOptions};
use crate::types::{reject_application_error, AllDocs};

#[derive(Debug)]
pub struct Bulk<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Bulk<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// POST `{"docs": [...]}` to `/{db}/_bulk_docs`. The reply lists one
    /// result per document, in order.
    pub fn create(&self, db: &str, docs: Vec<Value>) -> Result<Value, CouchError> {
        self.client.run_json(
            RequestOptions::new(HttpMethod::Post, segments(&[db, "_bulk_docs"]))
                .data(json!({ "docs": docs })),
        )
    }

    /// GET `/{db}/_all_docs?keys=[...]`: revisions for the given ids.
    pub fn get(&self, db: &str, ids: &[&str]) -> Result<Value, CouchError> {
        self.client.run_json(
            RequestOptions::new(HttpMethod::Get, segments(&[db, "_all_docs"]))
                .data(json!({ "keys": ids })),
        )
    }

    /// Look up current revisions for `ids`, then post `_deleted` tombstones
    /// for every id that exists. Unknown or already deleted ids are skipped.
    pub fn remove(&self, db: &str, ids: &[&str]) -> Result<Value, CouchError> {
        let all: AllDocs = serde_json::from_value(reject_application_error(self.get(db, ids)?)?)?;
        let tombstones: Vec<Value> = all
            .rows
            .into_iter()
            .filter(|row| row.error.is_none())
            .filter_map(|row| {
                let value = row.value?;
                if value.deleted {
                    return None;
                }
                Some(json!({
                    "_id": row.id?,
                    "_rev": value.rev,
                    "_deleted": true,
                }))
            })
            .collect();
        if tombstones.is_empty() {
            debug!(db, "nothing to remove");
            return Ok(Value::Array(Vec::new()));
        }
        debug!(db, count = tombstones.len(), "removing documents");
        self.create(db, tombstones)
    }
}
