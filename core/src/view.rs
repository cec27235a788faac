//! View queries: `/{db}/_design/{design}/_view/{view}`.

use serde_json::Value;

use crate::client::CouchClient;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{segments, RequestOptions};

#[derive(Debug)]
pub struct Views<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Views<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// GET the view, with `query` (e.g. `limit`, `descending`) as parameters.
    pub fn get(
        &self,
        db: &str,
        design: &str,
        view: &str,
        query: Option<Value>,
    ) -> Result<Value, CouchError> {
        let mut options = RequestOptions::new(HttpMethod::Get, path(db, design, view));
        options.data = query;
        self.client.run_json(options)
    }

    /// POST the view with a selection body such as `{"keys": [...]}`.
    pub fn run(
        &self,
        db: &str,
        design: &str,
        view: &str,
        selection: Value,
    ) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Post, path(db, design, view)).data(selection))
    }
}

fn path(db: &str, design: &str, view: &str) -> String {
    segments(&[db, "_design", design, "_view", view])
}
