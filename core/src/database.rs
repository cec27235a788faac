//! Database-level operations: `/{db}`.

use serde_json::Value;

use crate::client::CouchClient;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::{segments, RequestOptions};

/// Handle for database operations, borrowed from a `CouchClient`.
#[derive(Debug)]
pub struct Databases<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Databases<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// PUT `/{db}`. A second create answers `{"error":"file_exists"}`.
    pub fn create(&self, db: &str) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Put, segments(&[db])))
    }

    /// DELETE `/{db}`. A missing database answers `{"error":"not_found"}`.
    pub fn destroy(&self, db: &str) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Delete, segments(&[db])))
    }

    /// GET `/{db}`.
    pub fn info(&self, db: &str) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Get, segments(&[db])))
    }

    /// True when the info reply names the database rather than an error.
    pub fn exists(&self, db: &str) -> Result<bool, CouchError> {
        let info = self.info(db)?;
        Ok(info.get("error").is_none() && info.get("db_name").is_some())
    }

    /// GET `/{db}/_all_docs` with optional query parameters.
    pub fn all_docs(&self, db: &str, query: Option<Value>) -> Result<Value, CouchError> {
        let mut options = RequestOptions::new(HttpMethod::Get, segments(&[db, "_all_docs"]));
        options.data = query;
        self.client.run_json(options)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{client, ok, status};

    #[test]
    fn create_puts_database_path() {
        let c = client(vec![status(201, r#"{"ok":true}"#)]);
        assert_eq!(c.databases().create("albums").unwrap(), json!({"ok": true}));
        let sent = c.transport().requests();
        assert_eq!(sent[0].method, HttpMethod::Put);
        assert_eq!(sent[0].path, "/albums");
        assert!(sent[0].body.is_none());
    }

    #[test]
    fn destroy_forwards_not_found() {
        let c = client(vec![status(
            404,
            r#"{"error":"not_found","reason":"Database does not exist."}"#,
        )]);
        let reply = c.databases().destroy("ghost").unwrap();
        assert_eq!(reply["error"], "not_found");
        assert_eq!(c.transport().requests()[0].method, HttpMethod::Delete);
    }

    #[test]
    fn exists_reads_db_name() {
        let c = client(vec![
            ok(r#"{"db_name":"albums","doc_count":0}"#),
            status(404, r#"{"error":"not_found","reason":"no_db_file"}"#),
        ]);
        assert!(c.databases().exists("albums").unwrap());
        assert!(!c.databases().exists("ghost").unwrap());
    }

    #[test]
    fn names_are_escaped() {
        let c = client(vec![status(201, r#"{"ok":true}"#)]);
        c.databases().create("team/albums").unwrap();
        assert_eq!(c.transport().requests()[0].path, "/team%2Falbums");
    }

    #[test]
    fn all_docs_passes_query() {
        let c = client(vec![ok(r#"{"total_rows":0,"offset":0,"rows":[]}"#)]);
        c.databases()
            .all_docs("albums", Some(json!({"include_docs": true})))
            .unwrap();
        assert_eq!(
            c.transport().requests()[0].path,
            "/albums/_all_docs?include_docs=true"
        );
    }
}
