//! In-memory databases with CouchDB's revision and error semantics.
//!
//! Every operation returns a status plus a JSON body shaped like the real
//! server's reply, so handlers only translate HTTP in and out.

use std::collections::{BTreeMap, HashMap};

use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub type Outcome = (StatusCode, Value);

#[derive(Debug, Default, Clone)]
pub struct Database {
    docs: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct Store {
    databases: BTreeMap<String, Database>,
    admin: Option<(String, String)>,
    sessions: HashMap<String, String>,
}

pub fn error(status: StatusCode, error: &str, reason: &str) -> Outcome {
    (status, json!({ "error": error, "reason": reason }))
}

fn no_db() -> Outcome {
    error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
}

fn conflict() -> Outcome {
    error(StatusCode::CONFLICT, "conflict", "Document update conflict.")
}

fn ok(status: StatusCode) -> Outcome {
    (status, json!({ "ok": true }))
}

pub fn new_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, new_uuid())
}

fn rev_of(doc: &Value) -> Option<&str> {
    doc.get("_rev").and_then(Value::as_str)
}

fn is_deleted(doc: &Value) -> bool {
    doc.get("_deleted") == Some(&Value::Bool(true))
}

impl Database {
    fn live(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.docs.iter().filter(|(_, doc)| !is_deleted(doc))
    }

    fn get(&self, id: &str) -> Outcome {
        match self.docs.get(id) {
            Some(doc) if is_deleted(doc) => {
                error(StatusCode::NOT_FOUND, "not_found", "deleted")
            }
            Some(doc) => (StatusCode::OK, doc.clone()),
            None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
        }
    }

    /// Store `body` at `id`, enforcing `_rev` against the current revision.
    fn write(&mut self, id: &str, body: Value) -> Outcome {
        let Value::Object(mut doc) = body else {
            return error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Document must be a JSON object",
            );
        };
        let given = doc.get("_rev").and_then(Value::as_str).map(str::to_string);
        let current = self.docs.get(id);
        let current_rev = current.and_then(rev_of).map(str::to_string);
        let live = current.is_some_and(|d| !is_deleted(d));

        if live && given != current_rev {
            return conflict();
        }
        if !live && given.is_some() && given != current_rev {
            return conflict();
        }

        let rev = next_rev(current_rev.as_deref());
        let deleting = doc.get("_deleted") == Some(&Value::Bool(true));
        if deleting && !live {
            return error(StatusCode::NOT_FOUND, "not_found", "missing");
        }

        let stored = if deleting {
            json!({ "_id": id, "_rev": rev, "_deleted": true })
        } else {
            doc.insert("_id".to_string(), Value::String(id.to_string()));
            doc.insert("_rev".to_string(), Value::String(rev.clone()));
            Value::Object(doc)
        };
        self.docs.insert(id.to_string(), stored);

        let status = if deleting {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        (status, json!({ "ok": true, "id": id, "rev": rev }))
    }

    fn delete(&mut self, id: &str, rev: Option<&str>) -> Outcome {
        let current = match self.docs.get(id) {
            Some(doc) if !is_deleted(doc) => doc,
            _ => return error(StatusCode::NOT_FOUND, "not_found", "missing"),
        };
        if rev.is_none() || rev != rev_of(current) {
            return conflict();
        }
        let rev = next_rev(rev);
        self.docs.insert(
            id.to_string(),
            json!({ "_id": id, "_rev": rev, "_deleted": true }),
        );
        (StatusCode::OK, json!({ "ok": true, "id": id, "rev": rev }))
    }

    fn row(&self, id: &str, include_docs: bool) -> Value {
        match self.docs.get(id) {
            Some(doc) if is_deleted(doc) => json!({
                "id": id,
                "key": id,
                "value": { "rev": rev_of(doc), "deleted": true },
            }),
            Some(doc) => {
                let mut row = json!({ "id": id, "key": id, "value": { "rev": rev_of(doc) } });
                if include_docs {
                    row["doc"] = doc.clone();
                }
                row
            }
            None => json!({ "key": id, "error": "not_found" }),
        }
    }
}

impl Store {
    pub fn with_admin(name: &str, password: &str) -> Self {
        Self {
            admin: Some((name.to_string(), password.to_string())),
            ..Self::default()
        }
    }

    pub fn all_dbs(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    pub fn create_db(&mut self, name: &str) -> Outcome {
        if self.databases.contains_key(name) {
            return error(
                StatusCode::PRECONDITION_FAILED,
                "file_exists",
                "The database could not be created, the file already exists.",
            );
        }
        self.databases.insert(name.to_string(), Database::default());
        ok(StatusCode::CREATED)
    }

    pub fn delete_db(&mut self, name: &str) -> Outcome {
        match self.databases.remove(name) {
            Some(_) => ok(StatusCode::OK),
            None => no_db(),
        }
    }

    pub fn db_info(&self, name: &str) -> Outcome {
        let Some(db) = self.databases.get(name) else {
            return no_db();
        };
        let doc_count = db.live().count();
        (
            StatusCode::OK,
            json!({
                "db_name": name,
                "doc_count": doc_count,
                "doc_del_count": db.docs.len() - doc_count,
            }),
        )
    }

    pub fn get_doc(&self, db: &str, id: &str) -> Outcome {
        match self.databases.get(db) {
            Some(database) => database.get(id),
            None => no_db(),
        }
    }

    pub fn put_doc(&mut self, db: &str, id: &str, body: Value) -> Outcome {
        match self.databases.get_mut(db) {
            Some(database) => database.write(id, body),
            None => no_db(),
        }
    }

    pub fn delete_doc(&mut self, db: &str, id: &str, rev: Option<&str>) -> Outcome {
        match self.databases.get_mut(db) {
            Some(database) => database.delete(id, rev),
            None => no_db(),
        }
    }

    /// COPY `id` to `destination` as a fresh document.
    pub fn copy_doc(&mut self, db: &str, id: &str, destination: &str) -> Outcome {
        let Some(database) = self.databases.get_mut(db) else {
            return no_db();
        };
        let (status, source) = database.get(id);
        if status != StatusCode::OK {
            return (status, source);
        }
        let mut copy = source;
        if let Some(fields) = copy.as_object_mut() {
            fields.remove("_rev");
            fields.remove("_id");
        }
        database.write(destination, copy)
    }

    pub fn bulk_docs(&mut self, db: &str, docs: Vec<Value>) -> Outcome {
        let Some(database) = self.databases.get_mut(db) else {
            return no_db();
        };
        let results = docs
            .into_iter()
            .map(|doc| {
                let id = doc
                    .get("_id")
                    .and_then(Value::as_str)
                    .map_or_else(new_uuid, str::to_string);
                let (status, reply) = database.write(&id, doc);
                if status.is_success() {
                    reply
                } else {
                    let mut failure = Map::new();
                    failure.insert("id".to_string(), Value::String(id));
                    if let Value::Object(fields) = reply {
                        failure.extend(fields);
                    }
                    Value::Object(failure)
                }
            })
            .collect();
        (StatusCode::CREATED, Value::Array(results))
    }

    pub fn all_docs(&self, db: &str, keys: Option<Vec<String>>, include_docs: bool) -> Outcome {
        let Some(database) = self.databases.get(db) else {
            return no_db();
        };
        let rows: Vec<Value> = match keys {
            Some(keys) => keys.iter().map(|k| database.row(k, include_docs)).collect(),
            None => database
                .live()
                .map(|(id, _)| database.row(id, include_docs))
                .collect(),
        };
        (
            StatusCode::OK,
            json!({ "total_rows": database.live().count(), "offset": 0, "rows": rows }),
        )
    }

    /// Map functions are not evaluated: a view emits `(doc._id, doc._rev)`
    /// for every live non-design document, optionally narrowed to `keys`.
    pub fn view(
        &self,
        db: &str,
        design: &str,
        view: &str,
        keys: Option<Vec<Value>>,
        limit: Option<usize>,
    ) -> Outcome {
        let Some(database) = self.databases.get(db) else {
            return no_db();
        };
        let (status, design_doc) = database.get(&format!("_design/{design}"));
        if status != StatusCode::OK || design_doc.pointer(&format!("/views/{view}")).is_none() {
            return error(StatusCode::NOT_FOUND, "not_found", "missing_named_view");
        }
        let rows: Vec<Value> = database
            .live()
            .filter(|(id, _)| !id.starts_with("_design/"))
            .filter(|(id, _)| {
                keys.as_ref()
                    .is_none_or(|keys| keys.contains(&Value::String(id.to_string())))
            })
            .take(limit.unwrap_or(usize::MAX))
            .map(|(id, doc)| json!({ "id": id, "key": id, "value": rev_of(doc) }))
            .collect();
        (
            StatusCode::OK,
            json!({ "total_rows": rows.len(), "offset": 0, "rows": rows }),
        )
    }

    pub fn design_info(&self, db: &str, design: &str) -> Outcome {
        let (status, doc) = self.get_doc(db, &format!("_design/{design}"));
        if status != StatusCode::OK {
            return (status, doc);
        }
        (
            StatusCode::OK,
            json!({
                "name": design,
                "view_index": {
                    "signature": rev_of(&doc),
                    "language": "javascript",
                    "updater_running": false,
                    "compact_running": false,
                    "waiting_clients": 0,
                },
            }),
        )
    }

    pub fn replicate(&mut self, source: &str, target: &str, create_target: bool) -> Outcome {
        let Some(docs) = self.databases.get(source).map(|db| db.docs.clone()) else {
            return error(StatusCode::NOT_FOUND, "db_not_found", "could not open source");
        };
        if !create_target && !self.databases.contains_key(target) {
            return error(StatusCode::NOT_FOUND, "db_not_found", "could not open target");
        }
        self.databases
            .entry(target.to_string())
            .or_default()
            .docs
            .extend(docs);
        (
            StatusCode::OK,
            json!({ "ok": true, "session_id": new_uuid(), "history": [] }),
        )
    }

    /// Check credentials against the configured admin and open a session.
    pub fn login(&mut self, name: &str, password: &str) -> Option<String> {
        let (admin, secret) = self.admin.as_ref()?;
        if admin != name || secret != password {
            return None;
        }
        let token = new_uuid();
        self.sessions.insert(token.clone(), name.to_string());
        Some(token)
    }

    pub fn session_user(&self, token: &str) -> Option<&str> {
        self.sessions.get(token).map(String::as_str)
    }

    pub fn logout(&mut self, token: &str) {
        self.sessions.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(db: &str) -> Store {
        let mut store = Store::default();
        store.create_db(db);
        store
    }

    #[test]
    fn duplicate_database_is_file_exists() {
        let mut store = store_with("albums");
        let (status, body) = store.create_db("albums");
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "file_exists");
    }

    #[test]
    fn deleting_missing_database_is_not_found() {
        let (status, body) = Store::default().delete_db("ghost");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[test]
    fn write_requires_current_revision() {
        let mut store = store_with("albums");
        let (status, first) = store.put_doc("albums", "a", json!({"x": 1}));
        assert_eq!(status, StatusCode::CREATED);
        assert!(first["rev"].as_str().unwrap().starts_with("1-"));

        let (status, body) = store.put_doc("albums", "a", json!({"x": 2}));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (status, second) =
            store.put_doc("albums", "a", json!({"x": 2, "_rev": first["rev"]}));
        assert_eq!(status, StatusCode::CREATED);
        assert!(second["rev"].as_str().unwrap().starts_with("2-"));
    }

    #[test]
    fn tombstone_hides_document() {
        let mut store = store_with("albums");
        let (_, created) = store.put_doc("albums", "a", json!({}));
        let (status, _) = store.put_doc(
            "albums",
            "a",
            json!({"_rev": created["rev"], "_deleted": true}),
        );
        assert_eq!(status, StatusCode::OK);
        let (status, body) = store.get_doc("albums", "a");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["reason"], "deleted");
    }

    #[test]
    fn delete_checks_revision() {
        let mut store = store_with("albums");
        let (_, created) = store.put_doc("albums", "a", json!({}));
        assert_eq!(store.delete_doc("albums", "a", None).0, StatusCode::CONFLICT);
        assert_eq!(
            store.delete_doc("albums", "a", Some("9-x")).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            store
                .delete_doc("albums", "a", created["rev"].as_str())
                .0,
            StatusCode::OK
        );
    }

    #[test]
    fn all_docs_reports_missing_keys() {
        let mut store = store_with("albums");
        store.put_doc("albums", "a", json!({}));
        let (_, body) = store.all_docs("albums", Some(vec!["a".into(), "b".into()]), false);
        assert_eq!(body["rows"][0]["id"], "a");
        assert_eq!(body["rows"][1]["error"], "not_found");
    }

    #[test]
    fn replicate_can_create_target() {
        let mut store = store_with("src");
        store.put_doc("src", "a", json!({"x": 1}));
        let (status, _) = store.replicate("src", "dst", false);
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = store.replicate("src", "dst", true);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(store.get_doc("dst", "a").1["x"], 1);
    }

    #[test]
    fn login_needs_matching_admin() {
        let mut store = Store::with_admin("admin", "pw");
        assert!(store.login("admin", "nope").is_none());
        let token = store.login("admin", "pw").unwrap();
        assert_eq!(store.session_user(&token), Some("admin"));
        store.logout(&token);
        assert!(store.session_user(&token).is_none());
    }
}
