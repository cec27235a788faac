//! In-memory stand-in for a CouchDB server, covering the endpoints the
//! client library talks to. Handlers translate HTTP to `Store` calls and
//! reply with CouchDB-shaped JSON, error envelopes included.

pub mod store;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use cookie::Cookie;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub use store::Store;
use store::{error, new_uuid, Outcome};

/// Version reported by the welcome document.
pub const VERSION: &str = "1.5.0";

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_store(Store::default())
}

pub fn app_with_store(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/", get(welcome))
        .route("/_all_dbs", get(all_dbs))
        .route("/_uuids", get(uuids))
        .route("/_active_tasks", get(active_tasks))
        .route("/_replicate", post(replicate))
        .route("/_restart", post(restart))
        .route("/_stats", get(stats))
        .route("/_stats/{group}", get(stats_group))
        .route("/_stats/{group}/{key}", get(stats_key))
        .route(
            "/_session",
            get(session_info).post(session_login).delete(session_logout),
        )
        .route("/{db}", get(db_info).put(db_create).delete(db_delete))
        .route("/{db}/_all_docs", get(all_docs))
        .route("/{db}/_bulk_docs", post(bulk_docs))
        .route("/{db}/_design/{name}", any(design_doc))
        .route("/{db}/_design/{name}/_info", get(design_info))
        .route(
            "/{db}/_design/{name}/_view/{view}",
            get(view_get).post(view_post),
        )
        .route("/{db}/{doc}", any(document))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_store(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_store(store)).await
}

fn reply((status, body): Outcome) -> Response {
    (status, Json(body)).into_response()
}

const SESSION_COOKIE: &str = "AuthSession";

fn auth_session(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(cookies)
        .flatten()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value_trimmed().to_string())
}

fn session_cookie(token: &str) -> String {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
        .to_string()
}

// --- server ---

async fn welcome() -> Json<Value> {
    Json(json!({ "couchdb": "Welcome", "version": VERSION }))
}

async fn all_dbs(State(db): State<Db>) -> Json<Vec<String>> {
    Json(db.read().await.all_dbs())
}

#[derive(Deserialize)]
struct UuidsQuery {
    count: Option<usize>,
}

async fn uuids(Query(query): Query<UuidsQuery>) -> Json<Value> {
    let uuids: Vec<String> = (0..query.count.unwrap_or(1)).map(|_| new_uuid()).collect();
    Json(json!({ "uuids": uuids }))
}

async fn active_tasks() -> Json<Value> {
    Json(json!([]))
}

#[derive(Deserialize)]
struct ReplicateRequest {
    source: String,
    target: String,
    #[serde(default)]
    create_target: bool,
}

async fn replicate(State(db): State<Db>, Json(input): Json<ReplicateRequest>) -> Response {
    debug!(source = %input.source, target = %input.target, "replicating");
    reply(
        db.write()
            .await
            .replicate(&input.source, &input.target, input.create_target),
    )
}

async fn restart() -> Response {
    reply((StatusCode::ACCEPTED, json!({ "ok": true })))
}

fn stats_document(open_databases: usize) -> Value {
    json!({
        "couchdb": {
            "open_databases": {
                "description": "number of open databases",
                "current": open_databases,
            },
            "request_time": {
                "description": "length of a request inside CouchDB without MochiWeb",
                "current": 0.0,
            },
        },
        "httpd": {
            "requests": {
                "description": "number of HTTP requests",
                "current": 0,
            },
        },
    })
}

async fn stats(State(db): State<Db>) -> Json<Value> {
    Json(stats_document(db.read().await.all_dbs().len()))
}

async fn stats_group(State(db): State<Db>, Path(group): Path<String>) -> Response {
    let all = stats_document(db.read().await.all_dbs().len());
    match all.get(&group) {
        Some(section) => reply((StatusCode::OK, json!({ group: section }))),
        None => reply(error(StatusCode::NOT_FOUND, "not_found", "unknown stat group")),
    }
}

async fn stats_key(
    State(db): State<Db>,
    Path((group, key)): Path<(String, String)>,
) -> Response {
    let all = stats_document(db.read().await.all_dbs().len());
    match all.get(&group).and_then(|g| g.get(&key)) {
        Some(stat) => reply((StatusCode::OK, json!({ group: { key: stat } }))),
        None => reply(error(StatusCode::NOT_FOUND, "not_found", "unknown stat")),
    }
}

// --- session ---

#[derive(Deserialize)]
struct Credentials {
    name: String,
    password: String,
}

async fn session_login(State(db): State<Db>, Json(input): Json<Credentials>) -> Response {
    match db.write().await.login(&input.name, &input.password) {
        Some(token) => (
            StatusCode::OK,
            [(header::SET_COOKIE, session_cookie(&token))],
            Json(json!({ "ok": true, "name": input.name, "roles": ["_admin"] })),
        )
            .into_response(),
        None => reply(error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Name or password is incorrect.",
        )),
    }
}

async fn session_info(State(db): State<Db>, headers: HeaderMap) -> Json<Value> {
    let store = db.read().await;
    let token = auth_session(&headers);
    let user = token.as_deref().and_then(|token| store.session_user(token));
    let (name, roles, authenticated) = match user {
        Some(name) => (json!(name), json!(["_admin"]), json!("cookie")),
        None => (Value::Null, json!([]), Value::Null),
    };
    Json(json!({
        "ok": true,
        "userCtx": { "name": name, "roles": roles },
        "info": { "authentication_handlers": ["cookie", "default"], "authenticated": authenticated },
    }))
}

async fn session_logout(State(db): State<Db>, headers: HeaderMap) -> Response {
    if let Some(token) = auth_session(&headers) {
        db.write().await.logout(&token);
    }
    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(""))],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

// --- databases ---

async fn db_info(State(db): State<Db>, Path(name): Path<String>) -> Response {
    reply(db.read().await.db_info(&name))
}

async fn db_create(State(db): State<Db>, Path(name): Path<String>) -> Response {
    debug!(db = %name, "creating database");
    reply(db.write().await.create_db(&name))
}

async fn db_delete(State(db): State<Db>, Path(name): Path<String>) -> Response {
    debug!(db = %name, "deleting database");
    reply(db.write().await.delete_db(&name))
}

#[derive(Deserialize)]
struct AllDocsQuery {
    keys: Option<String>,
    include_docs: Option<bool>,
}

async fn all_docs(
    State(db): State<Db>,
    Path(name): Path<String>,
    Query(query): Query<AllDocsQuery>,
) -> Response {
    let keys = match query.keys.as_deref().map(serde_json::from_str::<Vec<String>>) {
        None => None,
        Some(Ok(keys)) => Some(keys),
        Some(Err(_)) => {
            return reply(error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "`keys` must be a JSON array of strings",
            ))
        }
    };
    reply(
        db.read()
            .await
            .all_docs(&name, keys, query.include_docs.unwrap_or(false)),
    )
}

#[derive(Deserialize)]
struct BulkDocs {
    docs: Vec<Value>,
}

async fn bulk_docs(
    State(db): State<Db>,
    Path(name): Path<String>,
    Json(input): Json<BulkDocs>,
) -> Response {
    reply(db.write().await.bulk_docs(&name, input.docs))
}

// --- documents ---

#[derive(Deserialize)]
struct RevQuery {
    rev: Option<String>,
}

async fn document(
    State(db): State<Db>,
    method: Method,
    Path((name, id)): Path<(String, String)>,
    Query(query): Query<RevQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    document_request(&db, &method, &name, &id, query.rev.as_deref(), &headers, &body).await
}

async fn design_doc(
    State(db): State<Db>,
    method: Method,
    Path((name, design)): Path<(String, String)>,
    Query(query): Query<RevQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = format!("_design/{design}");
    document_request(&db, &method, &name, &id, query.rev.as_deref(), &headers, &body).await
}

async fn document_request(
    db: &Db,
    method: &Method,
    name: &str,
    id: &str,
    rev: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    match method.as_str() {
        "GET" => reply(db.read().await.get_doc(name, id)),
        "PUT" => match serde_json::from_slice::<Value>(body) {
            Ok(doc) => reply(db.write().await.put_doc(name, id, doc)),
            Err(_) => reply(error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "invalid UTF-8 JSON",
            )),
        },
        "DELETE" => reply(db.write().await.delete_doc(name, id, rev)),
        "COPY" => {
            let destination = headers
                .get("Destination")
                .and_then(|v| v.to_str().ok())
                .map(|d| d.split('?').next().unwrap_or(d))
                .and_then(|d| percent_decode_str(d).decode_utf8().ok());
            match destination {
                Some(destination) if !destination.is_empty() => {
                    reply(db.write().await.copy_doc(name, id, &destination))
                }
                _ => reply(error(
                    StatusCode::BAD_REQUEST,
                    "bad_request",
                    "Destination header is mandatory for COPY.",
                )),
            }
        }
        _ => reply(error(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Only DELETE,GET,HEAD,POST,PUT,COPY allowed",
        )),
    }
}

// --- design documents and views ---

async fn design_info(
    State(db): State<Db>,
    Path((name, design)): Path<(String, String)>,
) -> Response {
    reply(db.read().await.design_info(&name, &design))
}

#[derive(Deserialize)]
struct ViewQuery {
    limit: Option<usize>,
}

async fn view_get(
    State(db): State<Db>,
    Path((name, design, view)): Path<(String, String, String)>,
    Query(query): Query<ViewQuery>,
) -> Response {
    reply(db.read().await.view(&name, &design, &view, None, query.limit))
}

#[derive(Deserialize)]
struct ViewSelection {
    keys: Option<Vec<Value>>,
    limit: Option<usize>,
}

async fn view_post(
    State(db): State<Db>,
    Path((name, design, view)): Path<(String, String, String)>,
    Json(input): Json<ViewSelection>,
) -> Response {
    reply(
        db.read()
            .await
            .view(&name, &design, &view, input.keys, input.limit),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_session_reads_cookie_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; AuthSession=abc".parse().unwrap());
        assert_eq!(auth_session(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn auth_session_tolerates_spacing_and_quotes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "AuthSession = \"abc\"".parse().unwrap());
        assert_eq!(auth_session(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn session_cookie_round_trips() {
        let set_cookie = session_cookie("abc");
        assert!(set_cookie.starts_with("AuthSession=abc"));
        assert!(set_cookie.contains("HttpOnly"));
        let parsed = Cookie::parse(set_cookie).unwrap();
        assert_eq!(parsed.path(), Some("/"));
    }

    #[test]
    fn auth_session_absent() {
        assert_eq!(auth_session(&HeaderMap::new()), None);
    }

    #[test]
    fn stats_document_counts_databases() {
        assert_eq!(stats_document(3)["couchdb"]["open_databases"]["current"], 3);
    }
}
