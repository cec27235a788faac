//! Reply type and the small DTOs composite operations read from replies.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApplicationError, CouchError};
use crate::http::{find_header, HttpResponse};

/// Body of a reply: decoded JSON when the server sent JSON, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Json(Value),
    Text(String),
}

/// What a dispatched request delivers back to the caller.
///
/// An error envelope from the server (`{"error":"not_found"}`) is still a
/// `Reply`; use `application_error` to tell it apart from success.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
    /// Present only when the request asked for response headers.
    pub headers: Option<Vec<(String, String)>>,
}

impl Reply {
    pub(crate) fn from_response(response: HttpResponse, want_headers: bool) -> Self {
        let body = match serde_json::from_str(&response.body) {
            Ok(value) => ReplyBody::Json(value),
            Err(_) => ReplyBody::Text(response.body),
        };
        Self {
            status: response.status,
            body,
            headers: want_headers.then_some(response.headers),
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ReplyBody::Json(value) => Some(value),
            ReplyBody::Text(_) => None,
        }
    }

    /// Take the decoded JSON body, failing if the server sent something else.
    pub fn into_json(self) -> Result<Value, CouchError> {
        match self.body {
            ReplyBody::Json(value) => Ok(value),
            ReplyBody::Text(text) => Err(CouchError::Deserialization(format!(
                "expected a JSON body, got {text:?}"
            ))),
        }
    }

    pub fn text(&self) -> String {
        match &self.body {
            ReplyBody::Json(value) => value.to_string(),
            ReplyBody::Text(text) => text.clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_deref().and_then(|h| find_header(h, name))
    }

    pub fn application_error(&self) -> Option<ApplicationError> {
        self.json().and_then(application_error)
    }
}

/// Recognise the server's `{"error": ..., "reason": ...}` envelope.
pub fn application_error(value: &Value) -> Option<ApplicationError> {
    value.get("error")?;
    ApplicationError::deserialize(value).ok()
}

/// Fail with `CouchError::Application` when `value` is an error envelope.
pub(crate) fn reject_application_error(value: Value) -> Result<Value, CouchError> {
    match application_error(&value) {
        Some(err) => Err(CouchError::Application(err)),
        None => Ok(value),
    }
}

/// `GET /_uuids` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Uuids {
    pub uuids: Vec<String>,
}

/// One row of an `_all_docs` reply. Missing keys come back with `error` set.
#[derive(Debug, Clone, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub id: Option<String>,
    pub key: Value,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowValue {
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllDocs {
    pub rows: Vec<AllDocsRow>,
}
