//! Per-call request options and their normalization into an `HttpRequest`.
//!
//! # Design
//! `RequestOptions` is the loose, caller-facing shape: every field may be
//! left out. `normalize` resolves it against the client's
//! `ConnectionConfig` in a fixed order:
//!
//! 1. host, port and auth fall back to the connection settings;
//! 2. the path defaults to `/` and gains a leading slash if it lacks one;
//! 3. GET and DELETE payloads move into the query string;
//! 4. any remaining payload gets default JSON `Accept`/`Content-Type`
//!    headers, without overriding what the caller supplied;
//! 5. the payload is serialized as the JSON body.
//!
//! Nothing here touches the network, so a request that cannot be resolved
//! fails with `CouchError::Configuration` before a transport ever sees it.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use url::form_urlencoded;

use crate::config::ConnectionConfig;
use crate::error::CouchError;
use crate::http::{find_header, HttpMethod, HttpRequest};

const JSON: &str = "application/json";

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Loose description of one call. Unset fields are defaulted by `normalize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub host: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
    pub headers: Vec<(String, String)>,
    pub data: Option<Value>,
    pub auth: Option<String>,
    pub want_headers: bool,
}

impl RequestOptions {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Ask for the response headers to be surfaced in the reply.
    pub fn with_headers(mut self) -> Self {
        self.want_headers = true;
        self
    }

    /// Resolve these options into a concrete request.
    ///
    /// `session` is the cached `AuthSession` token, if any. When present it
    /// replaces the derived Basic credential and is sent as a cookie.
    pub fn normalize(
        self,
        config: &ConnectionConfig,
        session: Option<&str>,
    ) -> Result<HttpRequest, CouchError> {
        let RequestOptions {
            method,
            host,
            port,
            path,
            mut headers,
            mut data,
            auth,
            want_headers,
        } = self;

        let host = host.unwrap_or_else(|| config.host.clone());
        if host.is_empty() {
            return Err(CouchError::Configuration("no host to send the request to".to_string()));
        }
        let port = port.unwrap_or_else(|| config.port.clone());
        if port.is_empty() {
            return Err(CouchError::Configuration("no port to send the request to".to_string()));
        }
        let auth = match (auth, session) {
            (Some(auth), _) => Some(auth),
            (None, None) => config.credentials(),
            (None, Some(_)) => None,
        };

        let mut path = absolute_path(path.as_deref().unwrap_or("/"));

        if method.encodes_data_as_query() {
            if let Some(query) = data.take() {
                let query = encode_query(&query)?;
                if !query.is_empty() {
                    path.push(if path.contains('?') { '&' } else { '?' });
                    path.push_str(&query);
                }
            }
        }

        let body = match data {
            Some(data) => {
                if find_header(&headers, "Accept").is_none() {
                    headers.push(("Accept".to_string(), JSON.to_string()));
                }
                if find_header(&headers, "Content-Type").is_none() {
                    headers.push(("Content-Type".to_string(), JSON.to_string()));
                }
                let body = serde_json::to_string(&data)
                    .map_err(|e| CouchError::Serialization(e.to_string()))?;
                Some(body)
            }
            None => None,
        };

        if let Some(token) = session {
            if find_header(&headers, "Cookie").is_none() {
                headers.push(("Cookie".to_string(), format!("AuthSession={token}")));
            }
        }

        Ok(HttpRequest {
            method,
            host,
            port,
            path,
            headers,
            body,
            auth,
            want_headers,
        })
    }
}

/// Prefix `/` unless the path already starts with one. Empty means root.
pub fn absolute_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Percent-encode a single path segment.
pub(crate) fn encode_segment(part: &str) -> String {
    utf8_percent_encode(part, SEGMENT).to_string()
}

/// Build `/seg1/seg2/...` with every segment percent-encoded.
pub(crate) fn segments(parts: &[&str]) -> String {
    let mut path = String::new();
    for part in parts {
        path.push('/');
        path.push_str(&encode_segment(part));
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Encode a JSON object as a query string.
///
/// Strings are sent verbatim, `null` as an empty value, and everything else
/// as its JSON text (so arrays such as `keys` arrive as JSON arrays).
fn encode_query(data: &Value) -> Result<String, CouchError> {
    let Value::Object(map) = data else {
        return Err(CouchError::Configuration(
            "query data for GET/DELETE must be a JSON object".to_string(),
        ));
    };
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in map {
        match value {
            Value::String(s) => query.append_pair(key, s),
            Value::Null => query.append_pair(key, ""),
            other => query.append_pair(key, &other.to_string()),
        };
    }
    Ok(query.finish())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::default()
    }

    fn normalize(options: RequestOptions) -> HttpRequest {
        options.normalize(&config(), None).unwrap()
    }

    #[test]
    fn relative_path_gains_leading_slash() {
        for p in ["db", "db/doc", "_all_dbs"] {
            let req = normalize(RequestOptions::new(HttpMethod::Get, p));
            assert_eq!(req.path, format!("/{p}"));
        }
    }

    #[test]
    fn absolute_path_is_unchanged() {
        for p in ["/", "/db", "/db/doc"] {
            let req = normalize(RequestOptions::new(HttpMethod::Get, p));
            assert_eq!(req.path, p);
            assert_eq!(absolute_path(&req.path), req.path);
        }
    }

    #[test]
    fn missing_path_defaults_to_root() {
        let req = normalize(RequestOptions::default());
        assert_eq!(req.path, "/");
        assert_eq!(req.method, HttpMethod::Get);
    }

    #[test]
    fn host_and_port_come_from_config() {
        let req = normalize(RequestOptions::new(HttpMethod::Get, "/"));
        assert_eq!(req.host, "127.0.0.1");
        assert_eq!(req.port, "5984");
    }

    #[test]
    fn caller_host_and_port_win() {
        let req = normalize(
            RequestOptions::new(HttpMethod::Get, "/")
                .host("couch.example")
                .port("6984"),
        );
        assert_eq!(req.url(), "http://couch.example:6984/");
    }

    #[test]
    fn empty_host_is_a_configuration_error() {
        let config = ConnectionConfig::new("", "5984");
        let err = RequestOptions::new(HttpMethod::Get, "/")
            .normalize(&config, None)
            .unwrap_err();
        assert!(matches!(err, CouchError::Configuration(_)));
    }

    #[test]
    fn empty_port_is_a_configuration_error() {
        let err = RequestOptions::new(HttpMethod::Get, "/")
            .port("")
            .normalize(&config(), None)
            .unwrap_err();
        assert!(matches!(err, CouchError::Configuration(_)));
    }

    #[test]
    fn get_data_moves_into_query_string() {
        let req = normalize(
            RequestOptions::new(HttpMethod::Get, "/db/_all_docs")
                .data(json!({"include_docs": true, "limit": 10, "startkey": "a b"})),
        );
        assert!(req.body.is_none());
        let (path, query) = req.path.split_once('?').unwrap();
        assert_eq!(path, "/db/_all_docs");
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert!(pairs.contains(&("include_docs".to_string(), "true".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
        assert!(pairs.contains(&("startkey".to_string(), "a b".to_string())));
        assert!(req.headers.is_empty());
    }

    #[test]
    fn delete_data_moves_into_query_string() {
        let req = normalize(
            RequestOptions::new(HttpMethod::Delete, "/db/doc").data(json!({"rev": "1-abc"})),
        );
        assert_eq!(req.path, "/db/doc?rev=1-abc");
        assert!(req.body.is_none());
    }

    #[test]
    fn arrays_are_sent_as_json_text() {
        let req = normalize(
            RequestOptions::new(HttpMethod::Get, "/db/_all_docs").data(json!({"keys": ["a", "b"]})),
        );
        assert_eq!(req.path, "/db/_all_docs?keys=%5B%22a%22%2C%22b%22%5D");
    }

    #[test]
    fn query_is_appended_to_existing_query() {
        let req = normalize(
            RequestOptions::new(HttpMethod::Get, "/_uuids?count=2").data(json!({"x": "y"})),
        );
        assert_eq!(req.path, "/_uuids?count=2&x=y");
    }

    #[test]
    fn empty_query_data_adds_nothing() {
        let req = normalize(RequestOptions::new(HttpMethod::Get, "/_all_dbs").data(json!({})));
        assert_eq!(req.path, "/_all_dbs");
    }

    #[test]
    fn non_object_query_data_is_rejected() {
        let err = RequestOptions::new(HttpMethod::Get, "/db")
            .data(json!(["a"]))
            .normalize(&config(), None)
            .unwrap_err();
        assert!(matches!(err, CouchError::Configuration(_)));
    }

    #[test]
    fn body_data_gets_json_headers() {
        for method in [HttpMethod::Put, HttpMethod::Post, HttpMethod::Copy] {
            let req = normalize(RequestOptions::new(method, "/db/doc").data(json!({"a": 1})));
            assert_eq!(req.header("Accept"), Some("application/json"));
            assert_eq!(req.header("Content-Type"), Some("application/json"));
            let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(body, json!({"a": 1}));
        }
    }

    #[test]
    fn caller_headers_win_and_missing_ones_are_filled() {
        let req = normalize(
            RequestOptions::new(HttpMethod::Post, "/db")
                .header("content-type", "text/plain")
                .data(json!({"a": 1})),
        );
        assert_eq!(
            req.headers,
            vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]
        );
    }

    #[test]
    fn no_data_means_no_body_and_no_default_headers() {
        let req = normalize(RequestOptions::new(HttpMethod::Put, "/db"));
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn auth_is_derived_from_credentials() {
        let config = ConnectionConfig::default().with_credentials("admin", "pw");
        let req = RequestOptions::new(HttpMethod::Get, "/")
            .normalize(&config, None)
            .unwrap();
        assert_eq!(req.auth.as_deref(), Some("admin:pw"));
    }

    #[test]
    fn caller_auth_overrides_credentials() {
        let config = ConnectionConfig::default().with_credentials("admin", "pw");
        let req = RequestOptions::new(HttpMethod::Get, "/")
            .auth("other:secret")
            .normalize(&config, None)
            .unwrap();
        assert_eq!(req.auth.as_deref(), Some("other:secret"));
    }

    #[test]
    fn session_replaces_basic_auth_with_cookie() {
        let config = ConnectionConfig::default().with_credentials("admin", "pw");
        let req = RequestOptions::new(HttpMethod::Get, "/")
            .normalize(&config, Some("tok3n"))
            .unwrap();
        assert!(req.auth.is_none());
        assert_eq!(req.header("Cookie"), Some("AuthSession=tok3n"));
    }

    #[test]
    fn segments_escape_reserved_characters() {
        assert_eq!(segments(&["db", "doc"]), "/db/doc");
        assert_eq!(segments(&["a/b", "c d"]), "/a%2Fb/c%20d");
        assert_eq!(segments(&[]), "/");
    }
}
