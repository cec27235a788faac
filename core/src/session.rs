//! Cookie sessions via `/_session`.

use cookie::Cookie;
use serde_json::{json, Value};

use crate::client::CouchClient;
use crate::error::CouchError;
use crate::http::{HttpMethod, Transport};
use crate::request::RequestOptions;

const COOKIE_NAME: &str = "AuthSession";

#[derive(Debug)]
pub struct Session<'a, T> {
    client: &'a CouchClient<T>,
}

impl<'a, T: Transport> Session<'a, T> {
    pub(crate) fn new(client: &'a CouchClient<T>) -> Self {
        Self { client }
    }

    /// Log in and return the `AuthSession` token (not the whole cookie).
    pub fn get(&self, user: &str, password: &str) -> Result<String, CouchError> {
        let reply = self.client.run(
            RequestOptions::new(HttpMethod::Post, "/_session")
                .data(json!({ "name": user, "password": password }))
                .with_headers(),
        )?;
        if let Some(err) = reply.application_error() {
            return Err(CouchError::Application(err));
        }
        let token = reply
            .headers
            .iter()
            .flatten()
            .filter(|(name, _)| name.eq_ignore_ascii_case("Set-Cookie"))
            .find_map(|(_, value)| auth_session_token(value));
        token.ok_or(CouchError::MissingField { field: COOKIE_NAME })
    }

    /// GET `/_session`: who the current credentials belong to.
    pub fn info(&self) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Get, "/_session"))
    }

    /// DELETE `/_session`: expire the cookie server-side.
    pub fn delete(&self) -> Result<Value, CouchError> {
        self.client
            .run_json(RequestOptions::new(HttpMethod::Delete, "/_session"))
    }
}

/// Pull the token out of `AuthSession=<token>; Version=1; Path=/; HttpOnly`.
pub fn auth_session_token(set_cookie: &str) -> Option<String> {
    let cookie = Cookie::parse(set_cookie).ok()?;
    let token = cookie.value_trimmed();
    (cookie.name() == COOKIE_NAME && !token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::testing::{client, ok, status};

    #[test]
    fn token_is_cut_from_cookie_header() {
        assert_eq!(
            auth_session_token("AuthSession=YWRtaW46NTJEM0Q; Version=1; Path=/; HttpOnly").as_deref(),
            Some("YWRtaW46NTJEM0Q")
        );
        assert_eq!(auth_session_token("AuthSession=abc").as_deref(), Some("abc"));
        assert_eq!(auth_session_token("Other=abc; AuthSession=x"), None);
        assert_eq!(auth_session_token("AuthSession=; Path=/"), None);
    }

    #[test]
    fn token_survives_spacing_and_quotes() {
        assert_eq!(
            auth_session_token("AuthSession = tok; Path=/").as_deref(),
            Some("tok")
        );
        assert_eq!(
            auth_session_token("AuthSession=\"tok\"; Path=/; HttpOnly").as_deref(),
            Some("tok")
        );
    }

    #[test]
    fn spaced_cookie_header_still_logs_in() {
        let c = client(vec![HttpResponse {
            status: 200,
            headers: vec![("Set-Cookie".to_string(), "AuthSession = tok; Path=/".to_string())],
            body: r#"{"ok":true}"#.to_string(),
        }]);
        assert_eq!(c.session().get("admin", "pw").unwrap(), "tok");
    }

    #[test]
    fn get_posts_credentials_and_returns_token() {
        let c = client(vec![HttpResponse {
            status: 200,
            headers: vec![
                ("Cache-Control".to_string(), "must-revalidate".to_string()),
                (
                    "set-cookie".to_string(),
                    "AuthSession=YWRtaW46NTJEM0Q; Version=1; Path=/; HttpOnly".to_string(),
                ),
            ],
            body: r#"{"ok":true,"name":"admin","roles":["_admin"]}"#.to_string(),
        }]);
        let token = c.session().get("admin", "pw").unwrap();
        assert_eq!(token, "YWRtaW46NTJEM0Q");

        let sent = c.transport().requests();
        assert!(sent[0].want_headers);
        let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "admin", "password": "pw"}));
    }

    #[test]
    fn bad_credentials_are_an_application_error() {
        let c = client(vec![status(
            401,
            r#"{"error":"unauthorized","reason":"Name or password is incorrect."}"#,
        )]);
        let err = c.session().get("admin", "wrong").unwrap_err();
        assert!(matches!(err, CouchError::Application(e) if e.error == "unauthorized"));
    }

    #[test]
    fn missing_cookie_is_reported() {
        let c = client(vec![ok(r#"{"ok":true}"#)]);
        assert!(matches!(
            c.session().get("admin", "pw"),
            Err(CouchError::MissingField { field: "AuthSession" })
        ));
    }
}
