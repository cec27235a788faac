//! Connection settings shared by every request a client issues.

use std::env;

use serde::Deserialize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "5984";

/// Where the server lives and how to authenticate against it.
///
/// Every field has a default, so a partial document (for example
/// `{"port": "15984"}`) deserializes into a usable config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Fetch a session cookie at connect time and use it instead of Basic auth.
    pub cookies: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            user: None,
            password: None,
            cookies: false,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: &str, port: &str) -> Self {
        Self {
            host: host.to_string(),
            port: port.to_string(),
            ..Self::default()
        }
    }

    /// Read `COUCHDB_HOST`, `COUCHDB_PORT`, `COUCHDB_USER`, `COUCHDB_PASSWORD`
    /// and `COUCHDB_COOKIES`, falling back to the defaults for unset values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("COUCHDB_HOST").unwrap_or(defaults.host),
            port: lookup("COUCHDB_PORT").unwrap_or(defaults.port),
            user: lookup("COUCHDB_USER"),
            password: lookup("COUCHDB_PASSWORD"),
            cookies: lookup("COUCHDB_COOKIES")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.cookies),
        }
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_cookies(mut self, cookies: bool) -> Self {
        self.cookies = cookies;
        self
    }

    /// The `user:password` pair, only when both halves are configured.
    pub fn credentials(&self) -> Option<String> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some(format!("{user}:{password}")),
            _ => None,
        }
    }
}
