//! Passkey check performed before any request is processed.

use crate::{Config, Error, Result};

/// Name of the query-string parameter carrying the passkey.
pub const KEY_PARAM: &str = "key";

/// Compares a request-supplied key against the configured passkey.
#[derive(Clone)]
pub struct AccessGuard {
    expected: String,
}

impl AccessGuard {
    /// Create a guard for the passkey in `config`.
    pub fn new(config: &Config) -> Self {
        Self::with_key(config.access_key.clone())
    }

    /// Create a guard for an explicit passkey.
    pub fn with_key(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Allow the request only on an exact match.
    pub fn check(&self, supplied: Option<&str>) -> Result<()> {
        match supplied {
            Some(key) if key == self.expected => Ok(()),
            Some(_) => {
                log::warn!("Rejected request with a non-matching key");
                Err(Error::AccessDenied)
            }
            None => {
                log::warn!("Rejected request without a key");
                Err(Error::AccessDenied)
            }
        }
    }

    /// Check the `key` parameter of a URL query string.
    pub fn check_query(&self, query: &str) -> Result<()> {
        self.check(key_from_query(query).as_deref())
    }
}

/// Extract the `key` parameter from a query string such as `?key=abc&x=1`.
pub fn key_from_query(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == KEY_PARAM)
        .map(|(_, value)| value.into_owned())
}
