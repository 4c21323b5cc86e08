use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Request parameters keyed by name.
///
/// A `BTreeMap` keeps keys in lexicographic order, which is the order the
/// signature expects for the query string and makes JSON bodies canonical.
pub type Params = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An access key pair for the EOP gateway. Loaded once, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: String,
}

impl Credential {
    /// Create a new `Credential`, rejecting blank keys.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let access_key = access_key.into().trim().to_string();
        let secret_key = secret_key.into().trim().to_string();

        if access_key.is_empty() {
            return Err(CredentialError::EmptyAccessKey);
        }
        if secret_key.is_empty() {
            return Err(CredentialError::EmptySecretKey);
        }
        if access_key.chars().any(char::is_whitespace) {
            return Err(CredentialError::InvalidCharacters);
        }

        Ok(Self {
            access_key,
            secret_key,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Errors that can occur when validating a credential.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("access key must not be empty")]
    EmptyAccessKey,

    #[error("secret key must not be empty")]
    EmptySecretKey,

    #[error("access key must not contain whitespace")]
    InvalidCharacters,
}

// ---------------------------------------------------------------------------
// MonitoredResource
// ---------------------------------------------------------------------------

/// One inventory stream: a device type in a given availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    pub region_id: String,
    pub az_name: String,
    pub device_type: String,
    /// Human-facing name used in notifications and logs.
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// SignedRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A request to be signed and sent to the EOP gateway.
///
/// For GET the body parameters are folded into the query at construction
/// time, so signing and transmission always see the same parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub url: String,
    pub method: Method,
    pub query: Params,
    pub body: Params,
    pub content_type: String,
}

impl SignedRequest {
    pub fn new(
        method: Method,
        url: impl Into<String>,
        query: Params,
        body: Params,
        content_type: impl Into<String>,
    ) -> Self {
        let (query, body) = match method {
            Method::Get => {
                let mut merged = query;
                merged.extend(body);
                (merged, Params::new())
            }
            Method::Post => (query, body),
        };

        Self {
            url: url.into(),
            method,
            query,
            body,
            content_type: content_type.into(),
        }
    }

    pub fn get(url: impl Into<String>, query: Params, content_type: impl Into<String>) -> Self {
        Self::new(Method::Get, url, query, Params::new(), content_type)
    }

    pub fn post(
        url: impl Into<String>,
        query: Params,
        body: Params,
        content_type: impl Into<String>,
    ) -> Self {
        Self::new(Method::Post, url, query, body, content_type)
    }

    /// Whether the body is sent form-encoded instead of as JSON.
    pub fn is_form_encoded(&self) -> bool {
        self.content_type
            .to_ascii_lowercase()
            .contains("application/x-www-form-urlencoded")
    }
}

// ---------------------------------------------------------------------------
// Stock list response
// ---------------------------------------------------------------------------

/// One entry of `returnObj.results[0].stocks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub device_type: String,
    pub available: i64,

    /// Remaining fields the API returns alongside the count.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StockListBody {
    pub return_obj: Option<StockListReturn>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StockListReturn {
    #[serde(default)]
    pub results: Vec<StockListResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StockListResult {
    /// Kept raw so one odd sibling entry cannot fail the whole list.
    #[serde(default)]
    pub stocks: Vec<Value>,
}
