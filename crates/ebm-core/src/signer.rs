//! EOP request signing.
//!
//! The gateway recomputes the signature from the request it receives, so the
//! canonical query, the body digest and the HMAC key chain here must match its
//! derivation byte for byte:
//!
//! ```text
//! kTime  = HMAC(secretKey, eopDate)
//! kAk    = HMAC(kTime, accessKey)
//! kDate  = HMAC(kAk, yyyymmdd)
//! signature = base64(HMAC(kDate, requestIdLine \n dateLine \n \n query \n sha256hex(body)))
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::model::{Credential, Params, SignedRequest};

type HmacSha256 = Hmac<Sha256>;

pub const REQUEST_ID_HEADER: &str = "ctyun-eop-request-id";
pub const DATE_HEADER: &str = "Eop-date";
pub const AUTHORIZATION_HEADER: &str = "Eop-Authorization";

/// Header names covered by the signature, in signing order.
const SIGNED_HEADERS: &str = "ctyun-eop-request-id;eop-date";

const EOP_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub request_id: String,
    pub eop_date: String,
    pub authorization: String,
}

impl AuthHeaders {
    /// Attach the three signed headers to an outgoing request.
    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(REQUEST_ID_HEADER, self.request_id.as_str())
            .header(DATE_HEADER, self.eop_date.as_str())
            .header(AUTHORIZATION_HEADER, self.authorization.as_str())
    }
}

/// Sign `request` as of `now` under the given request id.
///
/// Pure: identical inputs always produce identical headers.
pub fn sign(
    request: &SignedRequest,
    credential: &Credential,
    now: NaiveDateTime,
    request_id: &str,
) -> Result<AuthHeaders, CoreError> {
    let eop_date = eop_date(now);
    let body = body_bytes(&request.body)?;
    let query = canonical_query(&request.query);
    let to_sign = string_to_sign(request_id, &eop_date, &query, &body_digest(&body));

    let sign_date = eop_date
        .split_once('T')
        .map_or(eop_date.as_str(), |(date, _)| date);
    let k_time = hmac_sha256(credential.secret_key().as_bytes(), eop_date.as_bytes())?;
    let k_ak = hmac_sha256(&k_time, credential.access_key().as_bytes())?;
    let k_date = hmac_sha256(&k_ak, sign_date.as_bytes())?;
    let signature = STANDARD.encode(hmac_sha256(&k_date, to_sign.as_bytes())?);

    Ok(AuthHeaders {
        request_id: request_id.to_string(),
        authorization: format!(
            "{} Headers={SIGNED_HEADERS} Signature={signature}",
            credential.access_key()
        ),
        eop_date,
    })
}

/// Format a wall-clock time as an `eop-date` (`YYYYMMDDTHHMMSSZ`).
pub fn eop_date(now: NaiveDateTime) -> String {
    now.format(EOP_DATE_FORMAT).to_string()
}

/// Sorted `key=value` pairs joined with `&`.
///
/// String values are percent-encoded; other JSON values are written as their
/// JSON text without encoding. This string is also the query actually sent.
pub fn canonical_query(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key}={}", encode_value(s)),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// The exact body bytes to digest and to transmit: empty when there are no
/// parameters, otherwise compact JSON with sorted keys.
pub fn body_bytes(body: &Params) -> Result<Vec<u8>, CoreError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::to_vec(body)?)
}

/// Lower-case hex SHA-256 of the body.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn string_to_sign(request_id: &str, eop_date: &str, query: &str, body_digest: &str) -> String {
    let header_str = format!("{REQUEST_ID_HEADER}:{request_id}\neop-date:{eop_date}\n");
    format!("{header_str}\n{query}\n{body_digest}")
}

/// Percent-encode everything except `A-Za-z0-9-_.~` and `/`.
fn encode_value(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| CoreError::SigningKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
