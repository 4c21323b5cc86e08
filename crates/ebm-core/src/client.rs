use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{
    Credential, Method, MonitoredResource, Params, SignedRequest, StockEntry, StockListBody,
};
use crate::signer::{self, sign};

/// Public EBM endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://ebm-global.ctapi.ctyun.cn";

pub const DEVICE_STOCK_PATH: &str = "/v4/ebm/device-stock-list";

pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Fixed User-Agent sent with every request.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/110.0";

/// Status code and parsed body of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `Value::Null` when the body was not JSON.
    pub body: Value,
}

impl ApiResponse {
    /// Extract the stock entry for `device_type` from a device-stock-list
    /// response.
    pub fn stock_entry(
        &self,
        region_id: &str,
        az_name: &str,
        device_type: &str,
    ) -> Result<StockEntry, CoreError> {
        if self.status != 200 {
            let message = self
                .body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(CoreError::Api {
                status: self.status,
                message,
            });
        }

        if !self.body.is_object() {
            return Err(CoreError::Malformed("response body is not a JSON object".into()));
        }

        let parsed: StockListBody = serde_json::from_value(self.body.clone())
            .map_err(|e| CoreError::Malformed(e.to_string()))?;

        let first = parsed
            .return_obj
            .and_then(|obj| obj.results.into_iter().next())
            .ok_or_else(|| CoreError::NoResults {
                region_id: region_id.to_string(),
                az_name: az_name.to_string(),
            })?;

        let entry = first
            .stocks
            .into_iter()
            .find(|s| s.get("deviceType").and_then(Value::as_str) == Some(device_type))
            .ok_or_else(|| CoreError::DeviceNotFound(device_type.to_string()))?;

        serde_json::from_value(entry)
            .map_err(|e| CoreError::Malformed(format!("stock entry for {device_type}: {e}")))
    }
}

/// Anything that can report the current stock of a resource.
#[async_trait]
pub trait StockSource: Send + Sync {
    async fn fetch_stock(&self, resource: &MonitoredResource) -> Result<StockEntry, CoreError>;
}

/// Signed HTTP client for the EOP gateway.
#[derive(Clone)]
pub struct EopClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Arc<Credential>,
}

impl EopClient {
    /// Create a client. Every call is bounded by `timeout`.
    pub fn new(
        endpoint: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential: Arc::new(credential),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sign `request` as of `now` and build the HTTP request to send.
    ///
    /// The URL query is the same canonical string that was signed, and the
    /// JSON body is the same bytes that were digested.
    pub fn build(
        &self,
        request: &SignedRequest,
        now: NaiveDateTime,
        request_id: &str,
    ) -> Result<reqwest::Request, CoreError> {
        let auth = sign(request, &self.credential, now, request_id)?;

        let query = signer::canonical_query(&request.query);
        let url = if query.is_empty() {
            request.url.clone()
        } else {
            format!("{}?{query}", request.url)
        };

        let builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => {
                let body = if request.is_form_encoded() {
                    signer::canonical_query(&request.body).into_bytes()
                } else {
                    signer::body_bytes(&request.body)?
                };
                self.http.post(&url).body(body)
            }
        };

        debug!(
            method = %request.method,
            url = %url,
            request_id = %auth.request_id,
            eop_date = %auth.eop_date,
            "built signed request"
        );

        Ok(auth
            .apply(builder)
            .header(CONTENT_TYPE, request.content_type.as_str())
            .build()?)
    }

    /// Sign and send `request`.
    ///
    /// Network failures are returned as errors. Status codes are not
    /// interpreted here.
    pub async fn execute(&self, request: &SignedRequest) -> Result<ApiResponse, CoreError> {
        let request_id = Uuid::new_v4().to_string();
        let http_request = self.build(request, Local::now().naive_local(), &request_id)?;

        let resp = self.http.execute(http_request).await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        debug!(status, request_id = %request_id, "received response");

        Ok(ApiResponse { status, body })
    }

    /// Query the stock list of one availability zone and pick `device_type`.
    pub async fn device_stock(
        &self,
        region_id: &str,
        az_name: &str,
        device_type: &str,
    ) -> Result<StockEntry, CoreError> {
        let mut query = Params::new();
        query.insert("regionID".into(), Value::from(region_id));
        query.insert("azName".into(), Value::from(az_name));

        let request = SignedRequest::get(
            format!("{}{DEVICE_STOCK_PATH}", self.endpoint),
            query,
            JSON_CONTENT_TYPE,
        );

        self.execute(&request)
            .await?
            .stock_entry(region_id, az_name, device_type)
    }
}

#[async_trait]
impl StockSource for EopClient {
    async fn fetch_stock(&self, resource: &MonitoredResource) -> Result<StockEntry, CoreError> {
        self.device_stock(&resource.region_id, &resource.az_name, &resource.device_type)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: Value) -> ApiResponse {
        ApiResponse { status: 200, body }
    }

    fn stock_body() -> Value {
        json!({
            "statusCode": 800,
            "returnObj": {
                "results": [{
                    "stocks": [
                        { "deviceType": "CPU-B", "available": 12 },
                        { "deviceType": "GPU-A", "available": 5, "success": true }
                    ]
                }]
            }
        })
    }

    #[test]
    fn picks_matching_device() {
        let entry = ok(stock_body()).stock_entry("r1", "az1", "GPU-A").unwrap();
        assert_eq!(entry.device_type, "GPU-A");
        assert_eq!(entry.available, 5);
    }

    #[test]
    fn missing_device_is_not_found() {
        let err = ok(stock_body()).stock_entry("r1", "az1", "GPU-Z").unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound(ref d) if d == "GPU-Z"));
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_results_is_no_results() {
        let body = json!({ "returnObj": { "results": [] } });
        let err = ok(body).stock_entry("r1", "az1", "GPU-A").unwrap_err();
        assert!(matches!(err, CoreError::NoResults { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_return_obj_is_no_results() {
        let err = ok(json!({ "statusCode": 800 }))
            .stock_entry("r1", "az1", "GPU-A")
            .unwrap_err();
        assert!(matches!(err, CoreError::NoResults { .. }));
    }

    #[test]
    fn non_200_carries_message() {
        let resp = ApiResponse {
            status: 403,
            body: json!({ "message": "signature mismatch" }),
        };
        let err = resp.stock_entry("r1", "az1", "GPU-A").unwrap_err();
        match err {
            CoreError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "signature mismatch");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_200_without_body() {
        let resp = ApiResponse {
            status: 502,
            body: Value::Null,
        };
        let err = resp.stock_entry("r1", "az1", "GPU-A").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Api { status: 502, ref message } if message == "Unknown error"
        ));
        assert!(!err.is_not_found());
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = ok(Value::Null).stock_entry("r1", "az1", "GPU-A").unwrap_err();
        assert!(matches!(err, CoreError::Malformed(_)));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let body = json!({
            "returnObj": { "results": [{ "stocks": [{ "deviceType": "GPU-A" }] }] }
        });
        let err = ok(body).stock_entry("r1", "az1", "GPU-A").unwrap_err();
        assert!(matches!(err, CoreError::Malformed(_)));
    }

    #[test]
    fn bad_sibling_entry_is_ignored() {
        let body = json!({
            "returnObj": {
                "results": [{
                    "stocks": [
                        { "deviceType": "CPU-B" },
                        { "deviceType": "CPU-C", "available": null },
                        "not-an-object",
                        { "deviceType": "GPU-A", "available": 5 }
                    ]
                }]
            }
        });
        let entry = ok(body).stock_entry("r1", "az1", "GPU-A").unwrap();
        assert_eq!(entry.available, 5);
    }

    #[test]
    fn non_integer_available_is_malformed() {
        let body = json!({
            "returnObj": {
                "results": [{ "stocks": [{ "deviceType": "GPU-A", "available": "5" }] }]
            }
        });
        let err = ok(body).stock_entry("r1", "az1", "GPU-A").unwrap_err();
        assert!(matches!(err, CoreError::Malformed(ref m) if m.contains("GPU-A")));
    }

    // -- Request building --

    const REQUEST_ID: &str = "00000000-0000-0000-0000-000000000001";

    fn fixed_time() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn client() -> EopClient {
        let cred = Credential::new("ak-test", "sk-test").unwrap();
        EopClient::new("https://host", cred, Duration::from_secs(5)).unwrap()
    }

    fn header<'a>(req: &'a reqwest::Request, name: &str) -> Option<&'a str> {
        req.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn body_of(req: &reqwest::Request) -> &[u8] {
        req.body().and_then(|b| b.as_bytes()).unwrap_or_default()
    }

    #[test]
    fn get_sends_signed_query_and_headers() {
        let mut query = Params::new();
        query.insert("regionID".into(), json!("r1"));
        query.insert("azName".into(), json!("cn-huadong1 A/b"));
        let request = SignedRequest::get(
            format!("https://host{DEVICE_STOCK_PATH}"),
            query,
            JSON_CONTENT_TYPE,
        );

        let client = client();
        let built = client.build(&request, fixed_time(), REQUEST_ID).unwrap();
        let auth = sign(&request, &client.credential, fixed_time(), REQUEST_ID).unwrap();

        assert_eq!(built.method(), &reqwest::Method::GET);
        assert_eq!(built.url().path(), DEVICE_STOCK_PATH);
        assert_eq!(
            built.url().query(),
            Some(signer::canonical_query(&request.query).as_str())
        );
        assert_eq!(built.url().query(), Some("azName=cn-huadong1%20A/b&regionID=r1"));
        assert_eq!(header(&built, "ctyun-eop-request-id"), Some(REQUEST_ID));
        assert_eq!(header(&built, "eop-date"), Some("20240102T030405Z"));
        assert_eq!(
            header(&built, "eop-authorization"),
            Some(auth.authorization.as_str())
        );
        assert_eq!(header(&built, "content-type"), Some(JSON_CONTENT_TYPE));
        assert!(body_of(&built).is_empty());
    }

    #[test]
    fn get_without_params_has_no_query() {
        let request = SignedRequest::get("https://host/x", Params::new(), JSON_CONTENT_TYPE);
        let built = client().build(&request, fixed_time(), REQUEST_ID).unwrap();
        assert_eq!(built.url().query(), None);
    }

    #[test]
    fn post_json_sends_digested_bytes() {
        let mut body = Params::new();
        body.insert("b".into(), json!(2));
        body.insert("a".into(), json!("x"));
        let request = SignedRequest::post("https://host/x", Params::new(), body, JSON_CONTENT_TYPE);

        let built = client().build(&request, fixed_time(), REQUEST_ID).unwrap();

        assert_eq!(built.method(), &reqwest::Method::POST);
        let sent = body_of(&built);
        assert_eq!(sent, signer::body_bytes(&request.body).unwrap().as_slice());
        assert_eq!(sent, br#"{"a":"x","b":2}"#);
        assert_eq!(
            header(&built, "eop-authorization"),
            Some(
                "ak-test Headers=ctyun-eop-request-id;eop-date \
                 Signature=AZoazT7Y0b/Fnnic3FS5A41CJkUbjzPrhq1lirt4r+I="
            )
        );
    }

    #[test]
    fn post_form_sends_encoded_pairs() {
        let mut body = Params::new();
        body.insert("name".into(), json!("a b"));
        body.insert("count".into(), json!(3));
        let content_type = "application/x-www-form-urlencoded";
        let request = SignedRequest::post("https://host/x", Params::new(), body, content_type);

        let built = client().build(&request, fixed_time(), REQUEST_ID).unwrap();
        let auth = sign(&request, &client().credential, fixed_time(), REQUEST_ID).unwrap();

        assert_eq!(body_of(&built), b"count=3&name=a%20b");
        assert_eq!(header(&built, "content-type"), Some(content_type));
        assert_eq!(
            header(&built, "eop-authorization"),
            Some(auth.authorization.as_str())
        );
    }

    #[test]
    fn client_trims_endpoint_slash() {
        let cred = Credential::new("ak", "sk").unwrap();
        let client = EopClient::new("https://example.com/", cred, Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://example.com");
    }
}
