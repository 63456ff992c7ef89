use std::fmt;

use reqwest::{header::HeaderMap, Method, StatusCode, Url};
use serde_json::Value;

use crate::{
    errors::{APIError, Error, Result, TransportError},
    MIXED_SUCCESS_STATUS_CODE, SUCCESS_STATUS_CODE,
};

/// Pluggable HTTP capability used by the client for every round trip.
///
/// The default implementation is [`ReqwestTransport`](crate::ReqwestTransport). Implement this
/// trait to route requests through another HTTP stack or to stub the service in tests.
pub trait HttpTransport: fmt::Debug + Send + Sync {
    /// Perform one request and return the raw response. Non-2xx statuses are *not* errors at
    /// this layer; only failures to obtain a response are.
    fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// A fully-resolved outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderList,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderList::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderEntry::new(key.into(), value.into()));
        self
    }

    /// Body decoded as JSON, mainly for assertions in tests.
    pub fn json_body(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }
}

/// Raw response handed back by a transport.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Structured header list with validation.
#[derive(Clone, Debug, Default)]
pub struct HeaderList(Vec<HeaderEntry>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a header entry. Panics if key or value is empty/whitespace-only.
    ///
    /// # Panics
    /// Panics if the header key or value is empty or contains only whitespace.
    pub fn push(&mut self, entry: HeaderEntry) {
        assert!(
            entry.is_valid(),
            "Invalid header: key and value must be non-empty (got key={:?}, value={:?})",
            entry.key,
            entry.value
        );
        self.0.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: String, value: String) -> Self {
        Self { key, value }
    }

    pub fn is_valid(&self) -> bool {
        !(self.key.trim().is_empty() || self.value.trim().is_empty())
    }
}

/// Read `status.code` from a response envelope. The service sends it as a number, older
/// deployments as a string.
pub(crate) fn envelope_code(value: &Value) -> Option<String> {
    match value.get("status")?.get("code")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

fn envelope_text(value: &Value, key: &str) -> Option<String> {
    value
        .get("status")
        .and_then(|status| status.get(key))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Decode a response and check its `{status: {code, description}}` envelope.
///
/// Codes `10000` and `10010` pass; any other envelope code, or a non-2xx response without an
/// envelope, becomes [`APIError`].
pub(crate) fn unwrap_envelope(resp: HttpResponse) -> Result<Value> {
    let status = resp.status;
    let status_text = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();

    if resp.body.is_empty() {
        if status.is_success() {
            return Ok(Value::Null);
        }
        return Err(APIError::new(status.as_u16(), status_text).into());
    }

    let value = match serde_json::from_slice::<Value>(&resp.body) {
        Ok(value) => value,
        Err(err) => {
            if status.is_success() {
                return Err(Error::Serialization(err));
            }
            let body = String::from_utf8_lossy(&resp.body).into_owned();
            return Err(APIError {
                status: status.as_u16(),
                code: None,
                message: body.clone(),
                details: None,
                raw_body: Some(body),
            }
            .into());
        }
    };

    match envelope_code(&value) {
        Some(code) if code == SUCCESS_STATUS_CODE || code == MIXED_SUCCESS_STATUS_CODE => {
            Ok(value)
        }
        Some(code) => Err(APIError {
            status: status.as_u16(),
            message: envelope_text(&value, "description").unwrap_or(status_text),
            details: envelope_text(&value, "details"),
            code: Some(code),
            raw_body: Some(String::from_utf8_lossy(&resp.body).into_owned()),
        }
        .into()),
        None if status.is_success() => Ok(value),
        None => Err(APIError {
            status: status.as_u16(),
            code: None,
            message: status_text,
            details: None,
            raw_body: Some(String::from_utf8_lossy(&resp.body).into_owned()),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_success_returns_full_body() {
        let body = json!({
            "status": { "code": 10000, "description": "Ok" },
            "outputs": []
        });
        let value = unwrap_envelope(HttpResponse::json(StatusCode::OK, &body)).unwrap();
        assert_eq!(value, body);
    }

    #[test]
    fn envelope_accepts_string_code_and_mixed_success() {
        let body = json!({ "status": { "code": "10010", "description": "Mixed Success" } });
        assert!(unwrap_envelope(HttpResponse::json(StatusCode::OK, &body)).is_ok());
    }

    #[test]
    fn envelope_failure_code_becomes_api_error() {
        let body = json!({
            "status": {
                "code": 21200,
                "description": "Model does not exist",
                "details": "Model 'nope' not found"
            }
        });
        let err = unwrap_envelope(HttpResponse::json(StatusCode::NOT_FOUND, &body)).unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.status, 404);
                assert_eq!(api.code.as_deref(), Some("21200"));
                assert_eq!(api.message, "Model does not exist");
                assert_eq!(api.details.as_deref(), Some("Model 'nope' not found"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_failure_code_on_http_ok_is_still_an_error() {
        let body = json!({ "status": { "code": 11102, "description": "Invalid request" } });
        let err = unwrap_envelope(HttpResponse::json(StatusCode::OK, &body)).unwrap_err();
        assert!(matches!(err, Error::Api(ref api) if api.status == 200));
    }

    #[test]
    fn non_json_error_body_keeps_raw_text() {
        let err = unwrap_envelope(HttpResponse::new(StatusCode::BAD_GATEWAY, "upstream down"))
            .unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.status, 502);
                assert_eq!(api.message, "upstream down");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_success_body_is_a_serialization_error() {
        let err = unwrap_envelope(HttpResponse::new(StatusCode::OK, "<html>")).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn empty_error_body_uses_reason_phrase() {
        let err =
            unwrap_envelope(HttpResponse::new(StatusCode::UNAUTHORIZED, Vec::new())).unwrap_err();
        assert!(matches!(err, Error::Api(ref api) if api.message == "Unauthorized"));
    }

    #[test]
    fn request_header_lookup_is_case_insensitive() {
        let req = HttpRequest::new(Method::GET, Url::parse("https://example.com/v2/inputs").unwrap())
            .with_header("Authorization", "Bearer abc");
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert!(req.json_body().is_none());
    }

    #[test]
    #[should_panic(expected = "Invalid header")]
    fn header_list_panics_on_empty_value() {
        let mut list = HeaderList::new();
        list.push(HeaderEntry::new("key".to_string(), "".to_string()));
    }

    #[test]
    #[should_panic(expected = "Invalid header")]
    fn header_list_panics_on_whitespace_only() {
        let mut list = HeaderList::new();
        list.push(HeaderEntry::new("   ".to_string(), "value".to_string()));
    }
}
