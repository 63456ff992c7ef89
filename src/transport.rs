use std::time::Duration;

use reqwest::{
    blocking::Client as HttpClient,
    header::{HeaderName, HeaderValue},
};

use crate::{
    errors::{TransportError, TransportErrorKind},
    http::{HttpRequest, HttpResponse, HttpTransport},
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};

/// Default [`HttpTransport`] backed by `reqwest::blocking`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: HttpClient,
    request_timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport with the default connect (5s) and request (60s) timeouts.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| {
                TransportError::new(TransportErrorKind::Connect, "failed to build http client")
                    .with_source(err)
            })?;
        Ok(Self {
            http,
            request_timeout,
        })
    }

    /// Wrap a caller-configured reqwest client.
    pub fn from_client(http: HttpClient, request_timeout: Duration) -> Self {
        Self {
            http,
            request_timeout,
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .timeout(self.request_timeout);

        for entry in request.headers.iter() {
            let name = HeaderName::from_bytes(entry.key.trim().as_bytes()).map_err(|err| {
                TransportError::new(TransportErrorKind::Request, "invalid header name")
                    .with_source(err)
            })?;
            let value = HeaderValue::from_str(entry.value.trim()).map_err(|err| {
                TransportError::new(TransportErrorKind::Request, "invalid header value")
                    .with_source(err)
            })?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().map_err(to_transport_error)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().map_err(to_transport_error)?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_transport_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_request() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, err.to_string()).with_source(err)
}
