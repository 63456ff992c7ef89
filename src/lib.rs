//! Blocking Rust client for the Clarifai v2 image recognition API.
//!
//! [`Client`] is the stateless entry point: it owns the transport and the cached bearer token
//! and exposes `models()`, `inputs()` and `searches()`. [`ImageClient`] layers the
//! accumulate-then-send workflow on top (queue images and concepts, keep a page cursor).
#![cfg_attr(docsrs, feature(doc_cfg))]
// Allow large error types - boxing every variant would complicate matching for callers
#![allow(clippy::result_large_err)]

use reqwest::Url;

/// Default API host.
pub const DEFAULT_ENDPOINT: &str = "https://api.clarifai.com";

/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v2";

/// Envelope status code for a successful call.
pub const SUCCESS_STATUS_CODE: &str = "10000";

/// Envelope status code for a batch call where only some items succeeded.
pub const MIXED_SUCCESS_STATUS_CODE: &str = "10010";

/// Default client identification header value.
pub(crate) const DEFAULT_CLIENT_HEADER: &str = concat!("clarifai-rust/", env!("CARGO_PKG_VERSION"));

/// HTTP header name carrying the client identification.
pub(crate) const CLIENT_HEADER: &str = "X-Clarifai-Client";

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

mod client;
mod errors;
mod http;
mod inputs;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod models;
mod pagination;
mod search;
mod session;
#[cfg(test)]
mod testing;
mod token;
mod transport;

pub use client::{Client, Config, InputsClient, ModelsClient, SearchesClient};
pub use errors::{
    APIError, AuthError, Error, Result, TransportError, TransportErrorKind, UsageError,
    ValidationError,
};
pub use http::{HeaderEntry, HeaderList, HttpRequest, HttpResponse, HttpTransport};
pub use inputs::{
    Action, Concept, ConceptBatch, ConceptUpdate, ImageInput, ImageSource, InputBatch, InputIds,
    InputsPatch, InputsPayload, MAX_BATCH_SIZE,
};
#[cfg(feature = "mock")]
pub use mock::MockTransport;
pub use models::{ModelCreate, ModelRef, ModelUpdate, PublicModel};
pub use pagination::Pagination;
pub use search::{Direction, SearchMode, SearchQuery, SearchTerm};
pub use session::ImageClient;
pub use token::{AccessToken, TokenManager};
pub use transport::ReqwestTransport;

/// `{endpoint}/{version}`, with stray slashes between the two removed.
pub fn api_base_url(endpoint: &str, version: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim().trim_end_matches('/'),
        version.trim().trim_matches('/')
    )
}

/// Join a service path (which may carry a query string) onto the base URL.
pub(crate) fn resolve_url(base_url: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|err| Error::Config(format!("invalid url {joined:?}: {err}")))
}
