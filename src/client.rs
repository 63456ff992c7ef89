use std::{sync::Arc, time::Duration};

#[cfg(feature = "tracing")]
use std::time::Instant;

use reqwest::{blocking::Client as HttpClient, Method};
use serde::Serialize;
use serde_json::Value;

use crate::{
    api_base_url,
    errors::{Error, Result, UsageError, ValidationError},
    http::{unwrap_envelope, HttpRequest, HttpTransport},
    inputs::{Action, Concept, InputIds, InputsPatch, InputsPayload},
    models::{ModelCreate, ModelRef, ModelUpdate},
    pagination::Pagination,
    resolve_url,
    search::{SearchMode, SearchQuery, SearchTerm},
    token::{AccessToken, TokenManager},
    transport::ReqwestTransport,
    CLIENT_HEADER, DEFAULT_API_VERSION, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT,
};

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Application client id (required).
    pub client_id: Option<String>,
    /// Application client secret (required).
    pub client_secret: Option<String>,
    /// API host, defaults to `https://api.clarifai.com`.
    pub endpoint: Option<String>,
    /// API version path segment, defaults to `v2`.
    pub version: Option<String>,
    pub client_header: Option<String>,
    pub http_client: Option<HttpClient>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Custom transport; takes precedence over `http_client` and the timeouts.
    pub transport: Option<Arc<dyn HttpTransport>>,
}

impl Config {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Default::default()
        }
    }

    /// `{endpoint}/{version}` after defaults are applied.
    pub fn base_url(&self) -> String {
        api_base_url(
            self.endpoint
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_ENDPOINT),
            self.version
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_API_VERSION),
        )
    }
}

/// Stateless API client. Cheap to clone; clones share the transport and the cached token.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    base_url: String,
    client_header: Option<String>,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenManager,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{field} is required")))
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let base_url = cfg.base_url();
        resolve_url(&base_url, "")?;

        let client_id = required(cfg.client_id, "client id")?;
        let client_secret = required(cfg.client_secret, "client secret")?;

        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let transport: Arc<dyn HttpTransport> = match (cfg.transport, cfg.http_client) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(ReqwestTransport::from_client(http, request_timeout)),
            (None, None) => Arc::new(ReqwestTransport::with_timeouts(
                cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
                request_timeout,
            )?),
        };

        let client_header = cfg
            .client_header
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(DEFAULT_CLIENT_HEADER.to_string()));

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                client_header,
                transport,
                tokens: TokenManager::new(client_id, client_secret),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Whether a cached token exists and has not expired.
    pub fn token_valid(&self) -> bool {
        self.inner.tokens.is_valid()
    }

    /// Exchange credentials for a fresh token now, regardless of the cached one.
    pub fn refresh_token(&self) -> Result<AccessToken> {
        self.inner
            .tokens
            .refresh(self.inner.transport.as_ref(), &self.inner.base_url)
    }

    pub fn models(&self) -> ModelsClient {
        ModelsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn inputs(&self) -> InputsClient {
        InputsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn searches(&self) -> SearchesClient {
        SearchesClient {
            inner: self.inner.clone(),
        }
    }
}

fn require_id<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("is required").with_field(field).into());
    }
    Ok(trimmed)
}

/// A caller-supplied id as one percent-encoded path segment. `.` and `..` are rejected since
/// URL parsing would resolve them against the parent path.
fn path_segment(value: &str, field: &str) -> Result<String> {
    let id = require_id(value, field)?;
    if id == "." || id == ".." {
        return Err(ValidationError::new("is not a valid id")
            .with_field(field)
            .into());
    }
    Ok(urlencoding::encode(id).into_owned())
}

/// Model management and prediction.
#[derive(Clone, Debug)]
pub struct ModelsClient {
    inner: Arc<ClientInner>,
}

impl ModelsClient {
    pub fn create(&self, name: &str, id: &str) -> Result<Value> {
        let body = ModelCreate::new(require_id(name, "name")?, require_id(id, "id")?);
        self.inner.send_json(Method::POST, "models", &body)
    }

    /// Merge concepts into, or remove them from, a model's output.
    pub fn update<I, C>(&self, id: &str, concepts: I, action: Action) -> Result<Value>
    where
        I: IntoIterator<Item = C>,
        C: Into<Concept>,
    {
        let concepts = concepts.into_iter().map(Into::into).collect();
        let body = ModelUpdate::new(require_id(id, "id")?, concepts, action);
        self.inner.send_json(Method::PATCH, "models", &body)
    }

    pub fn list(&self, pagination: Option<&Pagination>) -> Result<Value> {
        let path = Pagination::apply("models", pagination);
        self.inner.send_empty(Method::GET, &path)
    }

    pub fn get(&self, id: &str) -> Result<Value> {
        let path = format!("models/{}", path_segment(id, "id")?);
        self.inner.send_empty(Method::GET, &path)
    }

    /// Start training a new version of a custom model.
    pub fn train(&self, id: &str) -> Result<Value> {
        let path = format!("models/{}/versions", path_segment(id, "id")?);
        self.inner.send_empty(Method::POST, &path)
    }

    /// Run `model` over the images in `payload`.
    pub fn predict(&self, model: impl Into<ModelRef>, payload: &InputsPayload) -> Result<Value> {
        if payload.is_empty() {
            return Err(UsageError::new("at least one image is required to predict").into());
        }
        let model = model.into();
        let path = format!("models/{}/outputs", path_segment(model.id(), "model")?);
        self.inner.send_json(Method::POST, &path, payload)
    }
}

/// Indexed inputs.
#[derive(Clone, Debug)]
pub struct InputsClient {
    inner: Arc<ClientInner>,
}

impl InputsClient {
    pub fn add(&self, payload: &InputsPayload) -> Result<Value> {
        if payload.is_empty() {
            return Err(UsageError::new("at least one image is required to add inputs").into());
        }
        self.inner.send_json(Method::POST, "inputs", payload)
    }

    /// Apply concept changes to existing inputs.
    pub fn update(&self, patch: &InputsPatch) -> Result<Value> {
        if patch.is_empty() {
            return Err(
                UsageError::new("at least one concept update is required to update inputs").into(),
            );
        }
        self.inner.send_json(Method::PATCH, "inputs", patch)
    }

    pub fn delete(&self, ids: impl Into<InputIds>) -> Result<Value> {
        match ids.into() {
            InputIds::One(id) => {
                let path = format!("inputs/{}", path_segment(&id, "id")?);
                self.inner.send_empty(Method::DELETE, &path)
            }
            InputIds::Many(ids) => {
                if ids.is_empty() {
                    return Err(UsageError::new("at least one input id is required").into());
                }
                #[derive(Serialize)]
                struct DeleteBody<'a> {
                    ids: &'a [String],
                }
                self.inner
                    .send_json(Method::DELETE, "inputs", &DeleteBody { ids: &ids })
            }
        }
    }

    pub fn list(&self, pagination: Option<&Pagination>) -> Result<Value> {
        let path = Pagination::apply("inputs", pagination);
        self.inner.send_empty(Method::GET, &path)
    }

    pub fn get(&self, id: &str) -> Result<Value> {
        let path = format!("inputs/{}", path_segment(id, "id")?);
        self.inner.send_empty(Method::GET, &path)
    }

    /// Processing counts for bulk-added inputs.
    pub fn status(&self) -> Result<Value> {
        self.inner.send_empty(Method::GET, "inputs/status")
    }
}

/// Searches over indexed inputs.
#[derive(Clone, Debug)]
pub struct SearchesClient {
    inner: Arc<ClientInner>,
}

impl SearchesClient {
    pub fn search(
        &self,
        term: impl Into<SearchTerm>,
        mode: SearchMode,
        must_exist: bool,
    ) -> Result<Value> {
        let query = SearchQuery::build(&term.into(), mode, must_exist)?;
        self.query(&query)
    }

    /// Like [`search`](Self::search) with the mode given by name (`"concept"`, `"meta"`, ...).
    pub fn search_by(
        &self,
        term: impl Into<SearchTerm>,
        mode: &str,
        must_exist: bool,
    ) -> Result<Value> {
        let query = SearchQuery::build_by_name(&term.into(), mode, must_exist)?;
        self.query(&query)
    }

    pub fn query(&self, query: &SearchQuery) -> Result<Value> {
        self.inner.send_json(Method::POST, "searches", query)
    }
}

impl ClientInner {
    fn send_json<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> Result<Value> {
        let bytes = serde_json::to_vec(body)?;
        self.execute(method, path, Some(bytes))
    }

    fn send_empty(&self, method: Method, path: &str) -> Result<Value> {
        self.execute(method, path, None)
    }

    fn execute(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Value> {
        let bearer = self
            .tokens
            .bearer(self.transport.as_ref(), &self.base_url)?;

        let url = resolve_url(&self.base_url, path)?;
        let mut request = HttpRequest::new(method, url)
            .with_header("Authorization", format!("Bearer {bearer}"))
            .with_header("Accept", "application/json");
        if let Some(client_header) = self.client_header.as_deref() {
            request = request.with_header(CLIENT_HEADER, client_header);
        }
        if let Some(body) = body {
            request = request.with_header("Content-Type", "application/json");
            request.body = Some(body);
        }

        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!("clarifai.http", method = %request.method, path = %path);
        #[cfg(feature = "tracing")]
        let _guard = span.enter();
        #[cfg(feature = "tracing")]
        let start = Instant::now();

        let resp = match self.transport.send(request) {
            Ok(resp) => resp,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "transport error");
                return Err(err.into());
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            status = %resp.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );

        let result = unwrap_envelope(resp);
        #[cfg(feature = "tracing")]
        {
            if let Err(Error::Api(api)) = &result {
                tracing::warn!(status = api.status, code = ?api.code, "request failed; returning error");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{TransportError, TransportErrorKind};
    use crate::inputs::{ImageInput, InputBatch};
    use crate::mock::MockTransport;
    use crate::testing::{authed_transport, ok_body, test_client, token_body};
    use reqwest::StatusCode;
    use serde_json::json;

    fn one_image() -> InputsPayload {
        let mut batch = InputBatch::new();
        batch.add_image("https://samples.clarifai.com/metro-north.jpg");
        batch.build()
    }

    #[test]
    fn config_requires_credentials() {
        let err = Client::new(Config::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "client id is required"));

        let err = Client::new(Config {
            client_id: Some("id".into()),
            client_secret: Some("   ".into()),
            transport: Some(Arc::new(MockTransport::new())),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "client secret is required"));
    }

    #[test]
    fn base_url_combines_endpoint_and_version() {
        assert_eq!(Config::default().base_url(), "https://api.clarifai.com/v2");
        let cfg = Config {
            endpoint: Some("http://localhost:8080/".into()),
            version: Some("v3".into()),
            ..Default::default()
        };
        assert_eq!(cfg.base_url(), "http://localhost:8080/v3");
    }

    #[test]
    fn construction_does_not_touch_the_network() {
        let transport = MockTransport::new();
        let client = test_client(&transport);
        assert!(!client.token_valid());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn predict_resolves_public_model_and_sends_bearer() {
        let transport = authed_transport(vec![json!({
            "status": { "code": 10000, "description": "Ok" },
            "outputs": [{ "data": { "concepts": [{ "name": "train", "value": 0.99 }] } }]
        })]);
        let client = test_client(&transport);

        let resp = client.models().predict("General", &one_image()).unwrap();
        assert_eq!(resp["outputs"][0]["data"]["concepts"][0]["name"], "train");

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].url.path(), "/v2/token");
        assert_eq!(sent[1].method, Method::POST);
        assert_eq!(
            sent[1].url.as_str(),
            "https://api.clarifai.com/v2/models/aaa03c23b3724a16a56b629203edc62c/outputs"
        );
        assert_eq!(sent[1].header("authorization"), Some("Bearer tok_test"));
        assert_eq!(sent[1].header("content-type"), Some("application/json"));
        assert_eq!(
            sent[1].json_body().unwrap(),
            json!({ "inputs": [
                { "data": { "image": { "url": "https://samples.clarifai.com/metro-north.jpg" } } }
            ] })
        );
    }

    #[test]
    fn predict_passes_custom_model_ids_through() {
        let transport = authed_transport(vec![ok_body()]);
        let client = test_client(&transport);

        client.models().predict("custom123", &one_image()).unwrap();
        assert_eq!(
            transport.requests()[1].url.path(),
            "/v2/models/custom123/outputs"
        );
    }

    #[test]
    fn empty_payloads_fail_without_network() {
        let transport = MockTransport::new();
        let client = test_client(&transport);
        let empty = InputBatch::new().build();

        assert!(matches!(
            client.models().predict("General", &empty),
            Err(Error::Usage(_))
        ));
        assert!(matches!(client.inputs().add(&empty), Err(Error::Usage(_))));
        assert!(matches!(
            client
                .inputs()
                .update(&crate::inputs::ConceptBatch::new().build(Action::Merge)),
            Err(Error::Usage(_))
        ));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unknown_search_mode_fails_without_network() {
        let transport = MockTransport::new();
        let client = test_client(&transport);

        let err = client.searches().search_by("cat", "bogus", true).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn token_is_reused_across_operations() {
        let transport = authed_transport(vec![ok_body(), ok_body()]);
        let client = test_client(&transport);

        client.inputs().status().unwrap();
        client.models().list(None).unwrap();

        let paths: Vec<_> = transport
            .requests()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, ["/v2/token", "/v2/inputs/status", "/v2/models"]);
        assert!(client.token_valid());
    }

    #[test]
    fn failed_refresh_aborts_the_operation() {
        let transport = MockTransport::new().with_json(
            StatusCode::UNAUTHORIZED,
            json!({ "status": { "code": 11001, "description": "Invalid authentication credentials" } }),
        );
        let client = test_client(&transport);

        let err = client.models().create("pets", "pets-v1").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn envelope_failures_become_api_errors() {
        let transport = MockTransport::new()
            .with_json(StatusCode::OK, token_body("tok", 3600))
            .with_json(
                StatusCode::NOT_FOUND,
                json!({ "status": { "code": 21200, "description": "Model does not exist" } }),
            );
        let client = test_client(&transport);

        match client.models().get("missing").unwrap_err() {
            Error::Api(api) => {
                assert_eq!(api.status, 404);
                assert_eq!(api.code.as_deref(), Some("21200"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn model_operations_use_expected_routes() {
        let transport = authed_transport(vec![ok_body(), ok_body(), ok_body()]);
        let client = test_client(&transport);
        let pagination = Pagination::new(2, 10).unwrap();

        client
            .models()
            .update("pets-v1", [("dog", true)], Action::Remove)
            .unwrap();
        client.models().list(Some(&pagination)).unwrap();
        client.models().train("pets-v1").unwrap();

        let sent = transport.requests();
        assert_eq!(sent[1].method, Method::PATCH);
        assert_eq!(sent[1].url.path(), "/v2/models");
        assert_eq!(sent[1].json_body().unwrap()["action"], "remove");

        assert_eq!(sent[2].method, Method::GET);
        assert_eq!(sent[2].url.query(), Some("page=2&per_page=10"));
        assert!(sent[2].body.is_none());

        assert_eq!(sent[3].method, Method::POST);
        assert_eq!(sent[3].url.path(), "/v2/models/pets-v1/versions");
        assert!(sent[3].body.is_none());
    }

    #[test]
    fn delete_single_and_batch() {
        let transport = authed_transport(vec![ok_body(), ok_body()]);
        let client = test_client(&transport);

        client.inputs().delete("abc").unwrap();
        client.inputs().delete(["a", "b"]).unwrap();

        let sent = transport.requests();
        assert_eq!(sent[1].method, Method::DELETE);
        assert_eq!(sent[1].url.path(), "/v2/inputs/abc");
        assert!(sent[1].body.is_none());

        assert_eq!(sent[2].method, Method::DELETE);
        assert_eq!(sent[2].url.path(), "/v2/inputs");
        assert_eq!(sent[2].json_body().unwrap(), json!({ "ids": ["a", "b"] }));
    }

    #[test]
    fn ids_stay_inside_their_path_segment() {
        let transport = authed_transport(vec![ok_body(), ok_body(), ok_body()]);
        let client = test_client(&transport);

        client.inputs().delete("../models").unwrap();
        client.inputs().get("abc?page=9").unwrap();
        client.models().train("a/b#c").unwrap();

        let sent = transport.requests();
        assert_eq!(sent[1].method, Method::DELETE);
        assert_eq!(sent[1].url.path(), "/v2/inputs/..%2Fmodels");
        assert_eq!(sent[2].url.path(), "/v2/inputs/abc%3Fpage%3D9");
        assert_eq!(sent[2].url.query(), None);
        assert_eq!(sent[3].url.path(), "/v2/models/a%2Fb%23c/versions");
        assert_eq!(sent[3].url.fragment(), None);
    }

    #[test]
    fn dot_segment_ids_are_rejected_without_network() {
        let transport = MockTransport::new();
        let client = test_client(&transport);

        for id in [".", ".."] {
            assert!(matches!(
                client.inputs().delete(id),
                Err(Error::Validation(ref v)) if v.field.as_deref() == Some("id")
            ));
            assert!(matches!(client.models().get(id), Err(Error::Validation(_))));
        }
        assert!(matches!(
            client.models().predict("..", &one_image()),
            Err(Error::Validation(_))
        ));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unreachable_token_endpoint_aborts_with_auth_error() {
        let transport = MockTransport::new().with_error(TransportError::new(
            TransportErrorKind::Connect,
            "connection refused",
        ));
        let client = test_client(&transport);

        match client.models().list(None).unwrap_err() {
            Error::Auth(auth) => {
                assert_eq!(auth.transport_kind(), Some(TransportErrorKind::Connect))
            }
            other => panic!("expected auth error, got {other:?}"),
        }
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(transport.pending(), 0);
        assert!(!client.token_valid());
    }

    #[test]
    fn empty_batch_delete_is_a_usage_error() {
        let transport = MockTransport::new();
        let client = test_client(&transport);
        let err = client.inputs().delete(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn image_search_posts_nested_query() {
        let transport = authed_transport(vec![ok_body()]);
        let client = test_client(&transport);

        client
            .searches()
            .search("http://x/y.jpg", SearchMode::Image, true)
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[1].url.path(), "/v2/searches");
        assert_eq!(
            sent[1].json_body().unwrap(),
            json!({ "query": { "ands": [
                { "output": { "input": { "data": { "image": { "url": "http://x/y.jpg" } } } } }
            ] } })
        );
    }

    #[test]
    fn clones_share_the_cached_token() {
        let transport = authed_transport(vec![ok_body(), ok_body()]);
        let client = test_client(&transport);
        let clone = client.clone();

        client.inputs().list(None).unwrap();
        clone.inputs().get("abc").unwrap();
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn custom_inputs_keep_their_ids() {
        let transport = authed_transport(vec![ok_body()]);
        let client = test_client(&transport);
        let payload: InputsPayload = [ImageInput::new(b"raw".to_vec()).with_id("raw-1")]
            .into_iter()
            .collect();

        client.inputs().add(&payload).unwrap();
        assert_eq!(
            transport.requests()[1].json_body().unwrap(),
            json!({ "inputs": [{ "id": "raw-1", "data": { "image": { "base64": "cmF3" } } }] })
        );
    }
}
