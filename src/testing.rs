use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::{mock::MockTransport, Client, Config};

pub(crate) const BASE_URL: &str = "https://api.clarifai.com/v2";

/// Body of a successful `/token` exchange.
pub(crate) fn token_body(token: &str, expires_in: u64) -> Value {
    json!({
        "status": { "code": 10000, "description": "Ok" },
        "access_token": token,
        "expires_in": expires_in,
        "scope": "api_access_write api_access api_access_read"
    })
}

pub(crate) fn ok_body() -> Value {
    json!({ "status": { "code": 10000, "description": "Ok" } })
}

/// A transport primed with one token exchange, followed by the given operation responses.
pub(crate) fn authed_transport(responses: Vec<Value>) -> MockTransport {
    responses.into_iter().fold(
        MockTransport::new().with_json(StatusCode::OK, token_body("tok_test", 3600)),
        |transport, body| transport.with_json(StatusCode::OK, body),
    )
}

/// Create a client wired to the given mock transport.
pub(crate) fn test_client(transport: &MockTransport) -> Client {
    Client::new(Config {
        client_id: Some("client_id".into()),
        client_secret: Some("client_secret".into()),
        transport: Some(Arc::new(transport.clone())),
        ..Default::default()
    })
    .expect("client")
}
