#![cfg(feature = "mock")]

use std::sync::Arc;

use clarifai::{
    Config, Error, ImageClient, ImageInput, MockTransport, SearchMode, TransportError,
    TransportErrorKind,
};
use reqwest::StatusCode;
use serde_json::json;

fn token() -> serde_json::Value {
    json!({
        "status": { "code": 10000, "description": "Ok" },
        "access_token": "tok_mock",
        "expires_in": 3600
    })
}

fn session(transport: &MockTransport) -> ImageClient {
    ImageClient::new(Config {
        transport: Some(Arc::new(transport.clone())),
        ..Config::new("id", "secret")
    })
    .unwrap()
}

#[test]
fn session_runs_offline_against_queued_responses() {
    let transport = MockTransport::new()
        .with_json(StatusCode::OK, token())
        .with_json(
            StatusCode::OK,
            json!({
                "status": { "code": 10000, "description": "Ok" },
                "outputs": [{ "data": { "colors": [{ "raw_hex": "#f2f2f2" }] } }]
            }),
        );
    let mut s = session(&transport);
    s.add_image(ImageInput::new("https://samples.clarifai.com/wedding.jpg").with_crop(vec![0.1, 0.1, 0.9, 0.9]));

    let resp = s.predict("Color").unwrap();
    assert_eq!(resp["outputs"][0]["data"]["colors"][0]["raw_hex"], "#f2f2f2");
    assert_eq!(transport.pending(), 0);

    let sent = transport.requests();
    assert_eq!(
        sent[1].url.path(),
        "/v2/models/eeed0b6733a644cea07cf4c60f87ebb7/outputs"
    );
    assert_eq!(
        sent[1].json_body().unwrap()["inputs"][0]["data"]["image"]["crop"],
        json!([0.1, 0.1, 0.9, 0.9])
    );
}

#[test]
fn transport_errors_propagate_unchanged() {
    let transport = MockTransport::new()
        .with_json(StatusCode::OK, token())
        .with_error(TransportError::new(
            TransportErrorKind::Timeout,
            "operation timed out",
        ));
    let s = session(&transport);

    match s.search("train", SearchMode::Concept, true).unwrap_err() {
        Error::Transport(err) => assert_eq!(err.kind, TransportErrorKind::Timeout),
        other => panic!("expected transport error, got {other:?}"),
    }
}
