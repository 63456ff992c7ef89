use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use reqwest::StatusCode;
use serde_json::Value;

use crate::{
    errors::{TransportError, TransportErrorKind},
    http::{HttpRequest, HttpResponse, HttpTransport},
};

/// In-memory transport for offline tests.
///
/// Responses are served in the order they were queued; every request is recorded. Once the
/// queue is drained further requests fail with a transport error. Clones share state, so a
/// test can hand one clone to the client and inspect the other.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

#[derive(Debug, Default)]
struct MockInner {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, resp: HttpResponse) -> Self {
        lock(&self.inner.responses).push_back(Ok(resp));
        self
    }

    pub fn with_json(self, status: StatusCode, body: Value) -> Self {
        self.with_response(HttpResponse::json(status, &body))
    }

    pub fn with_error(self, err: TransportError) -> Self {
        lock(&self.inner.responses).push_back(Err(err));
        self
    }

    /// Requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.inner.requests).clone()
    }

    /// Number of queued responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.inner.responses).len()
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.inner.requests).push(request);
        lock(&self.inner.responses).pop_front().unwrap_or_else(|| {
            Err(TransportError::new(
                TransportErrorKind::Other,
                "no mock response queued",
            ))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
