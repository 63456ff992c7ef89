//! Bearer-token lifecycle for the client-credentials flow.
//!
//! The service hands out short-lived access tokens from `POST {base}/token` in exchange for
//! the application's client id and secret (HTTP basic auth). [`TokenManager`] caches the
//! token with its issue time and lifetime and only goes back to the token endpoint once the
//! cached one has aged out.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::Method;
use serde_json::Value;

use crate::{
    errors::{AuthError, Result},
    http::{envelope_code, HttpRequest, HttpTransport},
    resolve_url, SUCCESS_STATUS_CODE,
};

/// An issued bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    issued_at: Instant,
    ttl: Duration,
}

impl AccessToken {
    /// A token issued right now.
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self::issued_at(value, Instant::now(), ttl)
    }

    pub fn issued_at(value: impl Into<String>, issued_at: Instant, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            issued_at,
            ttl,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued(&self) -> Instant {
        self.issued_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Valid while its age is strictly below its lifetime.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        if self.value.is_empty() {
            return false;
        }
        now.saturating_duration_since(self.issued_at) < self.ttl
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Owns the client credentials and the cached [`AccessToken`].
///
/// The cache sits behind a mutex that is held for the whole check-and-refresh, so clones of a
/// [`Client`](crate::Client) used from several threads never race two exchanges.
pub struct TokenManager {
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(None),
        }
    }

    /// True iff a token was issued and has not aged out.
    pub fn is_valid(&self) -> bool {
        self.lock().as_ref().is_some_and(AccessToken::is_valid)
    }

    /// Snapshot of the cached token, valid or not.
    pub fn current(&self) -> Option<AccessToken> {
        self.lock().clone()
    }

    /// Install a token obtained elsewhere.
    pub fn install(&self, token: AccessToken) {
        *self.lock() = Some(token);
    }

    /// Return a usable bearer value, exchanging credentials first if the cache is empty or
    /// expired.
    pub fn bearer(&self, transport: &dyn HttpTransport, base_url: &str) -> Result<String> {
        let mut cache = self.lock();
        if let Some(token) = cache.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.value.clone());
        }
        let fresh = self.exchange(transport, base_url)?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    /// Unconditionally exchange credentials for a new token. Every failure, including one
    /// to reach the service, is an [`AuthError`]; the previously cached token, if any, is kept.
    pub fn refresh(&self, transport: &dyn HttpTransport, base_url: &str) -> Result<AccessToken> {
        let mut cache = self.lock();
        let fresh = self.exchange(transport, base_url)?;
        *cache = Some(fresh.clone());
        Ok(fresh)
    }

    fn lock(&self) -> MutexGuard<'_, Option<AccessToken>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn basic_credentials(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }

    fn exchange(&self, transport: &dyn HttpTransport, base_url: &str) -> Result<AccessToken> {
        let url = resolve_url(base_url, "token")?;
        let request = HttpRequest::new(Method::POST, url)
            .with_header("Authorization", self.basic_credentials())
            .with_header("Accept", "application/json");

        #[cfg(feature = "tracing")]
        tracing::debug!("requesting access token");

        let resp = transport.send(request).map_err(|err| {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %err, "token request failed to reach the service");
            AuthError::from(err)
        })?;
        let status = resp.status;
        let fail = |code: Option<String>, message: String| {
            AuthError::new(message).with_response(status.as_u16(), code)
        };

        let value: Value = serde_json::from_slice(&resp.body).map_err(|_| {
            fail(
                None,
                status
                    .canonical_reason()
                    .unwrap_or("malformed token response")
                    .to_string(),
            )
        })?;

        let description = value
            .get("status")
            .and_then(|s| s.get("description"))
            .and_then(|d| d.as_str())
            .unwrap_or("token request rejected")
            .to_string();
        let code = envelope_code(&value);
        if code.as_deref() != Some(SUCCESS_STATUS_CODE) {
            #[cfg(feature = "tracing")]
            tracing::warn!(status = %status, code = ?code, "token request rejected");
            return Err(fail(code, description).into());
        }

        let token = value
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| fail(code.clone(), "response is missing access_token".into()))?;
        let expires_in = value
            .get("expires_in")
            .and_then(|v| match v {
                Value::String(s) => s.trim().parse::<f64>().ok(),
                other => other.as_f64(),
            })
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs as u64)
            .ok_or_else(|| fail(code.clone(), "response has no numeric expires_in".into()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(expires_in, "access token issued");

        Ok(AccessToken::new(token, Duration::from_secs(expires_in)))
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client_id", &self.client_id)
            .field("token", &self.current())
            .finish_non_exhaustive()
    }
}
