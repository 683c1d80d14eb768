//! The network boundary.
//!
//! The orchestrator talks to the outside world through exactly one call
//! type: [`Transport::issue`]. The production implementation wraps
//! `reqwest`; tests substitute [`mock::MockTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::request::RequestMethod;

/// Transport-level failure: the request never produced an HTTP response.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable cause.
    pub message: String,
}

/// The raw outcome of one network call.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Parsed response body, if any was returned.
    pub payload: Option<Value>,
}

impl TransportResponse {
    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// The one-call network boundary used by the orchestrator.
///
/// Implementations must perform exactly one HTTP exchange per call and
/// must not retry internally; retry policy belongs to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one HTTP request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no HTTP response was obtained
    /// (DNS failure, refused connection, ...). A 4xx/5xx response is a
    /// successful transport outcome.
    async fn issue(
        &self,
        method: RequestMethod,
        href: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    bearer_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field(
                "bearer_token",
                &self.inner.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport with an optional bearer token.
    #[must_use]
    pub fn new(bearer_token: Option<SecretString>) -> Self {
        Self {
            inner: Arc::new(HttpTransportInner {
                client: reqwest::Client::new(),
                bearer_token,
            }),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(
        &self,
        method: RequestMethod,
        href: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self
            .inner
            .client
            .request(method.into(), href)
            .header("Accept", "application/json");

        if let Some(token) = &self.inner.bearer_token {
            request = request.bearer_auth(token.expose_secret());
        }

        if let Some(body) = body {
            // PATCH bodies are JSON-Patch arrays per RFC 6902
            let content_type = if method == RequestMethod::Patch {
                "application/json-patch+json"
            } else {
                "application/json"
            };
            request = request.header("Content-Type", content_type).json(&body);
        }

        let response = request.send().await.map_err(|e| TransportError {
            message: e.to_string(),
        })?;

        let status_code = response.status().as_u16();

        // Read as text first so non-JSON error bodies still surface
        let text = response.text().await.map_err(|e| TransportError {
            message: e.to_string(),
        })?;

        let payload = if text.is_empty() {
            None
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(error = %e, status = status_code, "Response body is not JSON");
                    Some(Value::String(text))
                }
            }
        };

        Ok(TransportResponse {
            status_code,
            payload,
        })
    }
}

/// In-process transport doubles for tests.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::{Transport, TransportError, TransportResponse};
    use crate::request::RequestMethod;

    /// Canned-response transport that counts calls per (method, href).
    #[derive(Clone, Default)]
    pub struct MockTransport {
        inner: Arc<MockInner>,
    }

    #[derive(Default)]
    struct MockInner {
        responses: Mutex<HashMap<(RequestMethod, String), TransportResponse>>,
        calls: Mutex<Vec<(RequestMethod, String, Option<Value>)>>,
        total_calls: AtomicUsize,
        delay: Mutex<Option<Duration>>,
    }

    impl MockTransport {
        /// Empty mock; unknown hrefs answer 404.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a 200 response with the given JSON body.
        pub fn on_get(&self, href: &str, payload: Value) {
            self.respond(RequestMethod::Get, href, 200, Some(payload));
        }

        /// Register an arbitrary response.
        pub fn respond(
            &self,
            method: RequestMethod,
            href: &str,
            status_code: u16,
            payload: Option<Value>,
        ) {
            self.inner.responses.lock().insert(
                (method, href.to_string()),
                TransportResponse {
                    status_code,
                    payload,
                },
            );
        }

        /// Delay every response, to widen the in-flight window.
        pub fn set_delay(&self, delay: Duration) {
            *self.inner.delay.lock() = Some(delay);
        }

        /// Total number of issued calls.
        #[must_use]
        pub fn total_calls(&self) -> usize {
            self.inner.total_calls.load(Ordering::SeqCst)
        }

        /// Number of calls issued for one (method, href) pair.
        #[must_use]
        pub fn calls_for(&self, method: RequestMethod, href: &str) -> usize {
            self.inner
                .calls
                .lock()
                .iter()
                .filter(|(m, h, _)| *m == method && h == href)
                .count()
        }

        /// Every body sent to one (method, href) pair, in call order.
        #[must_use]
        pub fn bodies_for(&self, method: RequestMethod, href: &str) -> Vec<Value> {
            self.inner
                .calls
                .lock()
                .iter()
                .filter(|(m, h, _)| *m == method && h == href)
                .filter_map(|(_, _, body)| body.clone())
                .collect()
        }

        /// The body sent with the most recent call to `href`, if any.
        #[must_use]
        pub fn last_body(&self, href: &str) -> Option<Value> {
            self.inner
                .calls
                .lock()
                .iter()
                .rev()
                .find(|(_, h, _)| h == href)
                .and_then(|(_, _, body)| body.clone())
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn issue(
            &self,
            method: RequestMethod,
            href: &str,
            body: Option<Value>,
        ) -> Result<TransportResponse, TransportError> {
            self.inner.total_calls.fetch_add(1, Ordering::SeqCst);
            self.inner
                .calls
                .lock()
                .push((method, href.to_string(), body));

            let delay = *self.inner.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let canned = self
                .inner
                .responses
                .lock()
                .get(&(method, href.to_string()))
                .cloned();

            Ok(canned.unwrap_or(TransportResponse {
                status_code: 404,
                payload: None,
            }))
        }
    }
}
