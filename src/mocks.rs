//! Shared test doubles: a scripted transport, a fixed clock, and a counting
//! token issuer.

use crate::auth::{AccessToken, Clock, ServiceAccountKey, TokenIssuer};
use crate::client::FeedSession;
use crate::config::{FeedConfig, GOOGLE_FEED_URL};
use crate::errors::{AuthenticationError, TransportError};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Spreadsheet key used by session fixtures.
pub const TEST_KEY: &str = "key1";
/// Base URL used by session fixtures.
pub const TEST_BASE_URL: &str = GOOGLE_FEED_URL;

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Transport that records every request and replies from a scripted queue.
/// An empty queue answers with a bodiless 200.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<Vec<HttpResponse>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response; queued responses are consumed in push order.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(response);
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// A 200 with no body.
    pub fn empty_ok() -> HttpResponse {
        HttpResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new())
    }

    /// A 200 carrying an Atom XML body.
    pub fn xml(body: &str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/atom+xml; charset=UTF-8".parse().unwrap(),
        );
        HttpResponse::new(StatusCode::OK, headers, Bytes::from(body.to_string()))
    }

    /// A 200 carrying an HTML body, the shape of the sign-in interstitial.
    pub fn html(body: &str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "text/html; charset=UTF-8".parse().unwrap(),
        );
        HttpResponse::new(StatusCode::OK, headers, Bytes::from(body.to_string()))
    }

    /// An arbitrary status with a plain body.
    pub fn status(status: StatusCode, body: &str) -> HttpResponse {
        HttpResponse::new(status, HeaderMap::new(), Bytes::from(body.to_string()))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                method: request.method,
                url: request.url,
                headers: request.headers,
                body: request.body,
            });

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if responses.is_empty() {
            Ok(Self::empty_ok())
        } else {
            Ok(responses.remove(0))
        }
    }
}

/// Clock pinned to a settable instant.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Issuer that counts calls and hands out sequentially named tokens, each
/// valid for one hour past the configured clock origin.
pub struct CountingIssuer {
    calls: AtomicUsize,
    expires_at: DateTime<Utc>,
}

impl CountingIssuer {
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            expires_at,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for CountingIssuer {
    async fn issue(&self, _key: &ServiceAccountKey) -> Result<AccessToken, AuthenticationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::bearer(format!("issued-{n}"), self.expires_at))
    }
}

/// Issuer that always fails; exercises exchange error propagation.
pub struct FailingIssuer;

#[async_trait]
impl TokenIssuer for FailingIssuer {
    async fn issue(&self, _key: &ServiceAccountKey) -> Result<AccessToken, AuthenticationError> {
        Err(AuthenticationError::ExchangeFailed(
            "scripted failure".to_string(),
        ))
    }
}

/// Session over the given transport with default config, a system clock, and
/// an issuer that never gets called unless a test installs a service account.
pub fn session_with_transport(transport: Arc<MockTransport>) -> Arc<FeedSession> {
    Arc::new(FeedSession::new(
        TEST_KEY.to_string(),
        FeedConfig::default(),
        transport,
        Arc::new(CountingIssuer::new(Utc::now() + Duration::hours(1))),
        Arc::new(crate::auth::SystemClock),
    ))
}

/// Anonymous session over a fresh recording transport.
pub fn anonymous_session() -> Arc<FeedSession> {
    session_with_transport(Arc::new(MockTransport::new()))
}

/// Session with an injected clock and issuer, for freshness tests.
pub fn session_with_clock(
    transport: Arc<MockTransport>,
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<FixedClock>,
) -> Arc<FeedSession> {
    Arc::new(FeedSession::new(
        TEST_KEY.to_string(),
        FeedConfig::default(),
        transport,
        issuer,
        clock,
    ))
}
