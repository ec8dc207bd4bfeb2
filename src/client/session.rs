//! Feed session: credential state plus the request dispatch path.

use crate::auth::{AccessToken, Clock, CredentialState, ServiceAccountKey, TokenIssuer};
use crate::config::{FeedConfig, Projection, Visibility};
use crate::errors::{FeedError, FeedResult};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};
use crate::xml::{self, Element};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use std::sync::{Arc, RwLock};

/// Where a request goes: a literal URL (edit links captured from entries) or
/// feed path segments that get visibility/projection appended.
#[derive(Debug)]
pub(crate) enum FeedTarget<'a> {
    /// Absolute URL, used verbatim.
    Url(&'a str),
    /// Ordered path segments under the feed base URL.
    Segments(Vec<String>),
}

/// Request payload. POST/PUT carry an Atom XML body; GET carries an optional
/// query string; DELETE carries nothing.
#[derive(Debug)]
pub(crate) enum Payload {
    Empty,
    Query(String),
    AtomXml(String),
}

/// A successfully parsed feed response.
///
/// The raw body rides along with the parsed tree because row write-back
/// patches the original text rather than re-serializing the tree.
#[derive(Debug)]
pub(crate) struct FeedDocument {
    pub entity: Element,
    pub raw: String,
}

/// Shared state behind a [`crate::Spreadsheet`] and everything it hands out.
///
/// Worksheets, rows, and cells keep an `Arc` of this to issue their own
/// follow-up requests. Credential state sits behind a lock that is never held
/// across an await.
pub(crate) struct FeedSession {
    pub(crate) key: String,
    pub(crate) config: FeedConfig,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) issuer: Arc<dyn TokenIssuer>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) credentials: RwLock<CredentialState>,
}

impl FeedSession {
    pub(crate) fn new(
        key: String,
        config: FeedConfig,
        transport: Arc<dyn HttpTransport>,
        issuer: Arc<dyn TokenIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key,
            config,
            transport,
            issuer,
            clock,
            credentials: RwLock::new(CredentialState::Anonymous),
        }
    }

    fn read_credentials(&self) -> std::sync::RwLockReadGuard<'_, CredentialState> {
        self.credentials.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_credentials(&self) -> std::sync::RwLockWriteGuard<'_, CredentialState> {
        self.credentials.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Installs a bearer token. Anonymous sessions become token sessions; a
    /// service account session keeps its mode and replaces the cached token.
    pub(crate) fn set_token(&self, token: AccessToken) {
        let mut credentials = self.write_credentials();
        match &mut *credentials {
            CredentialState::ServiceAccount { token: slot, .. } => *slot = Some(token),
            state => *state = CredentialState::Token(token),
        }
    }

    /// Switches to service account mode and performs one immediate token
    /// exchange before returning.
    pub(crate) async fn use_service_account(&self, key: ServiceAccountKey) -> FeedResult<()> {
        {
            let mut credentials = self.write_credentials();
            *credentials = CredentialState::ServiceAccount { key, token: None };
        }
        self.ensure_fresh().await
    }

    /// No-op outside service account mode. In it, mints a replacement token
    /// when the held one is absent or its expiry is at or before now.
    pub(crate) async fn ensure_fresh(&self) -> FeedResult<()> {
        let stale_key = {
            let credentials = self.read_credentials();
            match &*credentials {
                CredentialState::ServiceAccount { key, token } => match token {
                    Some(token) if !token.is_expired_at(self.clock.now()) => None,
                    _ => Some(key.clone()),
                },
                _ => None,
            }
        };

        if let Some(key) = stale_key {
            tracing::debug!("refreshing service account token");
            let token = self.issuer.issue(&key).await?;
            let mut credentials = self.write_credentials();
            if let CredentialState::ServiceAccount { token: slot, .. } = &mut *credentials {
                *slot = Some(token);
            }
        }

        Ok(())
    }

    /// Effective visibility: config override, else derived from credentials.
    pub(crate) fn visibility(&self) -> Visibility {
        self.config.visibility.unwrap_or_else(|| {
            if self.read_credentials().has_credentials() {
                Visibility::Private
            } else {
                Visibility::Public
            }
        })
    }

    /// Effective projection: config override, else derived from credentials.
    pub(crate) fn projection(&self) -> Projection {
        self.config.projection.unwrap_or_else(|| {
            if self.read_credentials().has_credentials() {
                Projection::Full
            } else {
                Projection::Values
            }
        })
    }

    fn authorization_header(&self) -> Option<String> {
        self.read_credentials()
            .current_token()
            .map(AccessToken::authorization_header)
    }

    /// Builds, authenticates, sends, and classifies one feed request.
    ///
    /// Returns `Ok(None)` for a bodiless success, `Ok(Some(_))` for a parsed
    /// XML body, and otherwise one of the [`FeedError`] kinds, checked in
    /// order: transport failure, 401, any other >= 400, an HTML body on 200
    /// (private sheet interstitial), XML parse failure.
    pub(crate) async fn dispatch(
        &self,
        target: FeedTarget<'_>,
        method: HttpMethod,
        payload: Payload,
    ) -> FeedResult<Option<FeedDocument>> {
        self.ensure_fresh().await?;

        let mut url = match target {
            FeedTarget::Url(url) => url.to_string(),
            FeedTarget::Segments(mut segments) => {
                segments.push(self.visibility().as_str().to_string());
                segments.push(self.projection().as_str().to_string());
                format!("{}{}", self.config.base_url, segments.join("/"))
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .map_err(|e| FeedError::Configuration(format!("invalid user agent: {e}")))?,
        );
        if let Some(authorization) = self.authorization_header() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&authorization)
                    .map_err(|e| FeedError::Configuration(format!("invalid auth header: {e}")))?,
            );
        }

        let mut body = None;
        match payload {
            Payload::Empty => {}
            Payload::Query(query) => {
                if !query.is_empty() {
                    url.push('?');
                    url.push_str(&query);
                }
            }
            Payload::AtomXml(xml_body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/atom+xml"));
                body = Some(xml_body);
            }
        }

        tracing::debug!(?method, %url, "dispatching feed request");

        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                headers,
                body,
                timeout: Some(self.config.timeout),
            })
            .await?;

        let status = response.status;
        tracing::trace!(%status, bytes = response.body.len(), "feed response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(FeedError::Authorization);
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(FeedError::http(
                status,
                String::from_utf8_lossy(&response.body).into_owned(),
            ));
        }
        if status == StatusCode::OK
            && response
                .content_type()
                .is_some_and(|ct| ct.contains("text/html"))
        {
            return Err(FeedError::PrivateResource);
        }

        if response.body.is_empty() {
            return Ok(None);
        }

        let raw = String::from_utf8(response.body.to_vec())
            .map_err(|e| FeedError::Parse(format!("response body is not UTF-8: {e}")))?;
        let entity = xml::parse_document(&raw)?;
        Ok(Some(FeedDocument { entity, raw }))
    }
}
