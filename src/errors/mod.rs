//! Error types for the spreadsheet feed client.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Top-level error type for the feed client.
///
/// Every public operation either resolves with the requested value or fails
/// with exactly one of these variants. Nothing is retried or swallowed
/// internally; a failed write leaves the local entity untouched.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A required identifier or setting is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network-level failure, passed through from the transport unmodified.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Token exchange or JWT signing failed.
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The feed rejected the request with HTTP 401.
    #[error("invalid authorization key")]
    Authorization,

    /// Any other HTTP response with status >= 400.
    #[error("HTTP error {status}: {reason}")]
    Http {
        /// Status code returned by the feed.
        status: StatusCode,
        /// Standard reason phrase for the status.
        reason: String,
        /// Raw response body.
        body: String,
    },

    /// HTTP 200 carrying an HTML login or interstitial page: the sheet is
    /// private and the request was unauthenticated.
    #[error("sheet is private; use authentication or make it public")]
    PrivateResource,

    /// A call that requires a response body received none.
    #[error("no response body for {0}")]
    EmptyResponse(&'static str),

    /// The response body could not be parsed as a feed document.
    #[error("XML parse error: {0}")]
    Parse(String),
}

impl FeedError {
    /// Builds an [`FeedError::Http`] from a status code and body.
    pub(crate) fn http(status: StatusCode, body: String) -> Self {
        FeedError::Http {
            status,
            reason: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            body,
        }
    }
}

/// Authentication errors raised by the token issuer.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The service account private key could not be used to sign a JWT.
    #[error("JWT encoding error: {0}")]
    JwtEncoding(String),

    /// The token endpoint rejected the exchange or was unreachable.
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network error (connect failure, DNS, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// Timed out waiting for the remote resource.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Any other HTTP-level transport failure.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Network(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_carries_reason_phrase() {
        let err = FeedError::http(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string());
        match err {
            FeedError::Http {
                status,
                reason,
                body,
            } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(reason, "Internal Server Error");
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            FeedError::Authorization.to_string(),
            "invalid authorization key"
        );
        assert_eq!(
            FeedError::EmptyResponse("worksheets feed").to_string(),
            "no response body for worksheets feed"
        );
    }
}
