//! Configuration for the feed client.

use crate::errors::{FeedError, FeedResult};
use std::time::Duration;
use url::Url;

/// Fixed base URL of the spreadsheet feed service.
pub const GOOGLE_FEED_URL: &str = "https://spreadsheets.google.com/feeds/";

/// OAuth scope granting access to the spreadsheet feed.
pub const SPREADSHEET_FEED_SCOPE: &str = "https://spreadsheets.google.com/feeds";

/// Default Google OAuth2 token URL.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Access scope of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Feed reachable without credentials.
    Public,
    /// Feed requiring authentication.
    Private,
}

impl Visibility {
    /// Path segment form.
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Detail level of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Simplified feed.
    Values,
    /// Complete feed, including edit links.
    Full,
}

impl Projection {
    /// Path segment form.
    pub fn as_str(self) -> &'static str {
        match self {
            Projection::Values => "values",
            Projection::Full => "full",
        }
    }
}

/// Configuration for a [`crate::Spreadsheet`].
///
/// Visibility and projection are normally derived from whether credentials
/// are present; the overrides here pin them regardless of auth mode.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL for feed paths; always ends with a slash.
    pub base_url: String,
    /// OAuth token endpoint used for service account exchanges.
    pub token_url: String,
    /// Visibility override; `None` derives from credential presence.
    pub visibility: Option<Visibility>,
    /// Projection override; `None` derives from credential presence.
    pub projection: Option<Projection>,
    /// Per-request timeout handed to the transport.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl FeedConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> FeedConfigBuilder {
        FeedConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> FeedResult<()> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| FeedError::Configuration(format!("invalid base URL: {e}")))?;
        if base.scheme() != "https" && base.scheme() != "http" {
            return Err(FeedError::Configuration(
                "base URL must be http(s)".to_string(),
            ));
        }
        if !self.base_url.ends_with('/') {
            return Err(FeedError::Configuration(
                "base URL must end with a slash".to_string(),
            ));
        }
        Url::parse(&self.token_url)
            .map_err(|e| FeedError::Configuration(format!("invalid token URL: {e}")))?;
        Ok(())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: GOOGLE_FEED_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            visibility: None,
            projection: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("sheets-feed/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builder for [`FeedConfig`].
pub struct FeedConfigBuilder {
    config: FeedConfig,
}

impl FeedConfigBuilder {
    /// Creates a builder seeded with defaults.
    pub fn new() -> Self {
        Self {
            config: FeedConfig::default(),
        }
    }

    /// Sets the feed base URL. A trailing slash is appended if missing.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.config.base_url = url;
        self
    }

    /// Sets the OAuth token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.config.token_url = url.into();
        self
    }

    /// Pins the feed visibility regardless of auth mode.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.config.visibility = Some(visibility);
        self
    }

    /// Pins the feed projection regardless of auth mode.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.config.projection = Some(projection);
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> FeedResult<FeedConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for FeedConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
