//! Tracker configuration.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default timeout applied to every outbound collector call.
pub const DEFAULT_COLLECTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors raised while building a tracker.
///
/// These are fatal at startup: a tracker with a broken collector URL or an
/// unparseable ignore pattern must never reach request traffic.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("collector URL must be set")]
    MissingCollectorUrl,

    #[error("invalid collector URL {url:?}: {source}")]
    InvalidCollectorUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnorePattern {
        pattern: String,
        source: Box<regex::Error>,
    },

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Validated tracker configuration.
///
/// Built once at startup and shared read-only with every in-flight request
/// and with the dispatch worker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    collector_url: Url,
    site_id: u32,
    token_auth: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
}

impl TrackerConfig {
    /// Validate the collector URL and site id.
    pub fn new(collector_url: &str, site_id: u32) -> Result<Self, ConfigError> {
        if collector_url.is_empty() {
            return Err(ConfigError::MissingCollectorUrl);
        }
        let collector_url =
            Url::parse(collector_url).map_err(|source| ConfigError::InvalidCollectorUrl {
                url: collector_url.to_string(),
                source,
            })?;

        Ok(Self {
            collector_url,
            site_id,
            token_auth: None,
            base_url: None,
            timeout: DEFAULT_COLLECTOR_TIMEOUT,
        })
    }

    /// Matomo API token. Without it the collector does not trust a
    /// caller-supplied client IP, so setting it also enables the `cip` field.
    pub fn with_token_auth(mut self, token: impl Into<String>) -> Self {
        self.token_auth = Some(token.into());
        self
    }

    /// Base URL of the tracked site. When set, tracked URLs are this base
    /// plus the request path; otherwise the URL is reconstructed from the
    /// request itself. A trailing slash is trimmed.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Timeout for each outbound collector call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn collector_url(&self) -> &Url {
        &self.collector_url
    }

    pub fn site_id(&self) -> u32 {
        self.site_id
    }

    pub fn token_auth(&self) -> Option<&str> {
        self.token_auth.as_deref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
