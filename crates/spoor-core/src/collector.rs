//! Collector endpoint client.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{ConfigError, TrackerConfig};

/// Delivery errors. These never reach application code: the dispatch worker
/// logs them and moves on.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("request to collector failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector rejected tracking request: status {status}")]
    Status { status: u16 },
}

/// Outbound seam of the dispatcher: one call per tracking event.
///
/// Production uses [`HttpCollector`]; tests inject a recording
/// implementation to observe dispatches without a network.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn send(&self, query: &[(String, String)]) -> Result<(), CollectorError>;
}

/// HTTP GET collector client with a bounded per-call timeout.
pub struct HttpCollector {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCollector {
    pub fn new(config: &TrackerConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("spoor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.collector_url().clone(),
        })
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn send(&self, query: &[(String, String)]) -> Result<(), CollectorError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(CollectorError::Status {
                status: status.as_u16(),
            });
        }
        debug!("tracking event accepted by collector ({status})");
        Ok(())
    }
}
