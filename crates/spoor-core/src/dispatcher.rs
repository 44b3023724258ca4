//! The tracker: configuration, rules, and the background dispatch worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::collector::{Collector, HttpCollector};
use crate::config::{ConfigError, TrackerConfig};
use crate::context::TrackingContext;
use crate::event::TrackingEvent;
use crate::rules::RouteRules;

/// Builder for a [`Tracker`]. Configuration problems surface here, at
/// application startup, never at request time.
pub struct TrackerBuilder {
    config: TrackerConfig,
    rules: RouteRules,
    collector: Option<Arc<dyn Collector>>,
}

impl TrackerBuilder {
    /// Override the Matomo auth token (enables the `cip` field).
    pub fn token_auth(mut self, token: impl Into<String>) -> Self {
        self.config = self.config.with_token_auth(token);
        self
    }

    /// Set the tracked site's base URL (trailing slash trimmed).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.with_base_url(base_url);
        self
    }

    /// Bound each outbound collector call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Install the ignore rules and route declarations.
    pub fn rules(mut self, rules: RouteRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the HTTP collector with a custom implementation. Used by
    /// tests to observe dispatches in-process.
    pub fn collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Finish the tracker and spawn its dispatch worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<Tracker, ConfigError> {
        let collector = match self.collector {
            Some(collector) => collector,
            None => Arc::new(HttpCollector::new(&self.config)?),
        };
        let config = Arc::new(self.config);
        let rules = Arc::new(self.rules);

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_worker(receiver, collector, config.clone()));
        info!(
            "request tracker ready (site {} -> {})",
            config.site_id(),
            config.collector_url()
        );

        Ok(Tracker {
            config,
            rules,
            sender,
        })
    }
}

/// Process-wide request tracker.
///
/// Holds the immutable configuration and rules plus the sending side of the
/// dispatch channel. Cloning is cheap; all clones feed the same worker.
#[derive(Clone)]
pub struct Tracker {
    config: Arc<TrackerConfig>,
    rules: Arc<RouteRules>,
    sender: mpsc::UnboundedSender<TrackingEvent>,
}

impl Tracker {
    /// Start configuring a tracker for the given collector URL and site id.
    pub fn builder(collector_url: &str, site_id: u32) -> Result<TrackerBuilder, ConfigError> {
        Ok(TrackerBuilder {
            config: TrackerConfig::new(collector_url, site_id)?,
            rules: RouteRules::new(),
            collector: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn rules(&self) -> &RouteRules {
        &self.rules
    }

    /// See [`RouteRules::should_track`].
    pub fn should_track(&self, route_id: Option<&str>, user_agent: Option<&str>) -> bool {
        self.rules.should_track(route_id, user_agent)
    }

    /// Hand a completed request over to the dispatch worker.
    ///
    /// Fire and forget: the caller never waits for, or learns about, the
    /// delivery. A full teardown of the worker (runtime shutdown) drops the
    /// event with a log line.
    pub fn submit(&self, context: TrackingContext, status: u16, method: &str) {
        let event = TrackingEvent::new(context, status, method);
        if self.sender.send(event).is_err() {
            warn!("tracking worker is gone; dropping event");
        }
    }
}

/// Drains the channel until every sender is gone. Delivery failures are
/// contained here: logged, never propagated.
async fn dispatch_worker(
    mut receiver: mpsc::UnboundedReceiver<TrackingEvent>,
    collector: Arc<dyn Collector>,
    config: Arc<TrackerConfig>,
) {
    while let Some(event) = receiver.recv().await {
        let query = event.query_pairs(&config);
        if let Err(err) = collector.send(&query).await {
            warn!(
                "tracking event delivery failed for {}: {}",
                event.context.action_name, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::collector::CollectorError;

    #[derive(Default)]
    struct RecordingCollector {
        calls: Mutex<Vec<Vec<(String, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Collector for RecordingCollector {
        async fn send(&self, query: &[(String, String)]) -> Result<(), CollectorError> {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(query.to_vec());
            if self.fail {
                return Err(CollectorError::Status { status: 500 });
            }
            Ok(())
        }
    }

    async fn wait_for_calls(collector: &RecordingCollector, expected: usize) {
        for _ in 0..100 {
            if collector
                .calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len()
                >= expected
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("collector never saw {expected} call(s)");
    }

    fn context() -> TrackingContext {
        TrackingContext::new("/foo", "http://testserver/foo", None, "127.0.0.1", None)
    }

    #[tokio::test]
    async fn submit_reaches_the_collector() {
        let collector = Arc::new(RecordingCollector::default());
        let tracker = Tracker::builder("http://trackingserver/matomo.php", 1)
            .unwrap()
            .collector(collector.clone())
            .build()
            .unwrap();

        tracker.submit(context(), 200, "GET");
        wait_for_calls(&collector, 1).await;

        let calls = collector.calls.lock().unwrap();
        let pairs = &calls[0];
        assert!(pairs.iter().any(|(k, v)| k == "action_name" && v == "/foo"));
    }

    #[tokio::test]
    async fn collector_failure_is_contained() {
        let collector = Arc::new(RecordingCollector {
            fail: true,
            ..Default::default()
        });
        let tracker = Tracker::builder("http://trackingserver/matomo.php", 1)
            .unwrap()
            .collector(collector.clone())
            .build()
            .unwrap();

        // Neither submit must panic or surface the delivery error
        tracker.submit(context(), 200, "GET");
        tracker.submit(context(), 200, "GET");
        wait_for_calls(&collector, 2).await;
    }

    #[test]
    fn invalid_collector_url_fails_fast() {
        assert!(matches!(
            Tracker::builder("not a url", 1).map(|_| ()),
            Err(ConfigError::InvalidCollectorUrl { .. })
        ));
        assert!(matches!(
            Tracker::builder("", 1).map(|_| ()),
            Err(ConfigError::MissingCollectorUrl)
        ));
    }
}
