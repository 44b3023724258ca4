//! Handler-side access to the tracking context.

use std::convert::Infallible;
use std::future::Future;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use spoor_core::{PerfTracker, TrackingHandle};

/// Extractor handing handler code the request's tracking context.
///
/// On requests the classifier excluded there is no context; every operation
/// then degrades to a no-op, so handler code never has to branch on whether
/// it is being tracked:
///
/// ```no_run
/// use spoor_axum::Tracking;
///
/// async fn search(tracking: Tracking) -> &'static str {
///     tracking.set("e_a", "Searching");
///     tracking.time_async("pf_srv", async {
///         // query the backend
///     })
///     .await;
///     "results"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Tracking(Option<TrackingHandle>);

impl<S> FromRequestParts<S> for Tracking
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<TrackingHandle>().cloned()))
    }
}

impl Tracking {
    /// Whether this request is being tracked.
    pub fn is_tracked(&self) -> bool {
        self.0.is_some()
    }

    /// The underlying handle, when the request is tracked.
    pub fn handle(&self) -> Option<&TrackingHandle> {
        self.0.as_ref()
    }

    /// Attach a custom tracked variable.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Some(handle) = &self.0 {
            handle.set(key, value);
        }
    }

    /// Record a named elapsed time in milliseconds.
    pub fn record_timing(&self, key: impl Into<String>, millis: f64) {
        if let Some(handle) = &self.0 {
            handle.record_timing(key, millis);
        }
    }

    /// Start a timing guard, when the request is tracked.
    pub fn timer(&self, key: impl Into<String>) -> Option<PerfTracker> {
        self.0.as_ref().map(|handle| handle.timer(key))
    }

    /// Measure a blocking scope.
    pub fn time<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        match &self.0 {
            Some(handle) => handle.time(key, f),
            None => f(),
        }
    }

    /// Measure an awaitable scope.
    pub async fn time_async<F: Future>(&self, key: &str, fut: F) -> F::Output {
        match &self.0 {
            Some(handle) => handle.time_async(key, fut).await,
            None => fut.await,
        }
    }
}
