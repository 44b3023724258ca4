//! Per-request tracking state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::timing::PerfTracker;

/// Mutable state bag accumulated between request start and request end.
///
/// One context exists per tracked request. It is created by the lifecycle
/// middleware, mutated by handler code through a [`TrackingHandle`], and
/// consumed exactly once when the request completes.
#[derive(Debug, Clone, Default)]
pub struct TrackingContext {
    /// Human-readable label for the tracked endpoint.
    pub action_name: String,
    /// Fully qualified URL reported to the collector.
    pub url: String,
    pub user_agent: Option<String>,
    /// Forwarded-for header value when present, else the peer address.
    pub ip_address: String,
    /// First token of the accept-language header.
    pub language: Option<String>,
    /// Handler-attached key/value pairs, flattened into the query and the
    /// `cvar` JSON at dispatch time.
    pub custom: HashMap<String, String>,
    /// Named elapsed-time measurements in milliseconds.
    pub timings: HashMap<String, f64>,
}

impl TrackingContext {
    pub fn new(
        action_name: impl Into<String>,
        url: impl Into<String>,
        user_agent: Option<String>,
        ip_address: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            url: url.into(),
            user_agent,
            ip_address: ip_address.into(),
            language,
            custom: HashMap::new(),
            timings: HashMap::new(),
        }
    }
}

/// Cheaply clonable handle to a request's [`TrackingContext`].
///
/// The handle rides in the request extensions so handler code can attach
/// custom data and timings. Request extensions require `Clone`, so the
/// context sits behind a mutex; within one request the lock is never
/// contended.
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    inner: Arc<Mutex<TrackingContext>>,
}

impl TrackingHandle {
    pub fn new(context: TrackingContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackingContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a custom tracked variable, overwriting any prior value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().custom.insert(key.into(), value.into());
    }

    /// Record a named elapsed time in milliseconds, overwriting any prior
    /// value for the key.
    pub fn record_timing(&self, key: impl Into<String>, millis: f64) {
        self.lock().timings.insert(key.into(), millis);
    }

    /// Start a timing guard that records into this context when dropped.
    pub fn timer(&self, key: impl Into<String>) -> PerfTracker {
        PerfTracker::start(self, key)
    }

    /// Measure a blocking scope. The timing is recorded even when the
    /// closure panics.
    pub fn time<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let _guard = self.timer(key);
        f()
    }

    /// Measure an awaitable scope. Elapsed time is wall-clock between enter
    /// and exit regardless of how often the task suspends in between.
    pub async fn time_async<F: Future>(&self, key: &str, fut: F) -> F::Output {
        let _guard = self.timer(key);
        fut.await
    }

    /// Read a snapshot of the context.
    pub fn snapshot(&self) -> TrackingContext {
        self.lock().clone()
    }

    /// Take the context out for dispatch. The handle (and any clones held by
    /// handler code) is left with an empty context; mutations after this
    /// point are never observed.
    pub fn take(&self) -> TrackingContext {
        std::mem::take(&mut *self.lock())
    }
}
