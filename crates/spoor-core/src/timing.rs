//! Scoped wall-clock timing.

use std::time::Instant;

use crate::context::TrackingHandle;

/// Scope guard that measures elapsed wall-clock time between its creation
/// and its drop, and records the result in the owning context's timings.
///
/// Recording happens in `Drop`, so the measurement survives early returns,
/// `?` propagation, and panics inside the scope. The same guard backs both
/// the blocking and the awaitable scopes on [`TrackingHandle`]; an awaited
/// scope still measures wall-clock time, unaffected by task suspension.
#[derive(Debug)]
pub struct PerfTracker {
    handle: TrackingHandle,
    key: String,
    start: Instant,
}

impl PerfTracker {
    pub fn start(handle: &TrackingHandle, key: impl Into<String>) -> Self {
        Self {
            handle: handle.clone(),
            key: key.into(),
            start: Instant::now(),
        }
    }

    /// End the scope now. Equivalent to dropping the guard.
    pub fn stop(self) {}
}

impl Drop for PerfTracker {
    fn drop(&mut self) {
        let millis = self.start.elapsed().as_secs_f64() * 1000.0;
        self.handle.record_timing(self.key.clone(), millis);
    }
}
