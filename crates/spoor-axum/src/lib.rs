//! axum integration for the Spoor request tracker.
//!
//! Mount [`track_requests`] on a router and every request it serves is
//! classified, measured, and reported to the configured collector in the
//! background:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{middleware, routing::get, Router};
//! use spoor_axum::{track_requests, RouteRules, Tracker};
//!
//! # async fn build() -> Result<Router, spoor_core::ConfigError> {
//! let mut rules = RouteRules::new();
//! rules.ignore_route("/health");
//! rules.declare("/users").action_name("Users");
//!
//! let tracker = Arc::new(
//!     Tracker::builder("https://matomo.example.com/matomo.php", 1)?
//!         .base_url("https://example.com")
//!         .rules(rules)
//!         .build()?,
//! );
//!
//! let app = Router::new()
//!     .route("/users", get(|| async { "users" }))
//!     .route("/health", get(|| async { "ok" }))
//!     .layer(middleware::from_fn_with_state(tracker, track_requests));
//! # Ok(app)
//! # }
//! ```
//!
//! Handlers attach custom variables and timings through the [`Tracking`]
//! extractor; on untracked requests it degrades to a no-op.

pub mod extract;
pub mod middleware;

pub use extract::Tracking;
pub use middleware::track_requests;

// Re-export the core surface applications need to configure the tracker
pub use spoor_core::{PerfTracker, RouteRules, Tracker, TrackerBuilder, TrackingHandle};
