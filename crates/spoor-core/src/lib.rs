//! Core request-tracking pipeline for Spoor.
//!
//! This crate is framework independent: it owns the tracker configuration,
//! the ignore rules and per-route overrides, the per-request tracking
//! context, the timing guards, and the background dispatcher that delivers
//! tracking events to a Matomo-compatible collector. Framework integrations
//! (such as `spoor-axum`) build contexts from requests and hand them back
//! here for dispatch.

pub mod collector;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod event;
pub mod rules;
pub mod timing;

// Re-export the types integrations and applications touch directly
pub use collector::{Collector, CollectorError, HttpCollector};
pub use config::{ConfigError, TrackerConfig};
pub use context::{TrackingContext, TrackingHandle};
pub use dispatcher::{Tracker, TrackerBuilder};
pub use event::TrackingEvent;
pub use rules::{RouteDeclaration, RouteDetail, RouteRules};
pub use timing::PerfTracker;
