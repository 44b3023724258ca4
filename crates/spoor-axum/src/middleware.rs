//! Request lifecycle middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use spoor_core::{Tracker, TrackingContext, TrackingHandle};
use tracing::debug;

/// Timing key for the total request duration, recorded on every tracked
/// request.
const GENERATION_TIME_KEY: &str = "gt_ms";

/// Track every request the router serves.
///
/// Mounted with `axum::middleware::from_fn_with_state(tracker, track_requests)`.
/// Before the handler runs the request is classified against the ignore
/// rules; tracked requests get a [`TrackingHandle`] in their extensions for
/// handler code to attach custom variables and timings. After the response
/// is produced (handler failures included, since axum maps them to responses
/// before the middleware resumes) the event is submitted to the background
/// dispatcher. Nothing in here can change the response.
pub async fn track_requests(
    State(tracker): State<Arc<Tracker>>,
    mut req: Request,
    next: Next,
) -> Response {
    let route_id = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());
    let user_agent = header_value(req.headers(), "user-agent");

    if !tracker.should_track(route_id.as_deref(), user_agent.as_deref()) {
        debug!("request to {} excluded from tracking", req.uri().path());
        return next.run(req).await;
    }

    let context = build_context(&tracker, route_id.as_deref(), user_agent.clone(), &req);
    let handle = TrackingHandle::new(context);
    req.extensions_mut().insert(handle.clone());

    let method = req.method().to_string();
    let started = Instant::now();
    let response = next.run(req).await;

    // Teardown re-evaluates the rules with the facts captured at start, so
    // both decisions always agree.
    if tracker.should_track(route_id.as_deref(), user_agent.as_deref()) {
        handle.record_timing(
            GENERATION_TIME_KEY,
            started.elapsed().as_secs_f64() * 1000.0,
        );
        tracker.submit(handle.take(), response.status().as_u16(), &method);
    }

    response
}

/// Extract the tracked request facts.
fn build_context(
    tracker: &Tracker,
    route_id: Option<&str>,
    user_agent: Option<String>,
    req: &Request,
) -> TrackingContext {
    let action_name = tracker.rules().resolve_action_name(route_id);

    let url = match tracker.config().base_url() {
        Some(base) => format!("{base}{}", req.uri().path()),
        None => reconstruct_url(req),
    };

    // Forwarded requests report the origin IP, direct ones the peer address
    let ip_address = header_value(req.headers(), "x-forwarded-for")
        .or_else(|| peer_address(req))
        .unwrap_or_else(|| "unknown".to_string());

    let language = header_value(req.headers(), "accept-language").and_then(|value| {
        let token = value.split(',').next()?.split(';').next()?.trim().to_string();
        (!token.is_empty()).then_some(token)
    });

    TrackingContext::new(action_name, url, user_agent, ip_address, language)
}

/// Rebuild the requested URL from the request when no site base URL is
/// configured.
fn reconstruct_url(req: &Request) -> String {
    let scheme = if header_value(req.headers(), "x-forwarded-proto").as_deref() == Some("https") {
        "https"
    } else {
        "http"
    };
    let host = header_value(req.headers(), "host").unwrap_or_else(|| "localhost".to_string());
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{scheme}://{host}{path_and_query}")
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn peer_address(req: &Request) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}
