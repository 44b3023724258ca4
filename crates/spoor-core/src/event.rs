//! Tracking events and Matomo query assembly.

use serde_json::{json, Map, Value};

use crate::config::TrackerConfig;
use crate::context::TrackingContext;

/// Matomo tracking API version.
const API_VERSION: &str = "1";

/// One page view ready for delivery: the request's tracking context plus the
/// response facts only known at request end. Built at dispatch time and
/// consumed by a single collector call.
#[derive(Debug, Clone)]
pub struct TrackingEvent {
    pub context: TrackingContext,
    pub status: u16,
    pub method: String,
}

impl TrackingEvent {
    pub fn new(context: TrackingContext, status: u16, method: impl Into<String>) -> Self {
        Self {
            context,
            status,
            method: method.into(),
        }
    }

    /// Assemble the query parameters for the collector call.
    ///
    /// `cip` and `token_auth` are emitted together or not at all: the
    /// collector only trusts a caller-supplied client IP from an
    /// authenticated tracker.
    pub fn query_pairs(&self, config: &TrackerConfig) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = vec![
            ("idsite".into(), config.site_id().to_string()),
            ("rec".into(), "1".into()),
            ("rand".into(), rand::random::<u64>().to_string()),
            ("apiv".into(), API_VERSION.into()),
            ("url".into(), self.context.url.clone()),
            ("action_name".into(), self.context.action_name.clone()),
        ];

        if let Some(token) = config.token_auth() {
            pairs.push(("cip".into(), self.context.ip_address.clone()));
            pairs.push(("token_auth".into(), token.to_string()));
        }
        if let Some(user_agent) = &self.context.user_agent {
            pairs.push(("ua".into(), user_agent.clone()));
        }
        if let Some(language) = &self.context.language {
            pairs.push(("lang".into(), language.clone()));
        }
        pairs.push(("send_image".into(), "0".into()));
        pairs.push(("cvar".into(), self.cvar().to_string()));

        // Custom entries double as flat query fields (e.g. e_a for events)
        for (key, value) in &self.context.custom {
            pairs.push((key.clone(), value.clone()));
        }
        for (key, millis) in &self.context.timings {
            pairs.push((key.clone(), format!("{millis:.3}")));
        }

        pairs
    }

    /// The `cvar` JSON object: response status and method first, then the
    /// handler's custom entries alongside.
    fn cvar(&self) -> Value {
        let mut cvar = Map::new();
        cvar.insert("http_status_code".into(), json!(self.status));
        cvar.insert("http_method".into(), json!(self.method));
        for (key, value) in &self.context.custom {
            cvar.insert(key.clone(), json!(value));
        }
        Value::Object(cvar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TrackingContext;

    fn config() -> TrackerConfig {
        TrackerConfig::new("http://trackingserver/matomo.php", 1).unwrap()
    }

    fn context() -> TrackingContext {
        TrackingContext::new(
            "/foo",
            "http://testserver/foo",
            Some("test-agent/1.0".to_string()),
            "127.0.0.1",
            None,
        )
    }

    fn value_of<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn always_carries_the_protocol_fields() {
        let event = TrackingEvent::new(context(), 200, "GET");
        let pairs = event.query_pairs(&config());

        assert_eq!(value_of(&pairs, "idsite"), Some("1"));
        assert_eq!(value_of(&pairs, "rec"), Some("1"));
        assert_eq!(value_of(&pairs, "apiv"), Some("1"));
        assert_eq!(value_of(&pairs, "url"), Some("http://testserver/foo"));
        assert_eq!(value_of(&pairs, "action_name"), Some("/foo"));
        assert_eq!(value_of(&pairs, "send_image"), Some("0"));
        assert_eq!(value_of(&pairs, "ua"), Some("test-agent/1.0"));
        assert!(value_of(&pairs, "rand").is_some());
    }

    #[test]
    fn cache_buster_differs_between_calls() {
        let event = TrackingEvent::new(context(), 200, "GET");
        let config = config();
        let first = event.query_pairs(&config);
        let second = event.query_pairs(&config);
        assert_ne!(value_of(&first, "rand"), value_of(&second, "rand"));
    }

    #[test]
    fn cvar_reflects_status_method_and_custom_data() {
        let mut context = context();
        context.custom.insert("anything".into(), "goes".into());
        let event = TrackingEvent::new(context, 500, "POST");
        let pairs = event.query_pairs(&config());

        let cvar: Value = serde_json::from_str(value_of(&pairs, "cvar").unwrap()).unwrap();
        assert_eq!(cvar["http_status_code"], json!(500));
        assert_eq!(cvar["http_method"], json!("POST"));
        assert_eq!(cvar["anything"], json!("goes"));
    }

    #[test]
    fn without_token_no_client_ip_is_forwarded() {
        let event = TrackingEvent::new(context(), 200, "GET");
        let pairs = event.query_pairs(&config());
        assert_eq!(value_of(&pairs, "cip"), None);
        assert_eq!(value_of(&pairs, "token_auth"), None);
    }

    #[test]
    fn with_token_both_ip_and_token_are_forwarded() {
        let config = config().with_token_auth("FAKE_TOKEN");
        let event = TrackingEvent::new(context(), 200, "GET");
        let pairs = event.query_pairs(&config);
        assert_eq!(value_of(&pairs, "cip"), Some("127.0.0.1"));
        assert_eq!(value_of(&pairs, "token_auth"), Some("FAKE_TOKEN"));
    }

    #[test]
    fn language_is_emitted_only_when_detected() {
        let mut with_lang = context();
        with_lang.language = Some("sv".to_string());
        let pairs = TrackingEvent::new(with_lang, 200, "GET").query_pairs(&config());
        assert_eq!(value_of(&pairs, "lang"), Some("sv"));

        let pairs = TrackingEvent::new(context(), 200, "GET").query_pairs(&config());
        assert_eq!(value_of(&pairs, "lang"), None);
    }

    #[test]
    fn custom_entries_and_timings_become_flat_fields() {
        let mut context = context();
        context.custom.insert("e_a".into(), "Playing".into());
        context.timings.insert("pf_srv".into(), 101.5);
        let pairs = TrackingEvent::new(context, 200, "GET").query_pairs(&config());

        assert_eq!(value_of(&pairs, "e_a"), Some("Playing"));
        let pf_srv: f64 = value_of(&pairs, "pf_srv").unwrap().parse().unwrap();
        assert!(pf_srv >= 101.5);
    }
}
