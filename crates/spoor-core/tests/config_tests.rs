use std::time::Duration;

use spoor_core::{ConfigError, TrackerConfig};

#[test]
fn test_minimal_config() {
    let config = TrackerConfig::new("http://trackingserver/matomo.php", 7).unwrap();

    assert_eq!(config.site_id(), 7);
    assert_eq!(
        config.collector_url().as_str(),
        "http://trackingserver/matomo.php"
    );
    assert_eq!(config.token_auth(), None);
    assert_eq!(config.base_url(), None);
    assert_eq!(config.timeout(), Duration::from_secs(10));
}

#[test]
fn test_missing_collector_url_is_fatal() {
    let err = TrackerConfig::new("", 1).unwrap_err();
    assert!(matches!(err, ConfigError::MissingCollectorUrl));
}

#[test]
fn test_unparseable_collector_url_is_fatal() {
    let err = TrackerConfig::new("not a url", 1).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidCollectorUrl { .. }));
}

#[test]
fn test_base_url_trailing_slash_is_trimmed() {
    let config = TrackerConfig::new("http://trackingserver/matomo.php", 1)
        .unwrap()
        .with_base_url("http://testserver/");
    assert_eq!(config.base_url(), Some("http://testserver"));

    let config = TrackerConfig::new("http://trackingserver/matomo.php", 1)
        .unwrap()
        .with_base_url("http://testserver");
    assert_eq!(config.base_url(), Some("http://testserver"));
}

#[test]
fn test_token_and_timeout_overrides() {
    let config = TrackerConfig::new("http://trackingserver/matomo.php", 1)
        .unwrap()
        .with_token_auth("FAKE_TOKEN")
        .with_timeout(Duration::from_secs(2));

    assert_eq!(config.token_auth(), Some("FAKE_TOKEN"));
    assert_eq!(config.timeout(), Duration::from_secs(2));
}
