//! Building dispatchers from typed configuration.

use notice::infrastructure::mocks::{MockChannel, MockClock};
use notice::{
    ConfigError, DispatchStatus, Dispatcher, DispatcherConfig, FanOut, SuppressReason,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONFIG: &str = r#"{
    "channel_timeout_secs": 5,
    "fan_out": "sequential",
    "policies": [
        {"type": "aggregate", "window": 300, "levels": ["warn"]},
        {"type": "dedupe", "ttl": 600, "levels": ["error", "fatal"], "upgrade_after": 5},
        {"type": "rate_limit", "per_minute": 3, "scope": "level"}
    ]
}"#;

#[test]
fn test_parse_full_config() {
    let config: DispatcherConfig = serde_json::from_str(CONFIG).unwrap();
    assert_eq!(config.policies.len(), 3);
    assert_eq!(config.channel_timeout_secs, 5);
    assert_eq!(config.fan_out, FanOut::Sequential);
}

#[tokio::test]
async fn test_configured_chain_behaves_in_order() {
    let config: DispatcherConfig = serde_json::from_str(CONFIG).unwrap();
    let clock = MockClock::new(Instant::now());
    let channel = MockChannel::succeeding("ops");

    let builder = Dispatcher::builder()
        .with_channel(channel.clone())
        .with_clock(Arc::new(clock.clone()));
    let dispatcher = config.apply(builder).unwrap().build().unwrap();

    // Warnings are aggregated first.
    let warn = dispatcher.send("lag", "text", "warn", None, None).await.unwrap();
    assert_eq!(
        warn.live().unwrap().reason,
        Some(SuppressReason::Aggregated)
    );

    // Errors pass aggregate, then dedupe.
    let first = dispatcher.send("boom", "text", "error", None, None).await.unwrap();
    let again = dispatcher.send("boom", "text", "error", None, None).await.unwrap();
    assert_eq!(first.status, DispatchStatus::Sent);
    assert_eq!(again.live().unwrap().reason, Some(SuppressReason::Deduped));

    // Info only meets the rate limit, scoped per level.
    let mut statuses = Vec::new();
    for i in 0..4 {
        let content = format!("info {}", i);
        statuses.push(
            dispatcher
                .send(&content, "text", "info", None, None)
                .await
                .unwrap()
                .status,
        );
    }
    assert_eq!(statuses.iter().filter(|s| **s == DispatchStatus::Sent).count(), 3);
    assert_eq!(statuses[3], DispatchStatus::Suppressed);

    // The aggregate window follows the builder's clock.
    clock.advance(Duration::from_secs(300));
    let flushed = dispatcher.flush().await;
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].event_key, "aggregate:warn:default");
}

#[test]
fn test_invalid_config_surfaces_first_error() {
    let config: DispatcherConfig = serde_json::from_str(
        r#"{"policies": [{"type": "cooldown"}, {"type": "aggregate", "levels": ["loud"]}]}"#,
    )
    .unwrap();

    let err = config
        .apply(Dispatcher::builder().with_channel(MockChannel::succeeding("ops")))
        .err();
    assert_eq!(err, Some(ConfigError::InvalidLevel("loud".to_string())));
}

#[test]
fn test_oversized_ttl_is_rejected_at_build_time() {
    let config: DispatcherConfig = serde_json::from_str(
        r#"{"policies": [{"type": "cooldown", "ttl": 18446744073709551615}]}"#,
    )
    .unwrap();

    let err = config
        .apply(Dispatcher::builder().with_channel(MockChannel::succeeding("ops")))
        .err();
    assert!(
        matches!(err, Some(ConfigError::DurationTooLong { field: "cooldown ttl", .. })),
        "{:?}",
        err
    );
}

#[test]
fn test_config_round_trips_through_json() {
    let config: DispatcherConfig = serde_json::from_str(CONFIG).unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let reparsed: DispatcherConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, reparsed);
}
