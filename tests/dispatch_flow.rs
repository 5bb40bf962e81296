//! End-to-end dispatch behavior through the public API.
//!
//! Time is driven by a mock clock shared between the store and the policies,
//! so windows and minute buckets are crossed without sleeping.

use notice::infrastructure::mocks::{MockBehavior, MockChannel, MockClock};
use notice::{
    AggregatePolicy, CooldownPolicy, DedupePolicy, DispatchStatus, Dispatcher, Level,
    RateLimitPolicy, SendResult, SuppressReason,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn clocked() -> (MockClock, Arc<MockClock>) {
    let clock = MockClock::new(Instant::now());
    let shared = Arc::new(clock.clone());
    (clock, shared)
}

async fn send_outage(dispatcher: &Dispatcher) -> SendResult {
    dispatcher
        .send("database unreachable", "text", "error", None, None)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_dedupe_window_end_to_end() {
    let (clock, shared) = clocked();
    let channel = MockChannel::succeeding("ops");
    let dispatcher = Dispatcher::builder()
        .with_channel(channel.clone())
        .with_clock(shared)
        .with_policy(DedupePolicy::new(Duration::from_secs(60)))
        .build()
        .unwrap();

    assert_eq!(send_outage(&dispatcher).await.status, DispatchStatus::Sent);

    clock.advance(Duration::from_secs(30));
    let repeat = send_outage(&dispatcher).await;
    assert_eq!(repeat.status, DispatchStatus::Suppressed);
    assert_eq!(repeat.live().unwrap().reason, Some(SuppressReason::Deduped));

    clock.advance(Duration::from_secs(30));
    assert_eq!(send_outage(&dispatcher).await.status, DispatchStatus::Sent);
    assert_eq!(channel.sent_count(), 2);
}

#[tokio::test]
async fn test_dedupe_upgrade_sequence() {
    let channel = MockChannel::succeeding("ops");
    let dispatcher = Dispatcher::builder()
        .with_channel(channel.clone())
        .with_policy(DedupePolicy::new(Duration::from_secs(3600)).with_upgrade_after(3))
        .build()
        .unwrap();

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let result = dispatcher
            .send("queue backlog", "text", "warn", Some("queue"), None)
            .await
            .unwrap();
        statuses.push(result.status);
    }

    assert_eq!(
        statuses,
        vec![
            DispatchStatus::Sent,
            DispatchStatus::Suppressed,
            DispatchStatus::Suppressed,
            DispatchStatus::Sent,
        ]
    );
    assert_eq!(channel.sent_count(), 2);
}

#[tokio::test]
async fn test_rate_limit_per_minute() {
    let (clock, shared) = clocked();
    let dispatcher = Dispatcher::builder()
        .with_channel(MockChannel::succeeding("ops"))
        .with_clock(shared.clone())
        .with_policy(RateLimitPolicy::new(2).with_clock(shared))
        .build()
        .unwrap();

    let mut statuses = Vec::new();
    for i in 0..3 {
        let content = format!("event {}", i);
        let result = dispatcher.send(&content, "text", "info", None, None).await.unwrap();
        statuses.push(result.status);
    }
    assert_eq!(
        statuses,
        vec![
            DispatchStatus::Sent,
            DispatchStatus::Sent,
            DispatchStatus::Suppressed
        ]
    );

    clock.advance(Duration::from_secs(60));
    let next = dispatcher.send("fresh minute", "text", "info", None, None).await.unwrap();
    assert_eq!(next.status, DispatchStatus::Sent);
}

#[tokio::test]
async fn test_aggregate_summary_delivery() {
    let (clock, shared) = clocked();
    let channel = MockChannel::succeeding("ops");
    let dispatcher = Dispatcher::builder()
        .with_channel(channel.clone())
        .with_clock(shared.clone())
        .with_policy(
            AggregatePolicy::new(Duration::from_secs(600))
                .with_levels([Level::Warn])
                .with_max_samples(2)
                .with_clock(shared),
        )
        .build()
        .unwrap();

    for content in ["disk 91%", "disk 93%", "disk 97%"] {
        let result = dispatcher
            .send(content, "text", "warn", Some("disk"), Some("host-1"))
            .await
            .unwrap();
        assert_eq!(result.status, DispatchStatus::Suppressed);
    }
    assert_eq!(channel.sent_count(), 0);

    clock.advance(Duration::from_secs(600));
    let flushed = dispatcher.flush().await;
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].event_key, "aggregate:warn:host-1");
    assert_eq!(flushed[0].status, DispatchStatus::Sent);

    let summary = &channel.received()[0];
    assert_eq!(summary.level(), Level::Warn);
    assert!(summary.meta_flag("aggregate_skip"));
    assert_eq!(
        summary.raw_content(),
        "window=600s\nsource=host-1\n- disk: 3\nsamples:\n  disk: disk 91%\n  disk: disk 93%"
    );

    // Nothing left to flush.
    assert!(dispatcher.flush().await.is_empty());
}

#[tokio::test]
async fn test_flushed_events_skip_the_chain() {
    let (clock, shared) = clocked();
    let channel = MockChannel::succeeding("ops");
    let dispatcher = Dispatcher::builder()
        .with_channel(channel.clone())
        .with_clock(shared.clone())
        .with_policy(AggregatePolicy::new(Duration::from_secs(60)).with_clock(shared))
        .with_policy(CooldownPolicy::new(Duration::from_secs(3600)))
        .build()
        .unwrap();

    for round in 0..2 {
        dispatcher
            .send("tick", "text", "info", Some("tick"), None)
            .await
            .unwrap();
        clock.advance(Duration::from_secs(60));
        let flushed = dispatcher.flush().await;
        assert_eq!(flushed.len(), 1, "round {}", round);
    }

    // Flushed events skip the chain, so the cooldown never sees them.
    assert_eq!(channel.sent_count(), 2);
}

#[tokio::test]
async fn test_overall_status_reduction_across_flush_and_live() {
    let (clock, shared) = clocked();
    let flaky = MockChannel::succeeding("flaky").then(MockBehavior::Fail("502".to_string()));
    let dispatcher = Dispatcher::builder()
        .with_channel(flaky.clone())
        .with_clock(shared.clone())
        .with_policy(
            AggregatePolicy::new(Duration::from_secs(60))
                .with_levels([Level::Warn])
                .with_clock(shared),
        )
        .build()
        .unwrap();

    dispatcher.send("warned", "text", "warn", None, None).await.unwrap();
    clock.advance(Duration::from_secs(60));

    // Summary delivery fails, the live error succeeds: failed dominates.
    let result = dispatcher.send("broken", "text", "error", None, None).await.unwrap();
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].status, DispatchStatus::Failed);
    assert_eq!(result.results[1].status, DispatchStatus::Sent);
    assert_eq!(result.status, DispatchStatus::Failed);
}

#[tokio::test]
async fn test_result_serializes_for_callers() {
    let dispatcher = Dispatcher::builder()
        .with_channel(MockChannel::succeeding("ops"))
        .with_channel(MockChannel::failing("mail", "smtp refused"))
        .build()
        .unwrap();

    let result = dispatcher.send("x", "text", "info", Some("k"), None).await.unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["status"], "partial");
    assert_eq!(json["results"][0]["event_key"], "k");
    assert_eq!(json["results"][0]["channel_results"]["ops"]["success"], true);
    assert_eq!(
        json["results"][0]["channel_results"]["mail"]["message"],
        "smtp refused"
    );
}

#[tokio::test]
async fn test_unbounded_cooldown_suppresses_without_panicking() {
    let (clock, shared) = clocked();
    let channel = MockChannel::succeeding("ops");
    let dispatcher = Dispatcher::builder()
        .with_channel(channel.clone())
        .with_clock(shared)
        .with_policy(CooldownPolicy::new(Duration::MAX))
        .build()
        .unwrap();

    assert_eq!(send_outage(&dispatcher).await.status, DispatchStatus::Sent);
    clock.advance(Duration::from_secs(365 * 24 * 60 * 60));

    let repeat = send_outage(&dispatcher).await;
    assert_eq!(repeat.status, DispatchStatus::Suppressed);
    assert_eq!(channel.sent_count(), 1);
}
