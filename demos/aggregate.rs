//! Aggregation with a background flusher.
//!
//! Warnings are collected per source for a short window and delivered as one
//! summary by the flusher task, even though no further alerts arrive.

use notice::{AggregatePolicy, Dispatcher, Level, TracingChannel};
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let dispatcher = Dispatcher::builder()
        .with_channel(TracingChannel::new("log"))
        .with_policy(
            AggregatePolicy::new(Duration::from_secs(2))
                .with_levels([Level::Warn])
                .with_max_samples(3),
        )
        .build()
        .expect("valid dispatcher");

    let flusher = dispatcher
        .spawn_flusher(Duration::from_millis(500))
        .expect("non-zero interval");

    println!("=== Aggregate Example ===\n");
    for (source, content) in [
        ("db", "replica lag 12s"),
        ("db", "replica lag 19s"),
        ("api", "p99 latency 2.1s"),
        ("db", "replica lag 31s"),
        ("db", "replica lag 44s"),
    ] {
        let event_key = format!("{}-warning", source);
        let result = dispatcher
            .send(content, "text", "warn", Some(event_key.as_str()), Some(source))
            .await
            .expect("known level");
        println!("{} / {} -> {}", source, content, result.status);
    }

    println!("\nWaiting for the window to close...\n");
    tokio::time::sleep(Duration::from_secs(3)).await;

    flusher.shutdown().await.expect("flusher stops cleanly");
    let snapshot = dispatcher.metrics().snapshot();
    println!("\nsummaries delivered: {}", snapshot.events_flushed);
}
