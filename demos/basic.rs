//! Basic example: one dispatcher, two channels, dedupe.
//!
//! Sends the same alert several times. The first copy is delivered to both
//! channels, the repeats are suppressed.

use async_trait::async_trait;
use notice::{Channel, ChannelResult, DedupePolicy, Dispatcher, Event, TracingChannel};
use std::time::Duration;

/// A sink that prints to stdout, standing in for a webhook or mail transport.
struct StdoutChannel;

#[async_trait]
impl Channel for StdoutChannel {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, event: &Event) -> ChannelResult {
        println!("  [stdout] {} {}", event.level(), event.raw_content());
        ChannelResult::ok()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dispatcher = Dispatcher::builder()
        .with_channel(StdoutChannel)
        .with_channel(TracingChannel::new("log"))
        .with_policy(DedupePolicy::new(Duration::from_secs(3600)))
        .build()
        .expect("valid dispatcher");

    println!("=== Basic Dispatch Example ===\n");
    println!("Policy: dedupe identical alerts for one hour\n");

    for i in 1..=5 {
        let result = dispatcher
            .send("database unreachable", "text", "error", None, Some("db"))
            .await
            .expect("known level");
        println!("send {} -> {}", i, result.status);
    }

    println!("\nA different alert has its own key:");
    let result = dispatcher
        .send("cache miss rate high", "text", "warn", None, None)
        .await
        .expect("known level");
    println!("send -> {}", result.status);

    let snapshot = dispatcher.metrics().snapshot();
    println!(
        "\nallowed {}, suppressed {}",
        snapshot.events_allowed, snapshot.events_suppressed
    );
}
