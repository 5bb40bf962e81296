//! Policy chain built from configuration.
//!
//! Loads a JSON configuration with cooldown and per-level rate limiting, then
//! shows how each alert fares.

use notice::{Dispatcher, DispatcherConfig, TracingChannel};

const CONFIG: &str = r#"{
    "channel_timeout_secs": 5,
    "policies": [
        {"type": "cooldown", "ttl": 300, "levels": ["fatal"]},
        {"type": "rate_limit", "per_minute": 3, "scope": "level"}
    ]
}"#;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let config: DispatcherConfig = serde_json::from_str(CONFIG).expect("valid json");
    let dispatcher = config
        .apply(Dispatcher::builder().with_channel(TracingChannel::new("log")))
        .expect("valid policies")
        .build()
        .expect("valid dispatcher");

    println!("=== Policy Chain Example ===\n");

    println!("Fatal alerts cool down for five minutes:");
    for _ in 0..3 {
        let result = dispatcher
            .send("primary down", "text", "fatal", Some("primary"), None)
            .await
            .expect("known level");
        let reason = result
            .live()
            .and_then(|r| r.reason.as_ref())
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!("  {} {}", result.status, reason);
    }

    println!("\nInfo alerts share a budget of 3 per minute:");
    for i in 1..=5 {
        let content = format!("deploy step {}", i);
        let result = dispatcher
            .send(&content, "text", "info", None, None)
            .await
            .expect("known level");
        println!("  step {} -> {}", i, result.status);
    }

    println!("\nUnknown levels are rejected:");
    match dispatcher.send("x", "text", "verbose", None, None).await {
        Ok(_) => println!("  unexpectedly accepted"),
        Err(err) => println!("  error: {}", err),
    }
}
