//! Structured log output of the dispatch pipeline.

use notice::infrastructure::mocks::{MockCaptureLayer, MockChannel};
use notice::{DedupePolicy, Dispatcher};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn capture() -> (MockCaptureLayer, tracing::subscriber::DefaultGuard) {
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

#[tokio::test]
async fn test_failed_channel_is_logged_as_warning() {
    let (capture, _guard) = capture();
    let dispatcher = Dispatcher::builder()
        .with_channel(MockChannel::failing("mail", "smtp refused"))
        .build()
        .unwrap();

    dispatcher.send("x", "text", "error", Some("k"), None).await.unwrap();

    let warnings = capture.at_level(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "channel delivery failed");
    assert_eq!(warnings[0].field("channel"), Some("mail"));
    assert_eq!(warnings[0].field("event_key"), Some("k"));
    assert_eq!(warnings[0].field("detail"), Some("smtp refused"));
}

#[tokio::test]
async fn test_suppression_is_logged_at_debug() {
    let (capture, _guard) = capture();
    let dispatcher = Dispatcher::builder()
        .with_channel(MockChannel::succeeding("ops"))
        .with_policy(DedupePolicy::new(Duration::from_secs(60)))
        .build()
        .unwrap();

    dispatcher.send("x", "text", "error", Some("k"), None).await.unwrap();
    dispatcher.send("x", "text", "error", Some("k"), None).await.unwrap();

    let suppressed = capture.containing("event suppressed");
    assert_eq!(suppressed.len(), 1);
    assert_eq!(suppressed[0].level, Level::DEBUG);
    assert_eq!(suppressed[0].field("policy"), Some("dedupe"));
    assert_eq!(suppressed[0].field("reason"), Some("deduped"));
}
