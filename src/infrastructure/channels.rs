//! Built-in delivery channels.

use crate::application::ports::Channel;
use crate::domain::event::{Event, Level};
use crate::domain::result::ChannelResult;
use async_trait::async_trait;

/// Target used for every event emitted by [`TracingChannel`].
pub const TRACING_CHANNEL_TARGET: &str = "notice::channel";

/// Channel that delivers by emitting a `tracing` event.
///
/// The event level follows the alert level (`fatal` maps to `ERROR`). Useful
/// for local runs, demos, and as a catch-all audit sink next to real
/// transports. Delivery always succeeds.
#[derive(Debug, Clone)]
pub struct TracingChannel {
    name: String,
}

impl TracingChannel {
    /// Create a channel with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Channel for TracingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &Event) -> ChannelResult {
        let channel = self.name.as_str();
        let event_key = event.event_key();
        let source = event.source().unwrap_or("");
        let content_type = event.content_type();
        let content = event.raw_content();

        match event.level() {
            Level::Fatal | Level::Error => tracing::error!(
                target: TRACING_CHANNEL_TARGET,
                channel, event_key, source, content_type, severity = event.level().as_str(),
                "{}", content
            ),
            Level::Warn => tracing::warn!(
                target: TRACING_CHANNEL_TARGET,
                channel, event_key, source, content_type, severity = event.level().as_str(),
                "{}", content
            ),
            Level::Info => tracing::info!(
                target: TRACING_CHANNEL_TARGET,
                channel, event_key, source, content_type, severity = event.level().as_str(),
                "{}", content
            ),
        }

        ChannelResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockCaptureLayer;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_emits_structured_event() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let channel = TracingChannel::new("audit");
        let event = Event::builder("disk full on /var")
            .level(Level::Fatal)
            .event_key("disk")
            .source("host-1")
            .build();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let result = tracing::subscriber::with_default(subscriber, || {
            runtime.block_on(channel.send(&event))
        });

        assert_eq!(result, ChannelResult::ok());
        let captured = capture.get_captured();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].level, tracing::Level::ERROR);
        assert_eq!(captured[0].target, TRACING_CHANNEL_TARGET);
        assert_eq!(captured[0].message, "disk full on /var");
        assert_eq!(captured[0].field("event_key"), Some("disk"));
        assert_eq!(captured[0].field("source"), Some("host-1"));
        assert_eq!(captured[0].field("severity"), Some("fatal"));
        assert_eq!(captured[0].field("channel"), Some("audit"));
    }
}
