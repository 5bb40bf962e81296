//! Scriptable channel double.

use crate::application::ports::Channel;
use crate::domain::event::Event;
use crate::domain::result::ChannelResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What a [`MockChannel`] does on one `send` call.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Report success
    Succeed,
    /// Report failure with this message
    Fail(String),
    /// Sleep, then report success
    Delay(Duration),
    /// Panic inside `send`
    Panic,
}

#[derive(Debug)]
struct MockState {
    default: MockBehavior,
    script: VecDeque<MockBehavior>,
    received: Vec<Event>,
}

/// Channel double that records delivered events and follows a script.
///
/// Scripted behaviors are consumed one per call; once the script runs out the
/// default behavior applies. Clones share state.
///
/// # Examples
///
/// ```
/// use notice::infrastructure::mocks::{MockBehavior, MockChannel};
///
/// let channel = MockChannel::succeeding("ops")
///     .then(MockBehavior::Fail("http 502".to_string()));
/// assert_eq!(channel.sent_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockChannel {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    /// Create a channel with a default behavior.
    pub fn new(name: impl Into<String>, default: MockBehavior) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState {
                default,
                script: VecDeque::new(),
                received: Vec::new(),
            })),
        }
    }

    /// Channel that always succeeds.
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Succeed)
    }

    /// Channel that always fails with `message`.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Fail(message.into()))
    }

    /// Channel that sleeps for `delay` before succeeding.
    pub fn delayed(name: impl Into<String>, delay: Duration) -> Self {
        Self::new(name, MockBehavior::Delay(delay))
    }

    /// Channel that panics on every call.
    pub fn panicking(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Panic)
    }

    /// Queue a one-shot behavior for the next unscripted call.
    pub fn then(self, behavior: MockBehavior) -> Self {
        self.lock().script.push_back(behavior);
        self
    }

    /// Events passed to `send`, in call order.
    pub fn received(&self) -> Vec<Event> {
        self.lock().received.clone()
    }

    /// Number of `send` calls so far.
    pub fn sent_count(&self) -> usize {
        self.lock().received.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .expect("MockChannel mutex poisoned - a test thread panicked while holding the lock")
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &Event) -> ChannelResult {
        let behavior = {
            let mut state = self.lock();
            state.received.push(event.clone());
            let next = state.script.pop_front();
            next.unwrap_or_else(|| state.default.clone())
        };

        match behavior {
            MockBehavior::Succeed => ChannelResult::ok(),
            MockBehavior::Fail(message) => ChannelResult::failure(message),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                ChannelResult::ok()
            }
            MockBehavior::Panic => panic!("MockChannel {} scripted to panic", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_default() {
        let channel = MockChannel::succeeding("ops")
            .then(MockBehavior::Fail("http 502".to_string()));
        let event = Event::builder("disk full").build();

        let first = channel.send(&event).await;
        let second = channel.send(&event).await;

        assert_eq!(first, ChannelResult::failure("http 502"));
        assert_eq!(second, ChannelResult::ok());
        assert_eq!(channel.sent_count(), 2);
        assert_eq!(channel.received()[0].raw_content(), "disk full");
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let channel = MockChannel::failing("mail", "smtp refused");
        let clone = channel.clone();

        let result = clone.send(&Event::builder("x").build()).await;
        assert!(!result.success);
        assert_eq!(channel.sent_count(), 1);
        assert_eq!(channel.name(), "mail");
    }
}
