//! Dispatch orchestration.
//!
//! The [`Dispatcher`] drives every event through the same pipeline:
//!
//! 1. flush every policy and deliver whatever summaries are due,
//! 2. run the live event through the policy chain, stopping at the first
//!    suppression,
//! 3. fan the surviving event out to every channel,
//! 4. reduce all delivery outcomes of the call into one status.
//!
//! Delivery problems never surface as errors: a failing, hanging or panicking
//! channel becomes a failed [`ChannelResult`] and its siblings are unaffected.

use crate::application::metrics::DispatchMetrics;
use crate::application::policies::Policy;
use crate::application::ports::{Channel, Clock, Store};
use crate::domain::event::{Event, EventError, Level};
use crate::domain::outcome::PolicyOutcome;
use crate::domain::result::{ChannelResult, DispatchResult, SendResult};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::store::MemoryStore;
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default per-channel delivery timeout.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Error returned when a dispatcher or its flusher cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// At least one channel is required
    #[error("no channels configured")]
    NoChannels,
    /// Two channels share a name
    #[error("duplicate channel name: {0}")]
    DuplicateChannel(String),
    /// Channel timeout must be greater than zero
    #[error("channel timeout must be greater than 0")]
    ZeroChannelTimeout,
    /// Flush interval must be greater than zero
    #[error("flush interval must be greater than 0")]
    ZeroFlushInterval,
}

/// How a surviving event is handed to the channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// All channels at once; the call takes as long as the slowest channel
    #[default]
    Concurrent,
    /// One channel after another, in registration order
    Sequential,
}

/// Alert dispatcher.
///
/// Cheap to clone: clones share channels, policies, store and metrics, and may
/// be driven from many tasks at once.
///
/// # Example
/// ```
/// use notice::{Dispatcher, DispatchStatus, TracingChannel, DedupePolicy};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let dispatcher = Dispatcher::builder()
///     .with_channel(TracingChannel::new("log"))
///     .with_policy(DedupePolicy::new(Duration::from_secs(60)))
///     .build()
///     .unwrap();
///
/// let first = dispatcher.send("disk full", "text", "error", None, None).await.unwrap();
/// let second = dispatcher.send("disk full", "text", "error", None, None).await.unwrap();
/// assert_eq!(first.status, DispatchStatus::Sent);
/// assert_eq!(second.status, DispatchStatus::Suppressed);
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    channels: Vec<Arc<dyn Channel>>,
    policies: Vec<Arc<dyn Policy>>,
    store: Arc<dyn Store>,
    channel_timeout: Duration,
    fan_out: FanOut,
    metrics: DispatchMetrics,
}

impl Dispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Build an event from raw parts and send it.
    ///
    /// # Errors
    /// Returns `EventError::InvalidLevel` if `level` is not a known level.
    /// Nothing else fails: delivery problems are reported in the result.
    pub async fn send(
        &self,
        raw_content: &str,
        content_type: &str,
        level: &str,
        event_key: Option<&str>,
        source: Option<&str>,
    ) -> Result<SendResult, EventError> {
        let level: Level = level.parse()?;
        let mut builder = Event::builder(raw_content)
            .content_type(content_type)
            .level(level);
        if let Some(event_key) = event_key {
            builder = builder.event_key(event_key);
        }
        if let Some(source) = source {
            builder = builder.source(source);
        }
        Ok(self.send_event(builder.build()).await)
    }

    /// Send a prepared event.
    ///
    /// Due flush output is delivered first; its results precede the live
    /// event's result in the returned list.
    pub async fn send_event(&self, event: Event) -> SendResult {
        let mut results = self.flush().await;
        let inner = &self.inner;

        let mut current = event;
        for policy in &inner.policies {
            let event_key = current.event_key().to_string();
            match policy.apply(current, inner.store.as_ref()) {
                PolicyOutcome::Allow(next) => current = next,
                PolicyOutcome::Suppress { reason } => {
                    debug!(
                        policy = policy.name(),
                        event_key = event_key.as_str(),
                        reason = reason.as_str(),
                        "event suppressed"
                    );
                    inner.metrics.record_suppressed();
                    results.push(DispatchResult::suppressed(event_key, reason));
                    return SendResult::suppressed(results);
                }
            }
        }

        inner.metrics.record_allowed();
        results.push(self.dispatch(&current).await);
        SendResult::from_dispatches(results)
    }

    /// Flush every policy in order and deliver what comes out.
    pub async fn flush(&self) -> Vec<DispatchResult> {
        let inner = &self.inner;
        let mut results = Vec::new();

        for policy in &inner.policies {
            let events = policy.flush(inner.store.as_ref());
            if events.is_empty() {
                continue;
            }
            inner.metrics.record_flushed(events.len() as u64);
            for event in &events {
                results.push(self.dispatch(event).await);
            }
        }
        results
    }

    /// Get the shared metrics.
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.inner.metrics
    }

    /// Get the shared store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Names of the configured channels, in registration order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.inner.channels.iter().map(|c| c.name()).collect()
    }

    async fn dispatch(&self, event: &Event) -> DispatchResult {
        let inner = &self.inner;
        let channel_results: BTreeMap<String, ChannelResult> = match inner.fan_out {
            FanOut::Concurrent => join_all(
                inner
                    .channels
                    .iter()
                    .map(|channel| self.deliver(channel.as_ref(), event)),
            )
            .await
            .into_iter()
            .collect(),
            FanOut::Sequential => {
                let mut results = BTreeMap::new();
                for channel in &inner.channels {
                    let (name, result) = self.deliver(channel.as_ref(), event).await;
                    results.insert(name, result);
                }
                results
            }
        };

        let result = DispatchResult::from_channel_results(event.event_key(), channel_results);
        inner.metrics.record_dispatch(result.status);
        debug!(
            event_key = event.event_key(),
            status = result.status.as_str(),
            succeeded = result.succeeded(),
            "event dispatched"
        );
        result
    }

    async fn deliver(&self, channel: &dyn Channel, event: &Event) -> (String, ChannelResult) {
        let inner = &self.inner;
        let name = channel.name().to_string();

        // Contain panics so one broken sink cannot take down the fan-out.
        let attempt = AssertUnwindSafe(channel.send(event)).catch_unwind();
        let result = match tokio::time::timeout(inner.channel_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => {
                inner.metrics.record_channel_panic();
                ChannelResult::failure(format!("channel panicked: {}", panic_message(&*payload)))
            }
            Err(_) => {
                inner.metrics.record_channel_timeout();
                ChannelResult::failure(format!(
                    "timed out after {}ms",
                    inner.channel_timeout.as_millis()
                ))
            }
        };

        if !result.success {
            warn!(
                channel = name.as_str(),
                event_key = event.event_key(),
                detail = result.message.as_deref().unwrap_or(""),
                "channel delivery failed"
            );
        }
        (name, result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policies: Vec<&str> = self.inner.policies.iter().map(|p| p.name()).collect();
        f.debug_struct("Dispatcher")
            .field("channels", &self.channel_names())
            .field("policies", &policies)
            .field("channel_timeout", &self.inner.channel_timeout)
            .field("fan_out", &self.inner.fan_out)
            .finish()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    channels: Vec<Arc<dyn Channel>>,
    policies: Vec<Arc<dyn Policy>>,
    store: Option<Arc<dyn Store>>,
    clock: Option<Arc<dyn Clock>>,
    channel_timeout: Duration,
    fan_out: FanOut,
    metrics: DispatchMetrics,
}

impl DispatcherBuilder {
    /// Create a builder with no channels, no policies and default settings.
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            policies: Vec::new(),
            store: None,
            clock: None,
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
            fan_out: FanOut::default(),
            metrics: DispatchMetrics::new(),
        }
    }

    /// Add a channel.
    pub fn with_channel<C: Channel + 'static>(mut self, channel: C) -> Self {
        self.channels.push(Arc::new(channel));
        self
    }

    /// Add several shared channels.
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = Arc<dyn Channel>>) -> Self {
        self.channels.extend(channels);
        self
    }

    /// Append a policy to the chain.
    ///
    /// The policy keeps its own clock: time-driven policies such as
    /// [`RateLimitPolicy`](crate::RateLimitPolicy) and
    /// [`AggregatePolicy`](crate::AggregatePolicy) are not switched to the
    /// clock given to [`with_clock`](Self::with_clock). Pass the same clock to
    /// their `with_clock`, or build them through
    /// [`DispatcherConfig::apply`](crate::DispatcherConfig::apply), which does.
    pub fn with_policy<P: Policy + 'static>(mut self, policy: P) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Append several shared policies to the chain, in order.
    pub fn with_policies(mut self, policies: impl IntoIterator<Item = Arc<dyn Policy>>) -> Self {
        self.policies.extend(policies);
        self
    }

    /// Use a caller-supplied store instead of a fresh [`MemoryStore`].
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Clock for the default store.
    ///
    /// Only the store built by [`build`](Self::build) and policies built by
    /// [`DispatcherConfig::apply`](crate::DispatcherConfig::apply) read it.
    /// Policies added with [`with_policy`](Self::with_policy) keep their own
    /// clock, and a store passed to [`with_store`](Self::with_store) keeps its.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Bound each channel call. Default 10 seconds.
    pub fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.channel_timeout = timeout;
        self
    }

    /// Choose concurrent or sequential fan-out.
    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Record into existing metrics instead of fresh ones.
    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Clock configured on this builder, or the system clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock
            .clone()
            .unwrap_or_else(|| Arc::new(SystemClock::new()))
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    /// Returns an error if no channel is configured, two channels share a
    /// name, or the channel timeout is zero.
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        if self.channels.is_empty() {
            return Err(BuildError::NoChannels);
        }
        if self.channel_timeout.is_zero() {
            return Err(BuildError::ZeroChannelTimeout);
        }

        let mut names = HashSet::with_capacity(self.channels.len());
        for channel in &self.channels {
            if !names.insert(channel.name()) {
                return Err(BuildError::DuplicateChannel(channel.name().to_string()));
            }
        }

        let clock = self.clock();
        let store = self.store.unwrap_or_else(|| {
            Arc::new(MemoryStore::with_clock(clock).with_metrics(self.metrics.clone()))
        });

        Ok(Dispatcher {
            inner: Arc::new(DispatcherInner {
                channels: self.channels,
                policies: self.policies,
                store,
                channel_timeout: self.channel_timeout,
                fan_out: self.fan_out,
                metrics: self.metrics,
            }),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
