//! # notice
//!
//! Alert dispatch core: noise-reduction policies over an expiring store, with
//! isolated fan-out to any number of delivery channels.
//!
//! Every event goes through the same pipeline. Pending aggregate summaries are
//! flushed and delivered first, then the event runs through the policy chain in
//! order (the first suppression wins), and a surviving event is sent to every
//! channel. Per-channel outcomes are classified into `sent`, `partial` or
//! `failed`, and everything that happened during the call is reduced into one
//! status.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notice::{AggregatePolicy, DedupePolicy, Dispatcher, Level, TracingChannel};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::builder()
//!     .with_channel(TracingChannel::new("audit"))
//!     .with_policy(DedupePolicy::new(Duration::from_secs(3600)).with_upgrade_after(10))
//!     .with_policy(AggregatePolicy::new(Duration::from_secs(600)).with_levels([Level::Warn]))
//!     .build()
//!     .unwrap();
//!
//! let result = dispatcher
//!     .send("replica lag 42s", "text", "warn", None, Some("db"))
//!     .await
//!     .unwrap();
//! println!("{}", result.status);
//! # }
//! ```
//!
//! ## Policies
//!
//! - **Dedupe**: suppress repeats of an `event_key` within a TTL, optionally
//!   letting a persistent alert through every N repeats
//! - **Cooldown**: one alert per key, then silence until the TTL expires
//! - **Rate limit**: at most N events per calendar minute, globally, per level
//!   or per key
//! - **Aggregate**: swallow matching events and deliver one summary per
//!   `(level, source)` per window
//!
//! Implement [`Policy`] for custom behavior. Policies keep their state in the
//! shared [`Store`] under keys prefixed with their own tag.
//!
//! ## Channels
//!
//! Channels implement the async [`Channel`] trait and never fail: transport
//! errors become a failed [`ChannelResult`]. The dispatcher additionally bounds
//! every call with a timeout and contains panics, so one broken sink cannot
//! affect the others.
//!
//! ## Observability
//!
//! Decisions are logged through `tracing` (`debug` for suppressions, `warn`
//! for failed deliveries, `info` for flushed summaries) and counted in
//! [`DispatchMetrics`]:
//!
//! ```rust,no_run
//! # use notice::{Dispatcher, TracingChannel};
//! # let dispatcher = Dispatcher::builder().with_channel(TracingChannel::new("log")).build().unwrap();
//! let snapshot = dispatcher.metrics().snapshot();
//! println!(
//!     "allowed {} suppressed {} ({:.1}%)",
//!     snapshot.events_allowed,
//!     snapshot.events_suppressed,
//!     snapshot.suppression_rate() * 100.0
//! );
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: events, policy outcomes and results
//! - **Application**: ports, policies, dispatcher, flusher, metrics
//! - **Infrastructure**: clock, memory store, built-in channels, configuration

/// Domain layer - pure data types.
pub mod domain;

/// Application layer - policies and orchestration.
pub mod application;

/// Infrastructure layer - adapters for the ports.
pub mod infrastructure;

pub use domain::{
    event::{default_event_key, Event, EventBuilder, EventError, Fields, Level},
    outcome::{PolicyOutcome, SuppressReason},
    result::{ChannelResult, DispatchResult, DispatchStatus, SendResult},
};

pub use application::{
    dispatcher::{BuildError, Dispatcher, DispatcherBuilder, FanOut},
    flusher::{FlushHandle, ShutdownError},
    metrics::{DispatchMetrics, MetricsSnapshot},
    policies::{
        AggregatePolicy, CooldownPolicy, DedupePolicy, LevelSet, Policy, RateLimitPolicy,
        RateLimitScope,
    },
    ports::{Channel, Clock, Store},
};

pub use infrastructure::{
    channels::TracingChannel,
    clock::SystemClock,
    config::{ConfigError, DispatcherConfig, PolicyConfig},
    store::MemoryStore,
};
