//! Typed dispatcher configuration.
//!
//! These types deserialize from whatever format the caller loads (JSON, TOML,
//! YAML via the matching serde crate) and are validated when turned into
//! policies. Channels are never part of the configuration: they are built by
//! the caller and handed to the [`DispatcherBuilder`] directly.

use crate::application::dispatcher::{DispatcherBuilder, FanOut, DEFAULT_CHANNEL_TIMEOUT};
use crate::application::policies::{
    AggregatePolicy, CooldownPolicy, DedupePolicy, Policy, RateLimitPolicy, RateLimitScope,
};
use crate::application::ports::Clock;
use crate::domain::event::Level;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::store::MAX_TTL;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_PER_MINUTE: u64 = 30;
const DEFAULT_WINDOW_SECS: u64 = 3600;
const DEFAULT_MAX_SAMPLES: usize = 5;

/// Error returned when configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A `levels` entry is not a known level
    #[error("invalid level in policy config: {0:?}")]
    InvalidLevel(String),
    /// `ttl` must be greater than zero
    #[error("{0} ttl must be greater than 0")]
    ZeroTtl(&'static str),
    /// A duration exceeds what the store can represent
    #[error("{field} must be at most {max_secs} seconds")]
    DurationTooLong { field: &'static str, max_secs: u64 },
    /// `window` must be greater than zero
    #[error("aggregate window must be greater than 0")]
    ZeroWindow,
    /// `per_minute` must be greater than zero
    #[error("rate_limit per_minute must be greater than 0")]
    ZeroPerMinute,
    /// `upgrade_after`, when given, must be greater than zero
    #[error("dedupe upgrade_after must be greater than 0")]
    ZeroUpgradeAfter,
    /// `channel_timeout_secs` must be greater than zero
    #[error("channel timeout must be greater than 0")]
    ZeroChannelTimeout,
}

/// Configuration of one policy, tagged by `type`.
///
/// # Example
/// ```
/// use notice::infrastructure::config::PolicyConfig;
/// use notice::Policy;
///
/// let config: PolicyConfig =
///     serde_json::from_str(r#"{"type": "rate_limit", "per_minute": 5, "scope": "level"}"#).unwrap();
/// let policy = config.build().unwrap();
/// assert_eq!(policy.name(), "rate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    Dedupe {
        /// Seconds a repeat stays suppressed
        #[serde(default = "default_ttl")]
        ttl: u64,
        #[serde(default)]
        levels: Vec<String>,
        #[serde(default)]
        upgrade_after: Option<u64>,
    },
    Cooldown {
        #[serde(default = "default_ttl")]
        ttl: u64,
        #[serde(default)]
        levels: Vec<String>,
    },
    RateLimit {
        #[serde(default = "default_per_minute")]
        per_minute: u64,
        #[serde(default)]
        levels: Vec<String>,
        #[serde(default)]
        scope: RateLimitScope,
    },
    Aggregate {
        /// Seconds a bucket collects before it is summarized
        #[serde(default = "default_window")]
        window: u64,
        #[serde(default = "default_aggregate_levels")]
        levels: Vec<String>,
        #[serde(default = "default_max_samples")]
        max_samples: usize,
    },
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_per_minute() -> u64 {
    DEFAULT_PER_MINUTE
}

fn default_window() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_aggregate_levels() -> Vec<String> {
    vec![Level::Warn.as_str().to_string()]
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

fn default_channel_timeout_secs() -> u64 {
    DEFAULT_CHANNEL_TIMEOUT.as_secs()
}

fn checked_secs(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    let duration = Duration::from_secs(secs);
    if duration > MAX_TTL {
        return Err(ConfigError::DurationTooLong {
            field,
            max_secs: MAX_TTL.as_secs(),
        });
    }
    Ok(duration)
}

fn parse_levels(levels: &[String]) -> Result<Vec<Level>, ConfigError> {
    levels
        .iter()
        .map(|level| {
            level
                .parse::<Level>()
                .map_err(|_| ConfigError::InvalidLevel(level.clone()))
        })
        .collect()
}

impl PolicyConfig {
    /// Validate and build the policy on the system clock.
    ///
    /// # Errors
    /// Returns a `ConfigError` for unknown levels, zero limits and zero or
    /// out-of-range durations.
    pub fn build(&self) -> Result<Arc<dyn Policy>, ConfigError> {
        self.build_with_clock(Arc::new(SystemClock::new()))
    }

    /// Validate and build the policy, reading time from `clock`.
    ///
    /// # Errors
    /// Returns a `ConfigError` for unknown levels, zero limits and zero or
    /// out-of-range durations.
    pub fn build_with_clock(&self, clock: Arc<dyn Clock>) -> Result<Arc<dyn Policy>, ConfigError> {
        let policy: Arc<dyn Policy> = match self {
            PolicyConfig::Dedupe {
                ttl,
                levels,
                upgrade_after,
            } => {
                if *ttl == 0 {
                    return Err(ConfigError::ZeroTtl("dedupe"));
                }
                let mut policy = DedupePolicy::new(checked_secs("dedupe ttl", *ttl)?)
                    .with_levels(parse_levels(levels)?);
                match upgrade_after {
                    Some(0) => return Err(ConfigError::ZeroUpgradeAfter),
                    Some(count) => policy = policy.with_upgrade_after(*count),
                    None => {}
                }
                Arc::new(policy)
            }
            PolicyConfig::Cooldown { ttl, levels } => {
                if *ttl == 0 {
                    return Err(ConfigError::ZeroTtl("cooldown"));
                }
                Arc::new(
                    CooldownPolicy::new(checked_secs("cooldown ttl", *ttl)?)
                        .with_levels(parse_levels(levels)?),
                )
            }
            PolicyConfig::RateLimit {
                per_minute,
                levels,
                scope,
            } => {
                if *per_minute == 0 {
                    return Err(ConfigError::ZeroPerMinute);
                }
                Arc::new(
                    RateLimitPolicy::new(*per_minute)
                        .with_levels(parse_levels(levels)?)
                        .with_scope(*scope)
                        .with_clock(clock),
                )
            }
            PolicyConfig::Aggregate {
                window,
                levels,
                max_samples,
            } => {
                if *window == 0 {
                    return Err(ConfigError::ZeroWindow);
                }
                Arc::new(
                    AggregatePolicy::new(checked_secs("aggregate window", *window)?)
                        .with_levels(parse_levels(levels)?)
                        .with_max_samples(*max_samples)
                        .with_clock(clock),
                )
            }
        };
        Ok(policy)
    }
}

/// Dispatcher settings: the policy chain, in order, plus delivery options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,
    #[serde(default)]
    pub fan_out: FanOut,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            policies: Vec::new(),
            channel_timeout_secs: default_channel_timeout_secs(),
            fan_out: FanOut::default(),
        }
    }
}

impl DispatcherConfig {
    /// Build every policy in order, using the builder's clock.
    ///
    /// # Errors
    /// Returns the first `ConfigError` found.
    pub fn apply(&self, builder: DispatcherBuilder) -> Result<DispatcherBuilder, ConfigError> {
        if self.channel_timeout_secs == 0 {
            return Err(ConfigError::ZeroChannelTimeout);
        }

        let clock = builder.clock();
        let policies = self
            .policies
            .iter()
            .map(|policy| policy.build_with_clock(Arc::clone(&clock)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(builder
            .with_policies(policies)
            .with_channel_timeout(Duration::from_secs(self.channel_timeout_secs))
            .with_fan_out(self.fan_out))
    }
}
