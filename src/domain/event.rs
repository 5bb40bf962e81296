//! Canonical notification event.
//!
//! An [`Event`] is the unit flowing through the policy chain and out to the
//! channels. Its identity for bucketing is the `event_key`: two events with the
//! same key are treated as the same alert regardless of their content.

use ahash::RandomState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Open key-value side channel carried by an event (`context`, `meta`, `params`).
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Content type used when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "text";

// Fixed seeds keep default keys identical across processes and restarts.
const KEY_HASH_SEEDS: [u64; 4] = [
    0x6e6f_7469_6365_0001,
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
];

/// Error returned when an event cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The level is not one of `fatal`, `error`, `warn`, `info`
    #[error("invalid level: {0:?}")]
    InvalidLevel(String),
}

/// Severity of a notification.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Unrecoverable failure
    Fatal,
    /// Failure needing attention
    Error,
    /// Degraded but working
    Warn,
    /// Informational
    #[default]
    Info,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 4] = [Level::Fatal, Level::Error, Level::Warn, Level::Info];

    /// Lowercase name used in keys and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
        }
    }
}

impl FromStr for Level {
    type Err = EventError;

    /// Parse a level name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warn" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            _ => Err(EventError::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the default event key: `<level>:<12 hex digits of the content hash>`.
///
/// The result depends only on `level` and `raw_content`.
///
/// # Example
/// ```
/// use notice::{default_event_key, Level};
///
/// let a = default_event_key(Level::Error, "disk full");
/// let b = default_event_key(Level::Error, "disk full");
/// assert_eq!(a, b);
/// assert!(a.starts_with("error:"));
/// assert_eq!(a.len(), "error:".len() + 12);
/// ```
pub fn default_event_key(level: Level, raw_content: &str) -> String {
    let [k0, k1, k2, k3] = KEY_HASH_SEEDS;
    let digest = RandomState::with_seeds(k0, k1, k2, k3).hash_one(raw_content);
    format!("{}:{:012x}", level, digest >> 16)
}

/// A normalized notification event.
///
/// Immutable once built; policies that need to rewrite an event produce a
/// modified copy through the consuming `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_key: String,
    level: Level,
    raw_content: String,
    #[serde(rename = "type")]
    content_type: String,
    source: Option<String>,
    #[serde(default)]
    context: Fields,
    #[serde(default)]
    meta: Fields,
    #[serde(default)]
    params: Fields,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Start building an event with the given content.
    ///
    /// Defaults: level `info`, type `text`, no source, empty maps, timestamp now.
    pub fn builder(raw_content: impl Into<String>) -> EventBuilder {
        EventBuilder::new(raw_content)
    }

    /// Identity used by every policy for bucketing.
    pub fn event_key(&self) -> &str {
        &self.event_key
    }

    /// Severity.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Message body as given by the caller.
    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    /// Content type tag (`text`, `markdown`, `html`, ...).
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Optional grouping key.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Caller context.
    pub fn context(&self) -> &Fields {
        &self.context
    }

    /// Pipeline metadata (e.g. `aggregate_skip`).
    pub fn meta(&self) -> &Fields {
        &self.meta
    }

    /// Channel-specific parameters.
    pub fn params(&self) -> &Fields {
        &self.params
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True when `meta[key]` is the JSON boolean `true`.
    pub fn meta_flag(&self, key: &str) -> bool {
        matches!(self.meta.get(key), Some(serde_json::Value::Bool(true)))
    }

    /// Copy of this event with one `meta` entry set.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Copy of this event with one `context` entry set.
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Copy of this event with one `params` entry set.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Builder for [`Event`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    raw_content: String,
    content_type: Option<String>,
    level: Level,
    event_key: Option<String>,
    source: Option<String>,
    context: Fields,
    meta: Fields,
    params: Fields,
    timestamp: Option<DateTime<Utc>>,
}

impl EventBuilder {
    fn new(raw_content: impl Into<String>) -> Self {
        Self {
            raw_content: raw_content.into(),
            content_type: None,
            level: Level::default(),
            event_key: None,
            source: None,
            context: Fields::new(),
            meta: Fields::new(),
            params: Fields::new(),
            timestamp: None,
        }
    }

    /// Set the severity.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the content type. Stored lowercased; empty falls back to `text`.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set an explicit event key. Empty keys fall back to the default.
    pub fn event_key(mut self, event_key: impl Into<String>) -> Self {
        self.event_key = Some(event_key.into());
        self
    }

    /// Set the grouping source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replace the context map.
    pub fn context(mut self, context: Fields) -> Self {
        self.context = context;
        self
    }

    /// Replace the meta map.
    pub fn meta(mut self, meta: Fields) -> Self {
        self.meta = meta;
        self
    }

    /// Replace the params map.
    pub fn params(mut self, params: Fields) -> Self {
        self.params = params;
        self
    }

    /// Override the creation time.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Finish the event.
    pub fn build(self) -> Event {
        let content_type = self
            .content_type
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let event_key = self
            .event_key
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| default_event_key(self.level, &self.raw_content));

        Event {
            event_key,
            level: self.level,
            raw_content: self.raw_content,
            content_type,
            source: self.source,
            context: self.context,
            meta: self.meta,
            params: self.params,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
