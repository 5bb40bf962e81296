//! Decisions produced by policies.

use crate::domain::event::Event;
use serde::{Serialize, Serializer};
use std::fmt;

/// Why a policy suppressed an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SuppressReason {
    /// An identical alert is still inside its dedupe window
    Deduped,
    /// The alert is cooling down
    Cooldown,
    /// The minute budget is exhausted
    RateLimited,
    /// The alert was folded into an aggregate bucket
    Aggregated,
    /// Reason given by a caller-defined policy
    Other(String),
}

impl SuppressReason {
    /// Stable string form reported in results and logs.
    pub fn as_str(&self) -> &str {
        match self {
            SuppressReason::Deduped => "deduped",
            SuppressReason::Cooldown => "cooldown",
            SuppressReason::RateLimited => "rate_limited",
            SuppressReason::Aggregated => "aggregated",
            SuppressReason::Other(reason) => reason,
        }
    }
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SuppressReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of running one policy over a live event.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    /// Pass the event (possibly rewritten) to the next policy
    Allow(Event),
    /// Drop the event
    Suppress {
        /// Why it was dropped
        reason: SuppressReason,
    },
}

impl PolicyOutcome {
    /// Shorthand for a suppression.
    pub fn suppress(reason: SuppressReason) -> Self {
        PolicyOutcome::Suppress { reason }
    }

    /// Check if this outcome is Allow.
    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyOutcome::Allow(_))
    }

    /// Check if this outcome is Suppress.
    pub fn is_suppress(&self) -> bool {
        matches!(self, PolicyOutcome::Suppress { .. })
    }

    /// The suppression reason, if any.
    pub fn reason(&self) -> Option<&SuppressReason> {
        match self {
            PolicyOutcome::Allow(_) => None,
            PolicyOutcome::Suppress { reason } => Some(reason),
        }
    }

    /// The allowed event, if any.
    pub fn into_event(self) -> Option<Event> {
        match self {
            PolicyOutcome::Allow(event) => Some(event),
            PolicyOutcome::Suppress { .. } => None,
        }
    }
}
