//! Delivery outcomes.
//!
//! Channels report a [`ChannelResult`], one fan-out is classified into a
//! [`DispatchResult`], and everything that happened during one `send` call is
//! reduced into a [`SendResult`].

use crate::domain::outcome::SuppressReason;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one channel delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelResult {
    /// Whether the sink accepted the event
    pub success: bool,
    /// Diagnostic carried through for observability
    pub message: Option<String>,
}

impl ChannelResult {
    /// Successful delivery without a message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Failed delivery with a diagnostic message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Attach or replace the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Status of a dispatch or of a whole send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// Every channel succeeded
    Sent,
    /// Some channels succeeded
    Partial,
    /// No channel succeeded
    Failed,
    /// A policy dropped the event before fan-out
    Suppressed,
}

impl DispatchStatus {
    /// Classify a fan-out by how many channels succeeded.
    ///
    /// All succeeded is `Sent` (including the degenerate zero-channel case),
    /// none succeeded is `Failed`, anything in between is `Partial`.
    pub fn classify(succeeded: usize, total: usize) -> Self {
        if succeeded == total {
            DispatchStatus::Sent
        } else if succeeded == 0 {
            DispatchStatus::Failed
        } else {
            DispatchStatus::Partial
        }
    }

    /// Reduce many dispatch statuses into one.
    ///
    /// `Failed` dominates, then `Partial`; otherwise `Sent`.
    pub fn reduce<'a>(statuses: impl IntoIterator<Item = &'a DispatchStatus>) -> Self {
        let mut any_partial = false;
        for status in statuses {
            match status {
                DispatchStatus::Failed => return DispatchStatus::Failed,
                DispatchStatus::Partial => any_partial = true,
                DispatchStatus::Sent | DispatchStatus::Suppressed => {}
            }
        }
        if any_partial {
            DispatchStatus::Partial
        } else {
            DispatchStatus::Sent
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Sent => "sent",
            DispatchStatus::Partial => "partial",
            DispatchStatus::Failed => "failed",
            DispatchStatus::Suppressed => "suppressed",
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one event: either a classified fan-out or a suppression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    /// Key of the dispatched (or suppressed) event
    pub event_key: String,
    /// Classified status
    pub status: DispatchStatus,
    /// Per-channel results keyed by channel name
    pub channel_results: BTreeMap<String, ChannelResult>,
    /// Suppression reason when `status` is `Suppressed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SuppressReason>,
}

impl DispatchResult {
    /// Build a result from per-channel outcomes, classifying the status.
    pub fn from_channel_results(
        event_key: impl Into<String>,
        channel_results: BTreeMap<String, ChannelResult>,
    ) -> Self {
        let succeeded = channel_results.values().filter(|r| r.success).count();
        let status = DispatchStatus::classify(succeeded, channel_results.len());
        Self {
            event_key: event_key.into(),
            status,
            channel_results,
            reason: None,
        }
    }

    /// Result for an event a policy dropped; no channel was invoked.
    pub fn suppressed(event_key: impl Into<String>, reason: SuppressReason) -> Self {
        Self {
            event_key: event_key.into(),
            status: DispatchStatus::Suppressed,
            channel_results: BTreeMap::new(),
            reason: Some(reason),
        }
    }

    /// Number of channels that accepted the event.
    pub fn succeeded(&self) -> usize {
        self.channel_results.values().filter(|r| r.success).count()
    }
}

/// Everything that happened during one `send` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    /// Overall status
    pub status: DispatchStatus,
    /// Flush dispatches first, then the live event's result
    pub results: Vec<DispatchResult>,
}

impl SendResult {
    /// Reduce a list of dispatches into an overall result.
    pub fn from_dispatches(results: Vec<DispatchResult>) -> Self {
        let status = DispatchStatus::reduce(results.iter().map(|r| &r.status));
        Self { status, results }
    }

    /// The live event was suppressed; earlier flush dispatches are kept.
    pub fn suppressed(results: Vec<DispatchResult>) -> Self {
        Self {
            status: DispatchStatus::Suppressed,
            results,
        }
    }

    /// Check if the overall status is `Suppressed`.
    pub fn is_suppressed(&self) -> bool {
        self.status == DispatchStatus::Suppressed
    }

    /// The result for the live event (always the last entry).
    pub fn live(&self) -> Option<&DispatchResult> {
        self.results.last()
    }
}
