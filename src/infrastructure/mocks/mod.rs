//! Mock implementations for testing.
//!
//! This module provides test doubles for the clock, delivery channels and
//! log capture, enabling controlled testing of dispatch behavior.

pub mod channel;
pub mod clock;
pub mod layer;

pub use channel::{MockBehavior, MockChannel};
pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
