//! Domain layer - pure data with no knowledge of storage or delivery.
//!
//! This layer contains the values that flow through the pipeline:
//! - The canonical notification event and its level
//! - Policy outcomes and suppression reasons
//! - Channel, dispatch and send results with their status arithmetic
//!
//! All types in this layer are pure and easily testable.

pub mod event;
pub mod outcome;
pub mod result;
