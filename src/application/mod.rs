//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Policy chain (noise reduction over the shared store)
//! - Dispatcher (flush, apply, fan-out, status reduction)
//! - Background flusher (periodic delivery of aggregate summaries)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod dispatcher;
pub mod flusher;
pub mod metrics;
pub mod policies;
pub mod ports;
