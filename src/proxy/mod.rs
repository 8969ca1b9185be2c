//! Proxy rotation core
//!
//! This module provides the session rotation machinery:
//! - Cyclic endpoint pool with a random start offset
//! - Full-jitter backoff schedules
//! - Per-slot delay overrides
//! - Request header fixes for the proxy service
//! - Pool bootstrap from a provider URL
//! - The rotation controller tying them together

pub mod backoff;
pub mod controller;
pub mod headers;
pub mod overlay;
pub mod pool;
pub mod source;

pub use backoff::{Backoff, BackoffStrategy};
pub use controller::{
    Outcome, RotationController, RotationReason, SessionMiddleware, SharedRotationController,
};
pub use overlay::SlotDelayOverlay;
pub use pool::EndpointPool;
pub use source::{EndpointSource, HttpEndpointSource, StaticEndpointSource};
