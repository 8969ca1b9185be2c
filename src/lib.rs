//! Rota Session - Sticky-Session Proxy Rotation
//!
//! Sits between a crawler's request pipeline and a pool of rotating proxy
//! endpoints.
//!
//! ## Features
//!
//! - Sticky sessions with a `create` sentinel for fresh endpoints
//! - Ban and connection-failure detection with automatic rotation
//! - Full-jitter linear or exponential backoff applied per download slot
//! - Host and transfer-encoding header fixes for the proxy service
//! - One-shot pool bootstrap from a provider URL

pub mod config;
pub mod error;
pub mod models;
pub mod probe;
pub mod proxy;

pub use config::{Config, RotationConfig};
pub use error::{Result, RotaError};
pub use proxy::{Outcome, RotationController, SessionMiddleware, SharedRotationController};
