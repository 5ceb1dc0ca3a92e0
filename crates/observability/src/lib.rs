//! Tracing and logging setup shared by storefront binaries.

pub mod config;
pub mod subscriber;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityError};
pub use subscriber::{init, init_with};
