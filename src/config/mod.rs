//! Configuration module for the feed connector
//!
//! This module provides the `ConnectorConfig` struct and its type-safe builder
//! for configuring connections with validation and sensible defaults.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{ConnectorConfigBuilder, WithEmail};
pub use types::{ConnectorConfig, RobotsUsage};
