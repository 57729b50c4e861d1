//! Configuration management for DRF Rust.
//!
//! [`ForestConfig`] carries every parameter the data-distribution and split
//! engines consume. It can be built programmatically through
//! [`ForestConfigBuilder`] or loaded from a `.toml` / `.json` file.

pub mod core;

pub use self::core::{ForestConfig, ForestConfigBuilder, StratumOverride};
