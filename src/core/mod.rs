//! Core infrastructure module for DRF Rust.
//!
//! - [`types`]: fundamental data types and enumerations
//! - [`constants`]: system constants and configuration defaults
//! - [`error`]: error types and the crate-wide `Result`
//! - [`utils`]: seeded randomness and fork-join task batches

pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

pub use constants::*;
pub use error::{DrfError, Result};
pub use types::*;

/// Version information for the core module
pub const CORE_MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
/// Safe to call more than once.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("logging initialized");
    }
}
