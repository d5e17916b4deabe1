//! Healer Configuration Module
//!
//! Backend address, lifecycle timers and retry budget loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config` CLI flag (handled by the binary)
//! 2. `CELL_HEALER_CONFIG` environment variable (path to TOML file)
//! 3. `healer.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The configuration is read once at startup and passed by value to the
//! components that need it. There is no process-wide config instance.

mod healer_config;
pub mod defaults;
pub mod validation;

pub use healer_config::*;
