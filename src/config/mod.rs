//! Compilation configuration
//!
//! Resolved from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Config file (`staticmap.toml`)
//! 3. Caller overrides (CLI flags)

mod compilation;
mod merge;

pub use compilation::{CompilationConfig, ConfigError};
pub use merge::{merge_into, merge_layers};
