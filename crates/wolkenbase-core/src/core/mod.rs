//! Core of Wolkenbase: configuration, logging and the engine aggregate

/// Configuration sections and loading
pub mod config;
/// The engine aggregate
pub mod engine;
/// Logging macros
pub mod logging;

pub use config::{load_config, load_config_or_default, Config};
pub use engine::Engine;
