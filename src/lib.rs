//! Wolkenbase - out-of-core storage and tile scanning for LIDAR point clouds
//!
//! The storage engine lives in `wolkenbase-core`; this crate adds the
//! coordinator that walks a point source through ingest, scan and flush, and
//! a few synthetic scenes to feed it.
#![warn(missing_docs)]

// Configure global allocator
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

pub mod runner;
pub mod scenes;

pub use runner::{run, run_with_probe, RunReport};
pub use wolkenbase_core::{Config, Engine, Error, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install the tracing subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::config(format!("Invalid log level {}: {}", level, e)))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::internal(format!("Tracing already initialised: {}", e)))?;
    tracing::info!("Initializing {} v{}", NAME, VERSION);
    Ok(())
}
