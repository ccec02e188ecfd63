//! Shared plumbing for the indexer, ask and dashboard binaries.

pub mod dashboard;

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use reviewrag_core::config::{resolve_with_base, Settings};

/// `RUST_LOG` wins; otherwise `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Store directory from settings, resolved against the working directory.
pub fn db_dir(settings: &Settings) -> Result<PathBuf> {
    Ok(resolve_with_base(&std::env::current_dir()?, &settings.data.db_dir))
}

pub fn reviews_csv(settings: &Settings) -> Result<PathBuf> {
    Ok(resolve_with_base(&std::env::current_dir()?, &settings.data.reviews_csv))
}
