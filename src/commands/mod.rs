// src/commands/mod.rs
//! Command handlers for the zif CLI

mod progress;
mod query;
mod repo;

pub use query::cmd_query;
pub use repo::cmd_repo_list;

use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use progress::BarProgress;
use std::sync::Arc;
use zif::Config;

/// Read the configuration file, applying command-line overrides
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = Config::load_or_default(&global.config)
        .with_context(|| format!("failed to load {}", global.config.display()))?;
    if let Some(dir) = &global.repos_dir {
        config.repos_dir = dir.clone();
    }
    Ok(config)
}

/// Progress bar for an operation, hidden when output must stay clean
fn progress_bar(global: &GlobalArgs, label: &str) -> Arc<BarProgress> {
    if global.quiet || global.json {
        BarProgress::hidden(label)
    } else {
        BarProgress::new(label)
    }
}
