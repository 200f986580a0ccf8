// src/commands/repo.rs
//! Repository listing

use super::load_config;
use crate::cli::GlobalArgs;
use anyhow::Result;
use serde::Serialize;
use tracing::info;
use zif::{Completion, Repos, Store};

#[derive(Serialize)]
struct RepoInfo<'a> {
    id: &'a str,
    name: &'a str,
    baseurl: &'a str,
    enabled: bool,
}

/// List repositories
pub fn cmd_repo_list(global: &GlobalArgs, all: bool) -> Result<()> {
    let config = load_config(global)?;
    info!("Listing repositories in {}", config.repos_dir.display());
    let repos = Repos::open(config)?;
    let completion = Completion::new();
    let stores = if all {
        repos.get_stores(&completion)?
    } else {
        repos.get_stores_enabled(&completion)?
    };

    let mut infos = Vec::with_capacity(stores.len());
    for store in &stores {
        infos.push(RepoInfo {
            id: store.id(),
            name: store.name(),
            baseurl: &store.settings().baseurl,
            enabled: store.enabled()?,
        });
    }

    if global.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if infos.is_empty() {
        println!("No repositories configured");
        return Ok(());
    }
    println!("Repositories:");
    for repo in &infos {
        let enabled_mark = if repo.enabled { "[x]" } else { "[ ]" };
        println!("  {} {} ({})", enabled_mark, repo.id, repo.name);
        println!("      {}", repo.baseurl);
    }
    Ok(())
}
