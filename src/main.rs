// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use zif::{PackageId, Query};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.global.quiet {
        "warn"
    } else if cli.global.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let global = cli.global;
    let query = match cli.command {
        Commands::RepoList { all } => return commands::cmd_repo_list(&global, all),
        Commands::Resolve { name } => Query::Resolve(name),
        Commands::SearchName { search } => Query::SearchName(search),
        Commands::SearchDetails { search } => Query::SearchDetails(search),
        Commands::SearchGroup { group } => Query::SearchGroup(group),
        Commands::SearchCategory { category } => Query::SearchCategory(category),
        Commands::SearchFile { path } => Query::SearchFile(path),
        Commands::WhatProvides { what } => Query::WhatProvides(what),
        Commands::GetPackages => Query::GetPackages,
        Commands::GetUpdates => Query::GetUpdates,
        Commands::GetCategories => Query::GetCategories,
        Commands::FindPackage { package_id } => Query::FindPackage(package_id.parse::<PackageId>()?),
        Commands::Clean => Query::Clean,
        Commands::Refresh { force } => Query::Refresh { force },
    };
    commands::cmd_query(&global, query)
}
