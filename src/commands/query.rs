// src/commands/query.rs
//! Package query and repository maintenance commands

use super::{load_config, progress_bar};
use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use zif::{
    Cancellable, Category, Completion, Config, LocalStore, Package, Query, QueryOutput, Repos,
    Sack, Store,
};

/// Whether a query only makes sense for repositories
fn repositories_only(query: &Query) -> bool {
    matches!(
        query,
        Query::Clean | Query::Refresh { .. } | Query::GetUpdates | Query::GetCategories
    )
}

/// Sack of the stores a query should see
fn build_sack(global: &GlobalArgs, config: &Config, query: &Query, completion: &Completion) -> Result<Sack> {
    let mut repos = Repos::open(config.clone())?;
    if matches!(query, Query::GetUpdates) {
        let installed: Arc<dyn Store> = LocalStore::shared(&config.installed_db)
            .with_context(|| format!("failed to open {}", config.installed_db.display()))?;
        repos = repos.with_installed(installed);
    }

    let mut sack = Sack::new();
    if !global.no_local && !repositories_only(query) {
        sack.add_local(&config.installed_db)
            .with_context(|| format!("failed to open {}", config.installed_db.display()))?;
    }
    sack.add_remote_enabled(&repos, completion)?;
    info!("querying {} stores", sack.len());
    Ok(sack)
}

/// Run one sack operation and print its result
pub fn cmd_query(global: &GlobalArgs, query: Query) -> Result<()> {
    let config = load_config(global)?;
    let operation = query.operation();

    let bar = progress_bar(global, operation.name());
    let root = Completion::new();
    root.subscribe(bar.clone());

    // first step loads the repositories, second runs the query
    root.set_total_steps(2)?;
    let sack = build_sack(global, &config, &query, &root.get_child()?)?;
    root.step_done()?;

    let cancellable = Cancellable::new();
    let output = sack.execute(&query, &cancellable, &root.get_child()?)?;
    root.step_done()?;
    bar.finish();

    print_output(global, output)
}

fn print_output(global: &GlobalArgs, output: QueryOutput) -> Result<()> {
    match output {
        QueryOutput::Packages(packages) => print_packages(global, &packages),
        QueryOutput::Categories(categories) => print_categories(global, &categories),
        QueryOutput::Package(package) => {
            if global.json {
                println!("{}", serde_json::to_string_pretty(&package)?);
            } else if let Some(package) = package {
                print_package_details(&package);
            } else {
                println!("Package not found.");
            }
            Ok(())
        }
        QueryOutput::Done => {
            if !global.json {
                println!("Done.");
            }
            Ok(())
        }
    }
}

fn print_packages(global: &GlobalArgs, packages: &[Package]) -> Result<()> {
    if global.json {
        println!("{}", serde_json::to_string_pretty(packages)?);
        return Ok(());
    }

    if packages.is_empty() {
        println!("No packages found.");
        return Ok(());
    }
    for package in packages {
        print!("  {}", package.id());
        if !package.summary.is_empty() {
            print!("\t{}", package.summary);
        }
        println!();
    }
    println!("\nTotal: {} package(s)", packages.len());
    Ok(())
}

fn print_package_details(package: &Package) {
    println!("Package: {}", package.id());
    println!("  Name: {}", package.name);
    println!("  Version: {}", package.version);
    println!("  Arch: {}", package.arch);
    println!("  Repository: {}", package.data);
    if !package.summary.is_empty() {
        println!("  Summary: {}", package.summary);
    }
    if let Some(group) = &package.group {
        println!("  Group: {}", group);
    }
    if !package.description.is_empty() {
        println!("  Description: {}", package.description);
    }
    if !package.files.is_empty() {
        println!("  Files: {}", package.files.len());
    }
}

fn print_categories(global: &GlobalArgs, categories: &[Category]) -> Result<()> {
    if global.json {
        println!("{}", serde_json::to_string_pretty(categories)?);
        return Ok(());
    }

    if categories.is_empty() {
        println!("No categories found.");
        return Ok(());
    }
    for category in categories {
        match &category.parent_id {
            Some(parent) => println!("  {}/{}\t{}", parent, category.id, category.name),
            None => println!("  {}\t{}", category.id, category.name),
        }
    }
    Ok(())
}
