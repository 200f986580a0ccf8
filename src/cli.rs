// src/cli.rs
// Command-line definitions for zif.
//
// Only clap and std are used here; build.rs includes this file to render
// the man page.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zif")]
#[command(author = "Zif Contributors")]
#[command(version)]
#[command(about = "Query installed packages and configured repositories", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "/etc/zif/zif.toml")]
    pub config: PathBuf,

    /// Repository directory (overrides the configuration file)
    #[arg(long, global = true)]
    pub repos_dir: Option<PathBuf>,

    /// Leave installed packages out of queries
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log warnings and errors, hide the progress bar
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find packages by exact name
    Resolve {
        /// Package name
        name: String,
    },

    /// Search package names
    SearchName {
        /// Text to look for in package names
        search: String,
    },

    /// Search package names, summaries and descriptions
    SearchDetails {
        /// Text to look for
        search: String,
    },

    /// List packages in a group
    SearchGroup {
        /// Group name
        group: String,
    },

    /// List packages in a category
    SearchCategory {
        /// Category id
        category: String,
    },

    /// Find packages owning a file
    SearchFile {
        /// Absolute file path
        path: String,
    },

    /// Find packages providing a capability or file
    WhatProvides {
        /// Capability name, or a path starting with '/'
        what: String,
    },

    /// List every package
    GetPackages,

    /// List available updates for installed packages
    GetUpdates,

    /// List repository categories
    GetCategories,

    /// Look up one package by id
    FindPackage {
        /// Package id (name;version;arch;repo)
        package_id: String,
    },

    /// Remove cached repository metadata
    Clean,

    /// Download repository metadata
    Refresh {
        /// Download even if the cached metadata has not expired
        #[arg(short, long)]
        force: bool,
    },

    /// List configured repositories
    RepoList {
        /// Include disabled repositories
        #[arg(short, long)]
        all: bool,
    },
}
