// src/lib.rs

//! Zif package store library
//!
//! Queries installed packages and configured repositories as one set, with
//! progress reported through a tree of completion nodes.
//!
//! # Architecture
//!
//! - Stores: each package source implements [`Store`]; unsupported
//!   operations fail with [`Error::NotSupported`]
//! - Sack: fans an operation out over its stores, one progress step each
//! - Repos: lazily parses repository files, invalidated by file watches
//! - Completion: nested progress, child percentages scaled into the parent

pub mod cancel;
pub mod config;
mod error;
pub mod keyfile;
pub mod monitor;
pub mod package;
pub mod progress;
pub mod repos;
pub mod sack;
pub mod shared;
pub mod store;
pub mod version;

pub use cancel::Cancellable;
pub use config::Config;
pub use error::{Error, Result, UsageError};
pub use package::{Category, Package, PackageId};
pub use progress::{
    CallbackObserver, Completion, LogObserver, ProgressEvent, ProgressObserver, SubscriptionId,
};
pub use repos::Repos;
pub use sack::{Query, QueryOutput, Sack};
pub use store::{LocalStore, Operation, RemoteStore, Store};
