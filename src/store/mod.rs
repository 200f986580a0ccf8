// src/store/mod.rs

//! Package stores
//!
//! A [`Store`] is one queryable package source: the installed-package
//! database ([`LocalStore`]) or a configured repository ([`RemoteStore`]).
//! Every capability has a default implementation that fails with
//! [`Error::NotSupported`], so a store only implements what it can do.
//!
//! Each operation receives a [`Cancellable`] and a [`Completion`] child
//! node. A store that declares steps on the node must complete them (or
//! call [`Completion::finish`]) before returning successfully.

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::{RemoteSettings, RemoteStore};

use crate::cancel::Cancellable;
use crate::error::{Error, Result};
use crate::package::{Category, Package, PackageId};
use crate::progress::Completion;
use std::fmt;

/// Operations a store may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Clean,
    Refresh,
    SearchName,
    SearchDetails,
    SearchGroup,
    SearchCategory,
    SearchFile,
    Resolve,
    WhatProvides,
    GetPackages,
    GetUpdates,
    FindPackage,
    GetCategories,
}

impl Operation {
    /// Get the kebab-case name used in messages and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Clean => "clean",
            Self::Refresh => "refresh",
            Self::SearchName => "search-name",
            Self::SearchDetails => "search-details",
            Self::SearchGroup => "search-group",
            Self::SearchCategory => "search-category",
            Self::SearchFile => "search-file",
            Self::Resolve => "resolve",
            Self::WhatProvides => "what-provides",
            Self::GetPackages => "get-packages",
            Self::GetUpdates => "get-updates",
            Self::FindPackage => "find-package",
            Self::GetCategories => "get-categories",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A queryable package source
///
/// Stores are shared between the sack and the repository registry, so all
/// methods take `&self`; implementations use interior mutability for any
/// cached state.
pub trait Store: Send + Sync {
    /// Unique store identifier (repository id, or `installed`)
    fn id(&self) -> &str;

    /// Error for an operation this store does not implement
    fn not_supported(&self, operation: Operation) -> Error {
        Error::NotSupported {
            store: self.id().to_string(),
            operation,
        }
    }

    /// Load the store's data so queries can run
    fn load(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<()> {
        Err(self.not_supported(Operation::Load))
    }

    /// Delete any cached data
    fn clean(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<()> {
        Err(self.not_supported(Operation::Clean))
    }

    /// Download fresh data, unless still valid and `force` is false
    fn refresh(&self, _force: bool, _cancellable: &Cancellable, _completion: &Completion) -> Result<()> {
        Err(self.not_supported(Operation::Refresh))
    }

    /// Packages whose name contains `search`
    fn search_name(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::SearchName))
    }

    /// Packages whose name, summary or description contains `search`
    fn search_details(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::SearchDetails))
    }

    /// Packages in the group `search`
    fn search_group(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::SearchGroup))
    }

    /// Packages in the category `search`
    fn search_category(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::SearchCategory))
    }

    /// Packages owning the file `search`
    fn search_file(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::SearchFile))
    }

    /// Packages named exactly `search`
    fn resolve(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::Resolve))
    }

    /// Packages providing `search`
    fn what_provides(&self, _search: &str, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::WhatProvides))
    }

    /// Every package in the store
    fn get_packages(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::GetPackages))
    }

    /// Packages that update installed packages
    fn get_updates(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::GetUpdates))
    }

    /// The package with the given id, if this store has it
    fn find_package(&self, _id: &PackageId, _cancellable: &Cancellable, _completion: &Completion) -> Result<Option<Package>> {
        Err(self.not_supported(Operation::FindPackage))
    }

    /// Categories known to this store
    fn get_categories(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Category>> {
        Err(self.not_supported(Operation::GetCategories))
    }
}

impl fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("id", &self.id()).finish()
    }
}
