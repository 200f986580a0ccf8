// src/sack.rs

//! Store aggregation
//!
//! A [`Sack`] runs one operation against every store it holds, in the order
//! the stores were added, and merges the results. The root [`Completion`]
//! gets one step per store and each store reports through its own child
//! node.
//!
//! Failure policy depends on the operation:
//!
//! - queries, `load` and `clean` stop at the first failing store and return
//!   that error, wrapped with the store id and operation; results gathered
//!   so far are dropped
//! - queries and `load` on an empty sack fail with
//!   [`Error::EmptyStoreSet`]; `clean` and `refresh` have nothing to do and
//!   succeed
//! - `refresh` logs a failing store and carries on with the next one
//! - `find_package` treats a failing store like one without the package
//!
//! `search_category` and `get_categories` drop duplicate entries, keeping
//! the first one seen.

use crate::cancel::Cancellable;
use crate::error::{Error, Result};
use crate::package::{Category, Package, PackageId};
use crate::progress::Completion;
use crate::repos::Repos;
use crate::store::{LocalStore, Operation, Store};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One sack operation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Load,
    Clean,
    Refresh { force: bool },
    Resolve(String),
    SearchName(String),
    SearchDetails(String),
    SearchGroup(String),
    SearchCategory(String),
    SearchFile(String),
    WhatProvides(String),
    GetPackages,
    GetUpdates,
    GetCategories,
    FindPackage(PackageId),
}

impl Query {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Load => Operation::Load,
            Self::Clean => Operation::Clean,
            Self::Refresh { .. } => Operation::Refresh,
            Self::Resolve(_) => Operation::Resolve,
            Self::SearchName(_) => Operation::SearchName,
            Self::SearchDetails(_) => Operation::SearchDetails,
            Self::SearchGroup(_) => Operation::SearchGroup,
            Self::SearchCategory(_) => Operation::SearchCategory,
            Self::SearchFile(_) => Operation::SearchFile,
            Self::WhatProvides(_) => Operation::WhatProvides,
            Self::GetPackages => Operation::GetPackages,
            Self::GetUpdates => Operation::GetUpdates,
            Self::GetCategories => Operation::GetCategories,
            Self::FindPackage(_) => Operation::FindPackage,
        }
    }
}

/// Result of [`Sack::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutput {
    Packages(Vec<Package>),
    Categories(Vec<Category>),
    Package(Option<Package>),
    /// Maintenance operation completed
    Done,
}

/// Ordered collection of stores queried as one
#[derive(Clone, Default)]
pub struct Sack {
    stores: Vec<Arc<dyn Store>>,
}

impl fmt::Debug for Sack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.stores.iter().map(|s| s.id()).collect();
        f.debug_struct("Sack").field("stores", &ids).finish()
    }
}

impl Sack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sack holding `stores`, in order
    pub fn with_stores(stores: impl IntoIterator<Item = Arc<dyn Store>>) -> Self {
        let mut sack = Self::new();
        sack.add_stores(stores);
        sack
    }

    pub fn add_store(&mut self, store: Arc<dyn Store>) {
        debug!("adding store {} to sack", store.id());
        self.stores.push(store);
    }

    pub fn add_stores(&mut self, stores: impl IntoIterator<Item = Arc<dyn Store>>) {
        for store in stores {
            self.add_store(store);
        }
    }

    /// Add the shared installed-package store
    pub fn add_local(&mut self, installed_db: &Path) -> Result<()> {
        let store: Arc<dyn Store> = LocalStore::shared(installed_db)?;
        self.add_store(store);
        Ok(())
    }

    /// Add every configured repository
    pub fn add_remote(&mut self, repos: &Repos, completion: &Completion) -> Result<()> {
        let stores = repos.get_stores(completion)?;
        self.add_stores(stores.into_iter().map(|s| s as Arc<dyn Store>));
        Ok(())
    }

    /// Add the enabled repositories only
    pub fn add_remote_enabled(&mut self, repos: &Repos, completion: &Completion) -> Result<()> {
        let stores = repos.get_stores_enabled(completion)?;
        self.add_stores(stores.into_iter().map(|s| s as Arc<dyn Store>));
        Ok(())
    }

    pub fn stores(&self) -> &[Arc<dyn Store>] {
        &self.stores
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Declare one step per store, refusing an empty sack
    fn begin(&self, completion: &Completion) -> Result<()> {
        if self.stores.is_empty() {
            return Err(Error::EmptyStoreSet);
        }
        completion.set_total_steps(self.stores.len() as u32)
    }

    /// Run `call` on each store in turn, stopping at the first failure
    fn for_each_store<F>(&self, operation: Operation, completion: &Completion, mut call: F) -> Result<()>
    where
        F: FnMut(&dyn Store, &Completion) -> Result<()>,
    {
        self.begin(completion)?;
        for store in &self.stores {
            let child = completion.get_child()?;
            call(store.as_ref(), &child).map_err(|e| Error::store_failed(store.id(), operation, e))?;
            completion.step_done()?;
        }
        Ok(())
    }

    /// Concatenate every store's results in store order
    fn collect<T, F>(&self, operation: Operation, completion: &Completion, call: F) -> Result<Vec<T>>
    where
        F: Fn(&dyn Store, &Completion) -> Result<Vec<T>>,
    {
        let mut results = Vec::new();
        self.for_each_store(operation, completion, |store, child| {
            results.extend(call(store, child)?);
            Ok(())
        })?;
        Ok(results)
    }

    /// Load every store
    pub fn load(&self, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        self.for_each_store(Operation::Load, completion, |store, child| {
            store.load(cancellable, child)
        })
    }

    /// Clean every store
    ///
    /// An empty sack has nothing to clean and succeeds.
    pub fn clean(&self, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        if self.stores.is_empty() {
            debug!("nothing to clean, no stores in sack");
            return Ok(());
        }
        self.for_each_store(Operation::Clean, completion, |store, child| {
            store.clean(cancellable, child)
        })
    }

    /// Refresh every store
    ///
    /// A store failing to refresh is logged and skipped; the sack still
    /// reaches 100%. Cancellation is the exception and stops the run. An
    /// empty sack has nothing to refresh and succeeds.
    pub fn refresh(&self, force: bool, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        if self.stores.is_empty() {
            debug!("nothing to refresh, no stores in sack");
            return Ok(());
        }
        self.begin(completion)?;
        let mut failed = 0;
        for store in &self.stores {
            let child = completion.get_child()?;
            match store.refresh(force, cancellable, &child) {
                Ok(()) => {}
                Err(Error::Cancelled) => {
                    return Err(Error::store_failed(store.id(), Operation::Refresh, Error::Cancelled));
                }
                Err(e) => {
                    warn!("failed to refresh {}: {}", store.id(), e);
                    failed += 1;
                    child.reset();
                }
            }
            completion.step_done()?;
        }
        if failed > 0 {
            info!("refreshed {} of {} stores", self.stores.len() - failed, self.stores.len());
        }
        Ok(())
    }

    pub fn resolve(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::Resolve, completion, |store, child| {
            store.resolve(search, cancellable, child)
        })
    }

    pub fn search_name(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::SearchName, completion, |store, child| {
            store.search_name(search, cancellable, child)
        })
    }

    pub fn search_details(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::SearchDetails, completion, |store, child| {
            store.search_details(search, cancellable, child)
        })
    }

    pub fn search_group(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::SearchGroup, completion, |store, child| {
            store.search_group(search, cancellable, child)
        })
    }

    /// Packages in a category, duplicates (same name and version) removed
    pub fn search_category(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        let packages = self.collect(Operation::SearchCategory, completion, |store, child| {
            store.search_category(search, cancellable, child)
        })?;
        Ok(remove_duplicates(packages, Package::dedup_key))
    }

    pub fn search_file(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::SearchFile, completion, |store, child| {
            store.search_file(search, cancellable, child)
        })
    }

    /// Packages providing `search`; a path is looked up as a file
    pub fn what_provides(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        if search.starts_with('/') {
            return self.search_file(search, cancellable, completion);
        }
        self.collect(Operation::WhatProvides, completion, |store, child| {
            store.what_provides(search, cancellable, child)
        })
    }

    pub fn get_packages(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::GetPackages, completion, |store, child| {
            store.get_packages(cancellable, child)
        })
    }

    pub fn get_updates(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.collect(Operation::GetUpdates, completion, |store, child| {
            store.get_updates(cancellable, child)
        })
    }

    /// Categories from every store, duplicates (same parent and id) removed
    pub fn get_categories(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Category>> {
        let categories = self.collect(Operation::GetCategories, completion, |store, child| {
            store.get_categories(cancellable, child)
        })?;
        Ok(remove_duplicates(categories, Category::dedup_key))
    }

    /// First package matching `id`, searching stores in order
    ///
    /// Store errors count as "not in this store". An empty sack has no
    /// package to find.
    pub fn find_package(&self, id: &PackageId, cancellable: &Cancellable, completion: &Completion) -> Result<Option<Package>> {
        if self.stores.is_empty() {
            return Ok(None);
        }
        completion.set_total_steps(self.stores.len() as u32)?;
        for store in &self.stores {
            let child = completion.get_child()?;
            let found = match store.find_package(id, cancellable, &child) {
                Ok(found) => found,
                Err(e) => {
                    debug!("find {} in {} failed: {}", id, store.id(), e);
                    child.reset();
                    None
                }
            };
            completion.step_done()?;
            if found.is_some() {
                completion.finish();
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Run `query`
    pub fn execute(&self, query: &Query, cancellable: &Cancellable, completion: &Completion) -> Result<QueryOutput> {
        let output = match query {
            Query::Load => {
                self.load(cancellable, completion)?;
                QueryOutput::Done
            }
            Query::Clean => {
                self.clean(cancellable, completion)?;
                QueryOutput::Done
            }
            Query::Refresh { force } => {
                self.refresh(*force, cancellable, completion)?;
                QueryOutput::Done
            }
            Query::Resolve(s) => QueryOutput::Packages(self.resolve(s, cancellable, completion)?),
            Query::SearchName(s) => QueryOutput::Packages(self.search_name(s, cancellable, completion)?),
            Query::SearchDetails(s) => QueryOutput::Packages(self.search_details(s, cancellable, completion)?),
            Query::SearchGroup(s) => QueryOutput::Packages(self.search_group(s, cancellable, completion)?),
            Query::SearchCategory(s) => QueryOutput::Packages(self.search_category(s, cancellable, completion)?),
            Query::SearchFile(s) => QueryOutput::Packages(self.search_file(s, cancellable, completion)?),
            Query::WhatProvides(s) => QueryOutput::Packages(self.what_provides(s, cancellable, completion)?),
            Query::GetPackages => QueryOutput::Packages(self.get_packages(cancellable, completion)?),
            Query::GetUpdates => QueryOutput::Packages(self.get_updates(cancellable, completion)?),
            Query::GetCategories => QueryOutput::Categories(self.get_categories(cancellable, completion)?),
            Query::FindPackage(id) => QueryOutput::Package(self.find_package(id, cancellable, completion)?),
        };
        Ok(output)
    }
}

/// Keep the first item for each key
fn remove_duplicates<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash + fmt::Debug,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = key(item);
            if seen.contains(&key) {
                debug!("ignoring duplicate {:?}", key);
                return false;
            }
            seen.insert(key);
            true
        })
        .collect()
}
