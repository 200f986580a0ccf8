// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zif::{
    Cancellable, Category, Completion, Config, Error, Operation, Package, PackageId, Result, Store,
};

/// Store with canned answers that records every call
///
/// Each answered call declares `steps` steps on its completion node and
/// completes them. A scripted failure completes one step and then fails,
/// leaving the node half done.
pub struct FakeStore {
    id: String,
    packages: Vec<Package>,
    categories: Vec<Category>,
    failing: Vec<Operation>,
    steps: u32,
    calls: Mutex<Vec<Operation>>,
}

impl FakeStore {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            packages: Vec::new(),
            categories: Vec::new(),
            failing: Vec::new(),
            steps: 2,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add packages by name, all at version 1.0
    pub fn with_packages(mut self, names: &[&str]) -> Self {
        for name in names {
            self.packages.push(Package::new(*name, "1.0", "noarch", self.id.as_str()));
        }
        self
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_category(mut self, parent: Option<&str>, id: &str) -> Self {
        self.categories.push(Category::new(parent, id, id));
        self
    }

    /// Make `operation` fail
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failing.push(operation);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Operations called so far, in order
    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, operation: Operation, completion: &Completion) -> Result<()> {
        self.calls.lock().unwrap().push(operation);
        completion.set_total_steps(self.steps)?;
        completion.step_done()?;
        if self.failing.contains(&operation) {
            return Err(Error::Download(format!("{} unreachable", self.id)));
        }
        for _ in 1..self.steps {
            completion.step_done()?;
        }
        Ok(())
    }

    fn packages_where(
        &self,
        operation: Operation,
        completion: &Completion,
        predicate: impl Fn(&Package) -> bool,
    ) -> Result<Vec<Package>> {
        self.answer(operation, completion)?;
        Ok(self.packages.iter().filter(|p| predicate(p)).cloned().collect())
    }
}

impl Store for FakeStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self, _: &Cancellable, completion: &Completion) -> Result<()> {
        self.answer(Operation::Load, completion)
    }

    fn clean(&self, _: &Cancellable, completion: &Completion) -> Result<()> {
        self.answer(Operation::Clean, completion)
    }

    fn refresh(&self, _force: bool, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        cancellable.check()?;
        self.answer(Operation::Refresh, completion)
    }

    fn search_name(&self, search: &str, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.packages_where(Operation::SearchName, completion, |p| p.name_contains(search))
    }

    fn search_details(&self, search: &str, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.packages_where(Operation::SearchDetails, completion, |p| p.details_contain(search))
    }

    fn search_category(&self, _search: &str, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        // every package counts as being in the category
        self.packages_where(Operation::SearchCategory, completion, |_| true)
    }

    fn search_file(&self, search: &str, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.packages_where(Operation::SearchFile, completion, |p| p.has_file(search))
    }

    fn resolve(&self, search: &str, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.packages_where(Operation::Resolve, completion, |p| p.name == search)
    }

    fn what_provides(&self, search: &str, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.packages_where(Operation::WhatProvides, completion, |p| p.provides(search))
    }

    fn get_packages(&self, _: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.packages_where(Operation::GetPackages, completion, |_| true)
    }

    fn find_package(&self, id: &PackageId, _: &Cancellable, completion: &Completion) -> Result<Option<Package>> {
        self.answer(Operation::FindPackage, completion)?;
        Ok(self.packages.iter().find(|p| id.matches(p)).cloned())
    }

    fn get_categories(&self, _: &Cancellable, completion: &Completion) -> Result<Vec<Category>> {
        self.answer(Operation::GetCategories, completion)?;
        Ok(self.categories.clone())
    }
}

/// Names of `packages`, in order
pub fn names(packages: &[Package]) -> Vec<&str> {
    packages.iter().map(|p| p.name.as_str()).collect()
}

/// Temporary repository directory with a matching configuration
///
/// Returns (TempDir, Config) - keep the TempDir alive to prevent cleanup.
pub fn setup_repos_dir() -> (TempDir, Config) {
    let temp_dir = tempfile::tempdir().unwrap();
    let repos_dir = temp_dir.path().join("yum.repos.d");
    fs::create_dir_all(&repos_dir).unwrap();

    let config = Config {
        repos_dir,
        cache_dir: temp_dir.path().join("cache"),
        installed_db: temp_dir.path().join("installed.db"),
        releasever: Some("11".to_string()),
        basearch: "i386".to_string(),
        ..Config::default()
    };
    (temp_dir, config)
}

/// Write a repository file into the configured directory
pub fn write_repo(config: &Config, file_name: &str, content: &str) -> PathBuf {
    let path = config.repos_dir.join(file_name);
    fs::write(&path, content).unwrap();
    path
}

/// Create an upstream repository holding `metadata` under `root`
pub fn write_upstream(root: &Path, name: &str, metadata: &str) -> PathBuf {
    let dir = root.join("upstream").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("repomd.json"), metadata).unwrap();
    dir
}
