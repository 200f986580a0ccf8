// src/store/local.rs

//! Installed-package store
//!
//! Installed packages live in a small SQLite database. The store answers
//! every query except the ones that only make sense for a repository
//! (`clean`, `refresh`, `get_updates`, `get_categories`).

use super::{Operation, Store};
use crate::cancel::Cancellable;
use crate::error::Result;
use crate::package::{Category, INSTALLED_DATA, Package, PackageId};
use crate::progress::Completion;
use crate::shared::SharedInstance;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

static SHARED: SharedInstance<LocalStore> = SharedInstance::new();

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS packages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        version TEXT NOT NULL,
        arch TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        grp TEXT,
        UNIQUE(name, version, arch)
    );
    CREATE INDEX IF NOT EXISTS idx_packages_name ON packages(name);

    CREATE TABLE IF NOT EXISTS files (
        package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
        path TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);

    CREATE TABLE IF NOT EXISTS provides (
        package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
        name TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_provides_name ON provides(name);

    CREATE TABLE IF NOT EXISTS categories (
        package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
        category TEXT NOT NULL
    );
";

const SELECT_PACKAGES: &str =
    "SELECT id, name, version, arch, summary, description, grp FROM packages";

/// Store of installed packages
pub struct LocalStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// In-memory database, used by tests and tools
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// The process-wide store, opening `path` if no instance is alive
    ///
    /// While any handle exists later calls return that same instance, even
    /// if they name a different path.
    pub fn shared(path: &Path) -> Result<Arc<Self>> {
        let store = SHARED.get_or_try_init(|| Self::open(path))?;
        if store.path.as_deref() != Some(path) {
            debug!(
                "installed store already open at {:?}, ignoring {}",
                store.path,
                path.display()
            );
        }
        Ok(store)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an installed package, replacing an existing row for the same
    /// name, version and arch
    pub fn add_package(&self, package: &Package) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM packages WHERE name = ?1 AND version = ?2 AND arch = ?3",
            params![package.name, package.version, package.arch],
        )?;
        tx.execute(
            "INSERT INTO packages (name, version, arch, summary, description, grp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                package.name,
                package.version,
                package.arch,
                package.summary,
                package.description,
                package.group,
            ],
        )?;
        let id = tx.last_insert_rowid();
        for path in &package.files {
            tx.execute("INSERT INTO files (package_id, path) VALUES (?1, ?2)", params![id, path])?;
        }
        for name in &package.provides {
            tx.execute("INSERT INTO provides (package_id, name) VALUES (?1, ?2)", params![id, name])?;
        }
        for category in &package.categories {
            tx.execute(
                "INSERT INTO categories (package_id, category) VALUES (?1, ?2)",
                params![id, category],
            )?;
        }
        tx.commit()?;
        debug!("recorded installed package {}", package.id());
        Ok(())
    }

    /// Number of installed packages
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_package(row: &Row) -> rusqlite::Result<(i64, Package)> {
        let id: i64 = row.get(0)?;
        let mut package = Package::new(
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            INSTALLED_DATA,
        );
        package.summary = row.get(4)?;
        package.description = row.get(5)?;
        package.group = row.get(6)?;
        Ok((id, package))
    }

    fn strings(conn: &Connection, sql: &str, id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let values = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(values)
    }

    /// Run a package query and attach files, provides and categories
    fn query(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Package>> {
        let conn = self.conn();
        let sql = format!("{} {} ORDER BY id", SELECT_PACKAGES, filter);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, Self::row_to_package)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut packages = Vec::with_capacity(rows.len());
        for (id, mut package) in rows {
            package.files = Self::strings(&conn, "SELECT path FROM files WHERE package_id = ?1", id)?;
            package.provides =
                Self::strings(&conn, "SELECT name FROM provides WHERE package_id = ?1", id)?;
            package.categories = Self::strings(
                &conn,
                "SELECT category FROM categories WHERE package_id = ?1",
                id,
            )?;
            packages.push(package);
        }
        Ok(packages)
    }

    fn run(
        &self,
        cancellable: &Cancellable,
        completion: &Completion,
        filter: &str,
        args: &[&dyn ToSql],
    ) -> Result<Vec<Package>> {
        cancellable.check()?;
        let packages = self.query(filter, args)?;
        completion.finish();
        Ok(packages)
    }

    /// Filter with a `Package` predicate; SQLite `lower()` only folds ASCII
    fn run_matching<F>(
        &self,
        cancellable: &Cancellable,
        completion: &Completion,
        predicate: F,
    ) -> Result<Vec<Package>>
    where
        F: Fn(&Package) -> bool,
    {
        cancellable.check()?;
        let mut packages = self.query("", &[])?;
        packages.retain(|p| predicate(p));
        completion.finish();
        Ok(packages)
    }
}

impl Store for LocalStore {
    fn id(&self) -> &str {
        INSTALLED_DATA
    }

    fn load(&self, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        cancellable.check()?;
        let count = self.count()?;
        info!("installed store has {} packages", count);
        completion.finish();
        Ok(())
    }

    fn search_name(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run_matching(cancellable, completion, |p| p.name_contains(search))
    }

    fn search_details(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run_matching(cancellable, completion, |p| p.details_contain(search))
    }

    fn search_group(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run(cancellable, completion, "WHERE grp = ?1", &[&search])
    }

    fn search_category(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run(
            cancellable,
            completion,
            "WHERE id IN (SELECT package_id FROM categories WHERE category = ?1)",
            &[&search],
        )
    }

    fn search_file(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run(
            cancellable,
            completion,
            "WHERE id IN (SELECT package_id FROM files WHERE path = ?1)",
            &[&search],
        )
    }

    fn resolve(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run(cancellable, completion, "WHERE name = ?1", &[&search])
    }

    fn what_provides(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run(
            cancellable,
            completion,
            "WHERE name = ?1 OR id IN (SELECT package_id FROM provides WHERE name = ?1)",
            &[&search],
        )
    }

    fn get_packages(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.run(cancellable, completion, "", &[])
    }

    fn get_updates(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Package>> {
        Err(self.not_supported(Operation::GetUpdates))
    }

    fn find_package(&self, id: &PackageId, cancellable: &Cancellable, completion: &Completion) -> Result<Option<Package>> {
        cancellable.check()?;
        if id.data != INSTALLED_DATA {
            completion.finish();
            return Ok(None);
        }
        let row = self
            .conn()
            .query_row(
                "SELECT id FROM packages WHERE name = ?1 AND version = ?2 AND arch = ?3",
                params![id.name, id.version, id.arch],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let package = match row {
            Some(row_id) => self.query("WHERE id = ?1", &[&row_id])?.into_iter().next(),
            None => None,
        };
        completion.finish();
        Ok(package)
    }

    fn get_categories(&self, _cancellable: &Cancellable, _completion: &Completion) -> Result<Vec<Category>> {
        Err(self.not_supported(Operation::GetCategories))
    }
}
