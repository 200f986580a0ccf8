// src/repos.rs

//! Repository registry
//!
//! [`Repos`] owns the [`RemoteStore`]s described by the repository files in
//! one directory. Nothing is read until a store is asked for; the first
//! accessor scans the directory, parses every repository file and works
//! out which repositories are enabled. The result is cached until a watched
//! file or the directory itself changes.
//!
//! The watch callback never touches the cached lists. It sends a
//! [`MonitorEvent`] over a channel and every accessor drains that channel
//! under the state lock before reading, so an invalidation can never race
//! with a load in progress.

use crate::config::Config;
use crate::error::{Error, Result, UsageError};
use crate::keyfile::KeyFile;
use crate::monitor::{Monitor, MonitorEvent};
use crate::progress::Completion;
use crate::shared::SharedInstance;
use crate::store::{RemoteStore, Store};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

static SHARED: SharedInstance<Repos> = SharedInstance::new();

struct State {
    repos_dir: Option<PathBuf>,
    loaded: bool,
    /// Number of completed directory scans
    loads: u64,
    stores: Vec<Arc<RemoteStore>>,
    enabled: Vec<Arc<RemoteStore>>,
    monitor: Option<Monitor>,
    events: Receiver<MonitorEvent>,
}

/// Registry of configured repositories
pub struct Repos {
    config: Config,
    installed: Option<Arc<dyn Store>>,
    sender: Sender<MonitorEvent>,
    state: Mutex<State>,
}

impl Repos {
    /// Create a registry with no repository directory set
    pub fn new(config: Config) -> Self {
        let (sender, events) = mpsc::channel();
        Self {
            config,
            installed: None,
            sender,
            state: Mutex::new(State {
                repos_dir: None,
                loaded: false,
                loads: 0,
                stores: Vec::new(),
                enabled: Vec::new(),
                monitor: None,
                events,
            }),
        }
    }

    /// Create a registry reading `config.repos_dir`
    pub fn open(config: Config) -> Result<Self> {
        let repos_dir = config.repos_dir.clone();
        let repos = Self::new(config);
        repos.set_repos_dir(repos_dir)?;
        Ok(repos)
    }

    /// The process-wide registry, created from `config` if none is alive
    pub fn shared(config: &Config) -> Result<Arc<Self>> {
        SHARED.get_or_try_init(|| Self::open(config.clone()))
    }

    /// Installed-package store handed to every repository for `get_updates`
    pub fn with_installed(mut self, store: Arc<dyn Store>) -> Self {
        self.installed = Some(store);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Self::drain(&mut state);
        state
    }

    /// Apply queued change notifications
    fn drain(state: &mut State) {
        let mut changed = false;
        while let Ok(event) = state.events.try_recv() {
            match event {
                MonitorEvent::Changed { paths } => {
                    debug!("repository change: {:?}", paths);
                    changed = true;
                }
            }
        }
        if changed && state.loaded {
            debug!("invalidating {} repositories", state.stores.len());
            state.loaded = false;
            state.stores.clear();
            state.enabled.clear();
        }
    }

    /// Set the directory holding repository files
    ///
    /// Allowed once, and only before the first load.
    pub fn set_repos_dir(&self, path: impl Into<PathBuf>) -> Result<()> {
        let mut state = self.lock();
        if state.loads > 0 {
            return Err(UsageError::ReposDirAfterLoad.into());
        }
        if state.repos_dir.is_some() {
            return Err(UsageError::ReposDirAlreadySet.into());
        }
        let path = path.into();
        debug!("repository directory set to {}", path.display());
        state.repos_dir = Some(path);
        Ok(())
    }

    pub fn repos_dir(&self) -> Option<PathBuf> {
        self.lock().repos_dir.clone()
    }

    /// Whether the cached store lists are current
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Number of directory scans performed so far
    pub fn load_count(&self) -> u64 {
        self.lock().loads
    }

    /// Paths under watch: the directory and each repository file
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.lock()
            .monitor
            .as_ref()
            .map(|m| m.watched().to_vec())
            .unwrap_or_default()
    }

    /// Treat the repository directory as changed
    ///
    /// Same effect as a file-system watch firing; the next accessor
    /// reloads.
    pub fn notify_changed(&self) {
        let _ = self.sender.send(MonitorEvent::Changed { paths: Vec::new() });
    }

    /// Every configured repository
    pub fn get_stores(&self, completion: &Completion) -> Result<Vec<Arc<RemoteStore>>> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state, completion)?;
        Ok(state.stores.clone())
    }

    /// Repositories that are enabled
    pub fn get_stores_enabled(&self, completion: &Completion) -> Result<Vec<Arc<RemoteStore>>> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state, completion)?;
        Ok(state.enabled.clone())
    }

    /// The repository with the given id, if configured
    pub fn get_store(&self, id: &str, completion: &Completion) -> Result<Option<Arc<RemoteStore>>> {
        let mut state = self.lock();
        self.ensure_loaded(&mut state, completion)?;
        if state.stores.iter().any(|s| s.id().is_empty()) {
            return Err(Error::MissingStoreId);
        }
        Ok(state.stores.iter().find(|s| s.id() == id).cloned())
    }

    fn ensure_loaded(&self, state: &mut State, completion: &Completion) -> Result<()> {
        if state.loaded {
            return Ok(());
        }
        self.load(state, completion).map_err(|e| Error::ReposLoad(Box::new(e)))
    }

    /// Repository files in `dir`, sorted by name
    fn repo_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(&self.config.repo_suffix));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Scan the directory; on failure the state is left unloaded and empty
    fn load(&self, state: &mut State, completion: &Completion) -> Result<()> {
        let dir = state.repos_dir.clone().ok_or(UsageError::ReposDirNotSet)?;
        if !dir.is_dir() {
            return Err(Error::ReposDirMissing(dir));
        }

        let monitor = match state.monitor.take() {
            Some(monitor) => monitor,
            None => Monitor::new(self.sender.clone())?,
        };
        let monitor = state.monitor.insert(monitor);
        monitor.clear();
        monitor.add_watch(&dir)?;

        let files = self.repo_files(&dir)?;
        completion.set_total_steps(files.len() as u32 + 1)?;

        let mut stores: Vec<Arc<RemoteStore>> = Vec::new();
        for file in &files {
            monitor.add_watch(file)?;
            let keyfile = KeyFile::load(file)?;
            for group in &keyfile.groups {
                if stores.iter().any(|s| s.id() == group.name) {
                    warn!("ignoring duplicate repository {} in {}", group.name, file.display());
                    continue;
                }
                let store = RemoteStore::from_group(group, file, &self.config)?;
                if let Some(installed) = &self.installed {
                    store.set_installed(Arc::clone(installed));
                }
                stores.push(Arc::new(store));
            }
            completion.step_done()?;
        }

        let child = completion.get_child()?;
        if !stores.is_empty() {
            child.set_total_steps(stores.len() as u32)?;
        }
        let mut enabled = Vec::new();
        for store in &stores {
            if store.enabled()? {
                enabled.push(Arc::clone(store));
            }
            child.step_done()?;
        }
        completion.step_done()?;

        info!(
            "loaded {} repositories from {} files in {}, {} enabled",
            stores.len(),
            files.len(),
            dir.display(),
            enabled.len()
        );
        state.stores = stores;
        state.enabled = enabled;
        state.loaded = true;
        state.loads += 1;
        Ok(())
    }
}
