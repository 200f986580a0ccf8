// src/monitor.rs

//! File-system watches for the repository directory
//!
//! A [`Monitor`] watches the repository directory and each repository file.
//! Every relevant change is forwarded as a single [`MonitorEvent::Changed`]
//! over a channel; the receiver decides what to do with it. Reads of the
//! watched files (our own loads included) are not reported.

use crate::error::Result;
use notify::event::{AccessKind, AccessMode, MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Message sent when something under watch changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Changed { paths: Vec<PathBuf> },
}

/// Whether an event means watched content changed
fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}

/// Watch set forwarding changes to a channel
pub struct Monitor {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl Monitor {
    /// Create a monitor sending [`MonitorEvent`]s to `tx`
    pub fn new(tx: Sender<MonitorEvent>) -> Result<Self> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_change(&event.kind) {
                    return;
                }
                debug!("watch fired: {:?} {:?}", event.kind, event.paths);
                // receiver gone means the registry was dropped
                let _ = tx.send(MonitorEvent::Changed { paths: event.paths });
            }
            Err(e) => warn!("file watch error: {}", e),
        })?;

        Ok(Self {
            watcher,
            watched: Vec::new(),
        })
    }

    /// Start watching `path` (a directory is watched non-recursively)
    pub fn add_watch(&mut self, path: &Path) -> Result<()> {
        if self.watched.iter().any(|p| p == path) {
            return Ok(());
        }
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        debug!("watching {}", path.display());
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    /// Drop every watch
    pub fn clear(&mut self) {
        for path in self.watched.drain(..) {
            // fails for files that were removed, which is expected
            if let Err(e) = self.watcher.unwatch(&path) {
                debug!("unwatch {}: {}", path.display(), e);
            }
        }
    }

    /// Paths currently watched
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.clear();
    }
}
