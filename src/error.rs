// src/error.rs

//! Error types for zif
//!
//! Every fallible operation in the library returns [`Result`]. Store-level
//! failures surfaced through a [`crate::Sack`] are wrapped in
//! [`Error::StoreOperationFailed`] so the caller knows which store and which
//! operation broke; [`Error::root_cause`] peels those layers off again.

use crate::store::Operation;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Contract violations by the caller
///
/// These are programming errors, not runtime conditions. They are reported
/// back instead of panicking but are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("number of steps has not been set")]
    StepsNotSet,

    #[error("number of steps already set ({0})")]
    StepsAlreadySet(u32),

    #[error("number of steps must be greater than zero")]
    ZeroSteps,

    #[error("already at 100% completion ({steps} steps done)")]
    AlreadyComplete { steps: u32 },

    #[error("a child is already active for the current step")]
    ChildActive,

    #[error("child has only completed {completed} of {steps} steps")]
    ChildUnfinished { completed: u32, steps: u32 },

    #[error("percentage {0} is out of range")]
    PercentageOutOfRange(u32),

    #[error("percentage cannot go down from {from} to {to}")]
    PercentageDecrease { from: u32, to: u32 },

    #[error("repository directory already set")]
    ReposDirAlreadySet,

    #[error("repository directory cannot be changed after loading")]
    ReposDirAfterLoad,

    #[error("repository directory has not been set")]
    ReposDirNotSet,
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("operation {operation} cannot be performed on store {store}")]
    NotSupported { store: String, operation: Operation },

    #[error("nothing to do as no stores in sack")]
    EmptyStoreSet,

    #[error("failed to {operation} in {store}: {source}")]
    StoreOperationFailed {
        store: String,
        operation: Operation,
        source: Box<Error>,
    },

    #[error("failed to parse {}:{line}: {message}", .path.display())]
    ConfigParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("repository directory {} does not exist", .0.display())]
    ReposDirMissing(PathBuf),

    #[error("failed to load repositories: {0}")]
    ReposLoad(Box<Error>),

    #[error("store has no id")]
    MissingStoreId,

    #[error("invalid package id '{0}'")]
    InvalidPackageId(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("file watch failed: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    /// Wrap a store failure with the store id and operation
    pub fn store_failed(store: impl Into<String>, operation: Operation, source: Error) -> Self {
        Self::StoreOperationFailed {
            store: store.into(),
            operation,
            source: Box::new(source),
        }
    }

    /// Strip any store/registry context and return the underlying error
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::StoreOperationFailed { source, .. } | Self::ReposLoad(source) => source.root_cause(),
            other => other,
        }
    }

    /// Whether the underlying failure is a missing capability
    pub fn is_not_supported(&self) -> bool {
        matches!(self.root_cause(), Self::NotSupported { .. })
    }

    /// Whether the underlying failure is a caller contract violation
    pub fn is_usage(&self) -> bool {
        matches!(self.root_cause(), Self::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_context() {
        let inner = Error::NotSupported {
            store: "installed".to_string(),
            operation: Operation::Refresh,
        };
        let wrapped = Error::store_failed("installed", Operation::Refresh, inner);
        let wrapped = Error::ReposLoad(Box::new(wrapped));

        assert!(wrapped.is_not_supported());
        assert!(matches!(wrapped.root_cause(), Error::NotSupported { .. }));
    }

    #[test]
    fn test_store_failure_message_names_store_and_operation() {
        let err = Error::store_failed("fedora", Operation::SearchDetails, Error::Cancelled);
        assert_eq!(
            err.to_string(),
            "failed to search-details in fedora: operation was cancelled"
        );
    }
}
