//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use arco_core::TrackerError;
use arco_core::model::SessionDataError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Why a remote write did not go through. The local change is kept.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("remote write timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors emitted by `TrainingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrainingError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("no training session is active")]
    NoActiveSession,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors emitted by `HistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error(transparent)]
    Data(#[from] SessionDataError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<StorageError> for HistoryError {
    fn from(err: StorageError) -> Self {
        Self::Persistence(PersistenceError::Storage(err))
    }
}

/// Invalid environment configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigLoadError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
}
