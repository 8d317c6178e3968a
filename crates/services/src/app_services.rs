use std::path::PathBuf;
use std::sync::Arc;

use arco_core::model::OwnerId;
use storage::cache::{FileSnapshotCache, InMemorySnapshotCache, SnapshotCache};
use storage::repository::Storage;
use storage::rest::RestConfig;

use crate::Clock;
use crate::config::ServicesConfig;
use crate::error::AppServicesError;
use crate::history::HistoryService;
use crate::training::TrainingService;

/// Wires storage, the snapshot cache and configuration into app-facing
/// services for one signed-in archer.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    owner: OwnerId,
    config: ServicesConfig,
    storage: Storage,
    cache: Arc<dyn SnapshotCache>,
    history: Arc<HistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// Without `cache_path` the running session is cached in memory only.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the environment configuration is invalid
    /// or storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        cache_path: Option<PathBuf>,
        clock: Clock,
        owner: OwnerId,
    ) -> Result<Self, AppServicesError> {
        let config = ServicesConfig::from_env()?;
        let storage = Storage::sqlite(db_url).await?;
        log::info!("app services ready on {db_url}");
        Ok(Self::assemble(storage, cache_path, clock, owner, config))
    }

    /// Build services backed by the hosted REST backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the environment configuration is invalid
    /// or the HTTP client cannot be built.
    pub fn new_rest(
        rest: RestConfig,
        cache_path: Option<PathBuf>,
        clock: Clock,
        owner: OwnerId,
    ) -> Result<Self, AppServicesError> {
        let config = ServicesConfig::from_env()?;
        let storage = Storage::rest(rest.with_timeout(config.request_timeout))?;
        Ok(Self::assemble(storage, cache_path, clock, owner, config))
    }

    /// In-memory storage and cache with default configuration.
    #[must_use]
    pub fn in_memory(clock: Clock, owner: OwnerId) -> Self {
        Self::assemble(
            Storage::in_memory(),
            None,
            clock,
            owner,
            ServicesConfig::default(),
        )
    }

    fn assemble(
        storage: Storage,
        cache_path: Option<PathBuf>,
        clock: Clock,
        owner: OwnerId,
        config: ServicesConfig,
    ) -> Self {
        let cache: Arc<dyn SnapshotCache> = match cache_path {
            Some(path) => Arc::new(FileSnapshotCache::new(path, clock).with_ttl(config.cache_ttl)),
            None => Arc::new(InMemorySnapshotCache::new(clock).with_ttl(config.cache_ttl)),
        };
        let history = Arc::new(
            HistoryService::new(clock, &storage).with_request_timeout(config.request_timeout),
        );
        Self {
            clock,
            owner,
            config,
            storage,
            cache,
            history,
        }
    }

    /// A fresh training service sharing this app's storage and cache.
    #[must_use]
    pub fn training(&self) -> TrainingService {
        TrainingService::new(
            self.clock,
            self.owner,
            self.storage.clone(),
            Arc::clone(&self.cache),
        )
        .with_config(&self.config)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    #[must_use]
    pub fn config(&self) -> &ServicesConfig {
        &self.config
    }
}
