//! Local cache of the running session, used to resume after a restart.
//!
//! Only one session is cached at a time. Entries belong to an owner and
//! expire after a freshness window.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arco_core::Clock;
use arco_core::model::{OwnerId, SessionId};
use arco_core::tracker::TrackerSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bumped whenever the envelope layout changes; other versions are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

pub const DEFAULT_CACHE_TTL: Duration = Duration::hours(24);

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("cache lock poisoned")]
    Poisoned,
}

/// What is written to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub version: u32,
    pub owner: OwnerId,
    pub saved_at: DateTime<Utc>,
    pub snapshot: TrackerSnapshot,
}

/// Metadata about a cached session, without the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub session_id: Option<SessionId>,
    pub saved_at: DateTime<Utc>,
    pub arrows_shot: usize,
}

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Replace the cached entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the entry cannot be written.
    async fn save(&self, snapshot: &TrackerSnapshot, owner: OwnerId) -> Result<(), CacheError>;

    /// The cached entry of `owner`, envelope included, if fresh.
    ///
    /// Entries of other owners and unreadable entries are absent. Stale
    /// entries are removed.
    async fn load_entry(&self, owner: OwnerId) -> Option<CachedSnapshot>;

    /// The cached snapshot of `owner`, if fresh.
    async fn load(&self, owner: OwnerId) -> Option<TrackerSnapshot> {
        self.load_entry(owner).await.map(|entry| entry.snapshot)
    }

    /// Metadata of the fresh entry of `owner`.
    async fn info(&self, owner: OwnerId) -> Option<CacheInfo> {
        self.load_entry(owner).await.map(|entry| CacheInfo {
            session_id: entry.snapshot.session.id(),
            saved_at: entry.saved_at,
            arrows_shot: entry.snapshot.session.arrows_shot(),
        })
    }

    /// # Errors
    ///
    /// Returns `CacheError` if an existing entry cannot be removed.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// Freshness rules shared by the cache implementations.
#[derive(Debug, Clone, Copy)]
struct Freshness {
    clock: Clock,
    ttl: Duration,
}

enum Verdict {
    Fresh(CachedSnapshot),
    Foreign,
    Stale,
}

impl Freshness {
    fn envelope(&self, snapshot: &TrackerSnapshot, owner: OwnerId) -> CachedSnapshot {
        CachedSnapshot {
            version: CACHE_FORMAT_VERSION,
            owner,
            saved_at: self.clock.now(),
            snapshot: snapshot.clone(),
        }
    }

    fn judge(&self, entry: CachedSnapshot, owner: OwnerId) -> Verdict {
        if entry.version != CACHE_FORMAT_VERSION || !self.clock.is_fresh(entry.saved_at, self.ttl) {
            return Verdict::Stale;
        }
        if entry.owner != owner {
            return Verdict::Foreign;
        }
        Verdict::Fresh(entry)
    }
}

//
// ─── IN MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct InMemorySnapshotCache {
    entry: Arc<Mutex<Option<CachedSnapshot>>>,
    rules: Freshness,
}

impl InMemorySnapshotCache {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            entry: Arc::new(Mutex::new(None)),
            rules: Freshness {
                clock,
                ttl: DEFAULT_CACHE_TTL,
            },
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.rules.ttl = ttl;
        self
    }

    /// Raw entry, ignoring owner and freshness.
    #[must_use]
    pub fn peek(&self) -> Option<CachedSnapshot> {
        self.entry.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl SnapshotCache for InMemorySnapshotCache {
    async fn save(&self, snapshot: &TrackerSnapshot, owner: OwnerId) -> Result<(), CacheError> {
        let envelope = self.rules.envelope(snapshot, owner);
        *self.entry.lock().map_err(|_| CacheError::Poisoned)? = Some(envelope);
        Ok(())
    }

    async fn load_entry(&self, owner: OwnerId) -> Option<CachedSnapshot> {
        let mut guard = match self.entry.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("snapshot cache lock poisoned");
                return None;
            }
        };
        let entry = guard.clone()?;
        match self.rules.judge(entry, owner) {
            Verdict::Fresh(entry) => Some(entry),
            Verdict::Foreign => {
                log::debug!("cached session belongs to another owner");
                None
            }
            Verdict::Stale => {
                log::debug!("dropping stale cached session");
                *guard = None;
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        *self.entry.lock().map_err(|_| CacheError::Poisoned)? = None;
        Ok(())
    }
}

//
// ─── FILE ──────────────────────────────────────────────────────────────────────
//

/// Single JSON file holding the current entry.
#[derive(Clone)]
pub struct FileSnapshotCache {
    path: PathBuf,
    rules: Freshness,
}

impl FileSnapshotCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            path: path.into(),
            rules: Freshness {
                clock,
                ttl: DEFAULT_CACHE_TTL,
            },
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.rules.ttl = ttl;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entry(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[async_trait]
impl SnapshotCache for FileSnapshotCache {
    async fn save(&self, snapshot: &TrackerSnapshot, owner: OwnerId) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(&self.rules.envelope(snapshot, owner))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so a crash never leaves a half-written entry.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load_entry(&self, owner: OwnerId) -> Option<CachedSnapshot> {
        let entry = match self.read_entry().await {
            Ok(entry) => entry?,
            Err(e) => {
                log::warn!("ignoring unreadable snapshot cache {}: {e}", self.path.display());
                return None;
            }
        };
        match self.rules.judge(entry, owner) {
            Verdict::Fresh(entry) => Some(entry),
            Verdict::Foreign => {
                log::debug!("cached session belongs to another owner");
                None
            }
            Verdict::Stale => {
                log::debug!("dropping stale cached session");
                if let Err(e) = self.clear().await {
                    log::warn!("failed to remove stale snapshot cache: {e}");
                }
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
