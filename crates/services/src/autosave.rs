//! Debounced writes of the running session to the local snapshot cache.

use std::sync::Arc;
use std::time::Duration;

use arco_core::model::OwnerId;
use arco_core::tracker::TrackerSnapshot;
use storage::cache::{CacheError, SnapshotCache};
use tokio::task::JoinHandle;

use crate::config::DEFAULT_AUTOSAVE_DELAY;

/// Coalesces bursts of changes into a single cache write once the session
/// has been quiet for `delay`.
///
/// Must be used from within a tokio runtime. Dropping the writer cancels a
/// pending write.
pub struct AutosaveWriter {
    cache: Arc<dyn SnapshotCache>,
    delay: Duration,
    /// Resolves to `true` once the delayed write has landed.
    pending: Option<JoinHandle<bool>>,
    latest: Option<(TrackerSnapshot, OwnerId)>,
}

impl AutosaveWriter {
    #[must_use]
    pub fn new(cache: Arc<dyn SnapshotCache>) -> Self {
        Self {
            cache,
            delay: DEFAULT_AUTOSAVE_DELAY,
            pending: None,
            latest: None,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True while a write is waiting for its quiet period.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Replace any pending write with one for `snapshot`.
    pub fn schedule(&mut self, snapshot: TrackerSnapshot, owner: OwnerId) {
        self.abort();
        self.latest = Some((snapshot.clone(), owner));

        let cache = Arc::clone(&self.cache);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match cache.save(&snapshot, owner).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("autosave failed: {e}");
                    false
                }
            }
        }));
    }

    /// Write the latest scheduled snapshot now, unless the delayed write
    /// already stored it.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache rejects the write.
    pub async fn flush(&mut self) -> Result<(), CacheError> {
        if let Some(task) = self.pending.take() {
            if task.is_finished() {
                if matches!(task.await, Ok(true)) {
                    self.latest = None;
                }
            } else {
                task.abort();
            }
        }
        match self.latest.take() {
            Some((snapshot, owner)) => self.cache.save(&snapshot, owner).await,
            None => Ok(()),
        }
    }

    /// Drop the pending write, if any.
    pub fn cancel(&mut self) {
        self.abort();
        self.latest = None;
    }

    fn abort(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for AutosaveWriter {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arco_core::SessionTracker;
    use arco_core::model::{Arrow, SessionConfigDraft};
    use arco_core::time::{fixed_clock, fixed_now};
    use storage::cache::{CachedSnapshot, InMemorySnapshotCache};

    /// Counts writes on top of an in-memory cache.
    struct Counting {
        inner: InMemorySnapshotCache,
        saves: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SnapshotCache for Counting {
        async fn save(&self, snapshot: &TrackerSnapshot, owner: OwnerId) -> Result<(), CacheError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(snapshot, owner).await
        }

        async fn load_entry(&self, owner: OwnerId) -> Option<CachedSnapshot> {
            self.inner.load_entry(owner).await
        }

        async fn clear(&self) -> Result<(), CacheError> {
            self.inner.clear().await
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            inner: InMemorySnapshotCache::new(fixed_clock()),
            saves: AtomicUsize::new(0),
        })
    }

    fn tracker(owner: OwnerId) -> SessionTracker {
        let draft = SessionConfigDraft::new(fixed_now().date_naive()).with_series(2, 6);
        SessionTracker::start(draft, owner, fixed_now()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_coalesce_into_one_write() {
        let cache = counting();
        let owner = OwnerId::random();
        let mut writer = AutosaveWriter::new(cache.clone()).with_delay(Duration::from_secs(2));
        let mut tracker = tracker(owner);

        for _ in 0..5 {
            tracker.register_arrow(Arrow::miss()).unwrap();
            writer.schedule(tracker.snapshot(), owner);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(cache.saves.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.saves.load(Ordering::SeqCst), 1);
        let saved = cache.load(owner).await.unwrap();
        assert_eq!(saved.session.arrows_shot(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_discard_pending_writes() {
        let cache = counting();
        let owner = OwnerId::random();
        let tracker = tracker(owner);

        let mut writer = AutosaveWriter::new(cache.clone());
        writer.schedule(tracker.snapshot(), owner);
        assert!(writer.is_pending());
        writer.cancel();
        assert!(!writer.is_pending());

        let mut dropped = AutosaveWriter::new(cache.clone());
        dropped.schedule(tracker.snapshot(), owner);
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cache.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately_once() {
        let cache = counting();
        let owner = OwnerId::random();
        let mut writer = AutosaveWriter::new(cache.clone());
        writer.schedule(tracker(owner).snapshot(), owner);

        writer.flush().await.unwrap();
        assert_eq!(cache.saves.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        writer.flush().await.unwrap();
        assert_eq!(cache.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_after_the_delayed_write_does_not_repeat_it() {
        let cache = counting();
        let owner = OwnerId::random();
        let mut writer = AutosaveWriter::new(cache.clone()).with_delay(Duration::from_secs(1));
        writer.schedule(tracker(owner).snapshot(), owner);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.saves.load(Ordering::SeqCst), 1);
        assert!(!writer.is_pending());

        writer.flush().await.unwrap();
        assert_eq!(cache.saves.load(Ordering::SeqCst), 1);
    }
}
