use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arco_core::model::{
    Arrow, ArrowId, OwnerId, Score, SelfAssessment, SelfAssessmentDraft, SeriesId, Session,
    SessionConfigDraft, SessionId,
};
use arco_core::time::{fixed_clock, fixed_now};
use arco_core::{AdvancePolicy, RegisterOutcome};
use async_trait::async_trait;
use services::{PersistenceError, RemoteWrite, TrainingError, TrainingService};
use storage::cache::{FileSnapshotCache, InMemorySnapshotCache, SnapshotCache};
use storage::repository::{
    ArrowRepository, AssessmentRepository, InMemoryRepository, SeriesRepository,
    SessionRepository, Storage, StorageError,
};

/// In-memory backend that can be switched offline or made to hang.
#[derive(Clone, Default)]
struct Backend {
    inner: InMemoryRepository,
    offline: Arc<AtomicBool>,
    hang: Arc<AtomicBool>,
}

impl Backend {
    fn storage(&self) -> Storage {
        Storage {
            sessions: Arc::new(self.clone()),
            series: Arc::new(self.clone()),
            arrows: Arc::new(self.clone()),
            assessments: Arc::new(self.clone()),
        }
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    async fn gate(&self) -> Result<(), StorageError> {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for Backend {
    async fn create_session(&self, session: &Session) -> Result<SessionId, StorageError> {
        self.gate().await?;
        self.inner.create_session(session).await
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        self.gate().await?;
        self.inner.get_session(id).await
    }

    async fn list_sessions(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError> {
        self.gate().await?;
        self.inner.list_sessions(owner).await
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        self.gate().await?;
        self.inner.update_session(session).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        self.gate().await?;
        self.inner.delete_session(id).await
    }
}

#[async_trait]
impl SeriesRepository for Backend {
    async fn create_series(
        &self,
        session_id: SessionId,
        number: u32,
        score: u32,
    ) -> Result<SeriesId, StorageError> {
        self.gate().await?;
        self.inner.create_series(session_id, number, score).await
    }

    async fn update_series_score(&self, id: SeriesId, score: u32) -> Result<(), StorageError> {
        self.gate().await?;
        self.inner.update_series_score(id, score).await
    }
}

#[async_trait]
impl ArrowRepository for Backend {
    async fn create_arrow(
        &self,
        series_id: SeriesId,
        order: u32,
        arrow: &Arrow,
    ) -> Result<ArrowId, StorageError> {
        self.gate().await?;
        self.inner.create_arrow(series_id, order, arrow).await
    }

    async fn update_arrow(&self, id: ArrowId, arrow: &Arrow) -> Result<(), StorageError> {
        self.gate().await?;
        self.inner.update_arrow(id, arrow).await
    }

    async fn delete_arrow(&self, id: ArrowId) -> Result<(), StorageError> {
        self.gate().await?;
        self.inner.delete_arrow(id).await
    }
}

#[async_trait]
impl AssessmentRepository for Backend {
    async fn save_assessment(
        &self,
        session_id: SessionId,
        assessment: &SelfAssessment,
    ) -> Result<(), StorageError> {
        self.gate().await?;
        self.inner.save_assessment(session_id, assessment).await
    }
}

fn draft(series: u32, arrows: u32) -> SessionConfigDraft {
    SessionConfigDraft::new(fixed_now().date_naive())
        .with_series(series, arrows)
        .with_distance(18)
        .with_goal(Some(50))
}

fn points(value: u8) -> Arrow {
    Arrow::manual(Score::new(value).unwrap())
}

fn service(backend: &Backend, cache: Arc<dyn SnapshotCache>, owner: OwnerId) -> TrainingService {
    TrainingService::new(fixed_clock(), owner, backend.storage(), cache)
}

fn memory_cache() -> Arc<dyn SnapshotCache> {
    Arc::new(InMemorySnapshotCache::new(fixed_clock()))
}

#[tokio::test]
async fn full_training_reaches_storage() {
    let backend = Backend::default();
    let owner = OwnerId::random();
    let mut training = service(&backend, memory_cache(), owner);

    let started = training.start_training(draft(2, 3)).await.unwrap();
    let id = started.value.expect("session stored");

    for value in [10, 9, 8] {
        let applied = training.register_arrow(points(value)).await.unwrap();
        assert!(applied.remote.is_saved());
    }
    let ignored = training.register_arrow(points(1)).await.unwrap();
    assert_eq!(ignored.value, RegisterOutcome::Ignored);
    assert!(matches!(ignored.remote, RemoteWrite::Skipped));

    training.advance_to_next_series().unwrap();
    training.register_hit(140.0, 140.0).await.unwrap();
    training.register_miss().await.unwrap();

    let edited = training.edit_arrow(0, 2, points(2)).await.unwrap();
    assert_eq!(edited.value.score.value(), 8);
    assert!(edited.remote.is_saved());

    let assessment = SelfAssessmentDraft::uniform(6).validate().unwrap();
    let finished = training
        .finalize(Some("calm".into()), Some(assessment))
        .await
        .unwrap();
    assert!(finished.remote.is_saved());
    assert_eq!(finished.value.total_score(), 31);
    assert!(!training.is_active());

    let stored = backend.inner.get_session(id).await.unwrap();
    assert_eq!(stored.total_score(), 31);
    assert_eq!(stored.best_series(), Some(21));
    assert_eq!(stored.series()[0].arrows()[2].score.value(), 2);
    assert_eq!(stored.series()[1].len(), 2);
    assert_eq!(stored.notes(), Some("calm"));
    assert!(stored.is_completed());
    assert!(stored.self_assessment().is_some());
}

#[tokio::test]
async fn remote_failure_keeps_local_arrow() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random());
    training.start_training(draft(1, 3)).await.unwrap();

    backend.set_offline(true);
    let applied = training.register_arrow(points(7)).await.unwrap();
    assert!(applied.remote.is_failed());
    assert!(matches!(
        applied.remote.error(),
        Some(PersistenceError::Storage(StorageError::Connection(_)))
    ));
    let session = training.session().unwrap();
    assert_eq!(session.total_score(), 7);
    assert_eq!(session.series()[0].arrows()[0].id, None);

    // nothing to update remotely for an arrow that was never stored
    backend.set_offline(false);
    let edited = training.edit_arrow(0, 0, points(9)).await.unwrap();
    assert!(matches!(edited.remote, RemoteWrite::Skipped));
    assert_eq!(training.session().unwrap().total_score(), 9);
}

#[tokio::test(start_paused = true)]
async fn hanging_backend_times_out() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random())
        .with_request_timeout(Duration::from_millis(300));
    training.start_training(draft(1, 3)).await.unwrap();

    backend.hang.store(true, Ordering::SeqCst);
    let applied = training.register_arrow(points(5)).await.unwrap();
    assert!(matches!(
        applied.remote.error(),
        Some(PersistenceError::Timeout(limit)) if *limit == Duration::from_millis(300)
    ));
    assert_eq!(training.session().unwrap().arrows_shot(), 1);
}

#[tokio::test]
async fn offline_session_is_uploaded_on_finalize() {
    let backend = Backend::default();
    let owner = OwnerId::random();
    let mut training = service(&backend, memory_cache(), owner);

    backend.set_offline(true);
    let started = training.start_training(draft(2, 2)).await.unwrap();
    assert_eq!(started.value, None);
    assert!(started.remote.is_failed());

    for value in [10, 10, 6] {
        let applied = training.register_arrow(points(value)).await.unwrap();
        assert!(matches!(applied.remote, RemoteWrite::Skipped));
        if training.tracker().unwrap().current_arrow_index() == 2 {
            training.advance_to_next_series().unwrap();
        }
    }

    backend.set_offline(false);
    let finished = training.finalize(None, None).await.unwrap();
    assert!(finished.remote.is_saved());
    let id = finished.value.id().expect("uploaded session id");

    let stored = backend.inner.get_session(id).await.unwrap();
    assert_eq!(stored.total_score(), 26);
    assert_eq!(stored.series().len(), 2);
    assert_eq!(stored.owner(), owner);
}

#[tokio::test]
async fn calls_without_a_session_are_rejected() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random());

    assert!(matches!(
        training.register_miss().await,
        Err(TrainingError::NoActiveSession)
    ));
    assert!(matches!(
        training.finalize(None, None).await,
        Err(TrainingError::NoActiveSession)
    ));
    assert!(training.discard().await.is_none());
}

#[tokio::test]
async fn finalized_session_is_read_only() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random());
    training.start_training(draft(1, 2)).await.unwrap();
    training.finalize(None, None).await.unwrap();

    assert!(matches!(
        training.register_arrow(points(3)).await,
        Err(TrainingError::Tracker(_))
    ));
    assert!(matches!(
        training.finalize(None, None).await,
        Err(TrainingError::Tracker(_))
    ));
}

#[tokio::test]
async fn auto_advance_moves_on_after_a_full_series() {
    let backend = Backend::default();
    let mut training =
        service(&backend, memory_cache(), OwnerId::random()).with_policy(AdvancePolicy::Auto);
    training.start_training(draft(2, 2)).await.unwrap();

    training.register_arrow(points(4)).await.unwrap();
    let second = training.register_arrow(points(4)).await.unwrap();
    assert!(matches!(second.value, RegisterOutcome::Advanced(_)));
    assert_eq!(training.tracker().unwrap().current_series_index(), 1);
}

#[tokio::test]
async fn resume_picks_up_the_cached_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current.json");
    let backend = Backend::default();
    let owner = OwnerId::random();

    let cache: Arc<dyn SnapshotCache> = Arc::new(FileSnapshotCache::new(&path, fixed_clock()));
    let mut first = service(&backend, Arc::clone(&cache), owner);
    first.start_training(draft(2, 3)).await.unwrap();
    first.register_arrow(points(9)).await.unwrap();
    first.register_arrow(points(8)).await.unwrap();
    first.flush_autosave().await.unwrap();
    drop(first);

    let mut second = service(&backend, Arc::clone(&cache), owner);
    assert!(second.resume_from_cache().await);
    let session = second.session().unwrap();
    assert_eq!(session.total_score(), 17);
    assert!(session.id().is_some());
    assert_eq!(second.tracker().unwrap().current_arrow_index(), 2);

    second.register_arrow(points(7)).await.unwrap();
    let finished = second.finalize(None, None).await.unwrap();
    assert_eq!(finished.value.total_score(), 24);
    assert!(cache.load(owner).await.is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn resume_ignores_foreign_and_stale_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current.json");
    let backend = Backend::default();
    let owner = OwnerId::random();

    let cache: Arc<dyn SnapshotCache> = Arc::new(FileSnapshotCache::new(&path, fixed_clock()));
    let mut first = service(&backend, Arc::clone(&cache), owner);
    first.start_training(draft(1, 3)).await.unwrap();
    first.register_arrow(points(9)).await.unwrap();
    first.flush_autosave().await.unwrap();

    let mut stranger = service(&backend, Arc::clone(&cache), OwnerId::random());
    assert!(!stranger.resume_from_cache().await);
    assert!(path.exists());

    let mut later = fixed_clock();
    later.advance(chrono::Duration::hours(25));
    let stale: Arc<dyn SnapshotCache> = Arc::new(FileSnapshotCache::new(&path, later));
    let mut next_day = TrainingService::new(later, owner, backend.storage(), stale);
    assert!(!next_day.resume_from_cache().await);
    assert!(!path.exists());
}

#[tokio::test]
async fn discard_clears_the_cache_but_keeps_remote_rows() {
    let backend = Backend::default();
    let owner = OwnerId::random();
    let cache = memory_cache();
    let mut training = service(&backend, Arc::clone(&cache), owner);

    let id = training.start_training(draft(1, 3)).await.unwrap().value.unwrap();
    training.register_arrow(points(10)).await.unwrap();
    training.flush_autosave().await.unwrap();

    let discarded = training.discard().await.unwrap();
    assert_eq!(discarded.total_score(), 10);
    assert!(!training.is_active());
    assert!(cache.load(owner).await.is_none());
    assert!(backend.inner.get_session(id).await.is_ok());
}

#[tokio::test]
async fn skipped_series_survive_a_reload() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random());
    let id = training.start_training(draft(3, 2)).await.unwrap().value.unwrap();

    training.register_arrow(points(9)).await.unwrap();
    training.advance_to_next_series().unwrap();
    training.advance_to_next_series().unwrap();
    training.register_arrow(points(4)).await.unwrap();
    let finished = training.finalize(None, None).await.unwrap();
    assert!(finished.remote.is_saved());

    let stored = backend.inner.get_session(id).await.unwrap();
    let scores: Vec<u32> = stored.series().iter().map(|s| s.score()).collect();
    assert_eq!(scores, vec![9, 0, 4]);
    assert_eq!(stored.best_series(), Some(9));
}

#[tokio::test]
async fn arrows_lost_to_a_failed_write_are_sent_on_finalize() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random());
    let id = training.start_training(draft(2, 2)).await.unwrap().value.unwrap();

    backend.set_offline(true);
    assert!(training.register_arrow(points(10)).await.unwrap().remote.is_failed());
    backend.set_offline(false);
    assert!(training.register_arrow(points(5)).await.unwrap().remote.is_saved());

    let finished = training.finalize(None, None).await.unwrap();
    assert!(finished.remote.is_saved());
    assert!(finished.value.series()[0].arrows().iter().all(|a| a.id.is_some()));

    let stored = backend.inner.get_session(id).await.unwrap();
    assert_eq!(stored.total_score(), 15);
    let order: Vec<u8> = stored.series()[0]
        .arrows()
        .iter()
        .map(|a| a.score.value())
        .collect();
    assert_eq!(order, vec![10, 5]);
}

#[tokio::test]
async fn finalize_reports_failure_while_arrows_cannot_be_sent() {
    let backend = Backend::default();
    let mut training = service(&backend, memory_cache(), OwnerId::random());
    let id = training.start_training(draft(1, 2)).await.unwrap().value.unwrap();

    backend.set_offline(true);
    training.register_arrow(points(8)).await.unwrap();
    let finished = training.finalize(None, None).await.unwrap();
    assert!(finished.remote.is_failed());
    assert_eq!(finished.value.total_score(), 8);

    backend.set_offline(false);
    let stored = backend.inner.get_session(id).await.unwrap();
    assert_eq!(stored.total_score(), 0);
    assert!(!stored.is_completed());
}
