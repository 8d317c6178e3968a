use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arco_core::model::{
    Arrow, HitPoint, OwnerId, SelfAssessment, Series, SeriesId, Session, SessionConfigDraft,
    SessionId,
};
use arco_core::{AdvancePolicy, ArrowSlot, RegisterOutcome, SessionTracker};
use storage::cache::{CacheError, SnapshotCache};
use storage::repository::{Storage, StorageError};

use super::outcome::{Applied, RemoteWrite};
use crate::Clock;
use crate::autosave::AutosaveWriter;
use crate::config::{DEFAULT_REQUEST_TIMEOUT, ServicesConfig};
use crate::error::{PersistenceError, TrainingError};

/// Runs one training session at a time.
///
/// Every mutation is applied to the local tracker first. The matching
/// remote write is then attempted once, bounded by the request timeout, and
/// its outcome is reported next to the value. A failed remote write never
/// rolls back the local change. After each local change the running session
/// is scheduled for the local snapshot cache.
pub struct TrainingService {
    clock: Clock,
    owner: OwnerId,
    storage: Storage,
    cache: Arc<dyn SnapshotCache>,
    autosave: AutosaveWriter,
    request_timeout: Duration,
    policy: AdvancePolicy,
    tracker: Option<SessionTracker>,
}

impl TrainingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        owner: OwnerId,
        storage: Storage,
        cache: Arc<dyn SnapshotCache>,
    ) -> Self {
        Self {
            clock,
            owner,
            storage,
            autosave: AutosaveWriter::new(Arc::clone(&cache)),
            cache,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            policy: AdvancePolicy::default(),
            tracker: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &ServicesConfig) -> Self {
        self.request_timeout = config.request_timeout;
        self.policy = config.advance_policy;
        self.autosave = AutosaveWriter::new(Arc::clone(&self.cache)).with_delay(config.autosave_delay);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AdvancePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    #[must_use]
    pub fn tracker(&self) -> Option<&SessionTracker> {
        self.tracker.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.tracker.as_ref().map(SessionTracker::session)
    }

    /// True while a session is open for scoring.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.tracker.as_ref().is_some_and(|t| !t.is_finalized())
    }

    #[must_use]
    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Open a new session and create its remote header.
    ///
    /// An unfinished session that was still open is replaced. The value is the
    /// remote id when the header was stored.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::Tracker` if the configuration is invalid.
    pub async fn start_training(
        &mut self,
        draft: SessionConfigDraft,
    ) -> Result<Applied<Option<SessionId>>, TrainingError> {
        let tracker = SessionTracker::start(draft, self.owner, self.clock.now())?
            .with_policy(self.policy);
        if let Some(previous) = self.tracker.as_ref().filter(|t| !t.is_finalized()) {
            log::info!(
                "replacing unfinished session with {} arrows",
                previous.session().arrows_shot()
            );
        }
        let config = tracker.config();
        log::info!(
            "starting training: {} series of {} arrows at {} m",
            config.series_count(),
            config.arrows_per_series(),
            config.distance()
        );

        let header = tracker.session().clone();
        self.tracker = Some(tracker);
        self.schedule_autosave();

        let remote = match within(
            self.request_timeout,
            self.storage.sessions.create_session(&header),
        )
        .await
        {
            Ok(id) => {
                if let Some(tracker) = self.tracker.as_mut() {
                    tracker.assign_session_id(id);
                }
                self.schedule_autosave();
                RemoteWrite::Saved
            }
            Err(err) => failed("create session", err),
        };
        let id = self.session().and_then(Session::id);
        Ok(Applied::with_remote(id, remote))
    }

    /// Pick up the session left in the local cache, if it is fresh and ours.
    ///
    /// Replaces any session held by the service. An unusable entry is
    /// removed.
    pub async fn resume_from_cache(&mut self) -> bool {
        let Some(snapshot) = self.cache.load(self.owner).await else {
            return false;
        };
        match SessionTracker::from_snapshot(snapshot) {
            Ok(tracker) => {
                log::info!(
                    "resumed cached session at series {} with {} arrows",
                    tracker.current_series_index() + 1,
                    tracker.session().arrows_shot()
                );
                self.tracker = Some(tracker);
                true
            }
            Err(err) => {
                log::warn!("discarding unusable cached session: {err}");
                self.clear_cache().await;
                false
            }
        }
    }

    /// Close the session with optional notes and self-assessment, push the
    /// final totals and clear the local cache.
    ///
    /// A session that never reached the server is uploaded whole.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NoActiveSession` without a session and
    /// `TrainingError::Tracker` if it was already finalized.
    pub async fn finalize(
        &mut self,
        notes: Option<String>,
        self_assessment: Option<SelfAssessment>,
    ) -> Result<Applied<Session>, TrainingError> {
        let session = self
            .tracker_mut()?
            .finalize(notes, self_assessment)?
            .clone();
        log::info!(
            "finalized session: total {}, best series {:?}, {} arrows",
            session.total_score(),
            session.best_series(),
            session.arrows_shot()
        );
        self.autosave.cancel();
        self.clear_cache().await;

        let remote = self.push_final(&session).await;
        let session = self.session().cloned().unwrap_or(session);
        Ok(Applied::with_remote(session, remote))
    }

    /// Abandon the running session locally and clear the cache. Rows already
    /// stored remotely are kept.
    pub async fn discard(&mut self) -> Option<Session> {
        let tracker = self.tracker.take()?;
        log::info!(
            "discarded session with {} arrows",
            tracker.session().arrows_shot()
        );
        self.autosave.cancel();
        self.clear_cache().await;
        Some(tracker.into_session())
    }

    /// Write the pending autosave now.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache rejects the write.
    pub async fn flush_autosave(&mut self) -> Result<(), CacheError> {
        self.autosave.flush().await
    }

    //
    // ─── SCORING ───────────────────────────────────────────────────────────────
    //

    /// Record an arrow on the current series and store it remotely.
    ///
    /// The series row is created on its first arrow. An arrow on a full
    /// series is ignored and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NoActiveSession` without a session and
    /// `TrainingError::Tracker` after finalize.
    pub async fn register_arrow(
        &mut self,
        arrow: Arrow,
    ) -> Result<Applied<RegisterOutcome>, TrainingError> {
        let outcome = self.tracker_mut()?.register_arrow(arrow)?;
        let Some(slot) = outcome.slot() else {
            log::debug!("arrow ignored: current series is full");
            return Ok(Applied::local(outcome));
        };
        log::debug!(
            "recorded {} at series {}, arrow {}",
            arrow.score,
            slot.series_index + 1,
            slot.arrow_index + 1
        );
        self.schedule_autosave();

        let remote = self.push_arrow(slot, arrow).await;
        Ok(Applied::with_remote(outcome, remote))
    }

    /// Record a hit at target coordinates; the score follows from the rings.
    ///
    /// # Errors
    ///
    /// See [`TrainingService::register_arrow`].
    pub async fn register_hit(
        &mut self,
        x: f64,
        y: f64,
    ) -> Result<Applied<RegisterOutcome>, TrainingError> {
        self.register_arrow(Arrow::at(HitPoint::new(x, y))).await
    }

    /// # Errors
    ///
    /// See [`TrainingService::register_arrow`].
    pub async fn register_miss(&mut self) -> Result<Applied<RegisterOutcome>, TrainingError> {
        self.register_arrow(Arrow::miss()).await
    }

    /// Replace a recorded arrow. Returns the previous arrow.
    ///
    /// Series and session totals are pushed on finalize.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::Tracker` for unknown indices or after
    /// finalize.
    pub async fn edit_arrow(
        &mut self,
        series_index: usize,
        arrow_index: usize,
        arrow: Arrow,
    ) -> Result<Applied<Arrow>, TrainingError> {
        let tracker = self.tracker_mut()?;
        let remote_id = tracker
            .session()
            .series()
            .get(series_index)
            .and_then(|series| series.arrows().get(arrow_index))
            .and_then(|existing| existing.id);
        let arrow = Arrow {
            id: remote_id,
            ..arrow
        };
        let previous = tracker.edit_arrow(series_index, arrow_index, arrow)?;
        log::debug!(
            "edited series {}, arrow {}: {} -> {}",
            series_index + 1,
            arrow_index + 1,
            previous.score,
            arrow.score
        );
        self.schedule_autosave();

        let remote = match remote_id {
            None => RemoteWrite::Skipped,
            Some(id) => settle(
                "update arrow",
                within(self.request_timeout, self.storage.arrows.update_arrow(id, &arrow)).await,
            ),
        };
        Ok(Applied::with_remote(previous, remote))
    }

    /// Local only. Returns the new series index.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::NoActiveSession` without a session and
    /// `TrainingError::Tracker` after finalize.
    pub fn advance_to_next_series(&mut self) -> Result<Applied<usize>, TrainingError> {
        let index = self.tracker_mut()?.advance_to_next_series()?;
        log::debug!("advanced to series {}", index + 1);
        self.schedule_autosave();
        Ok(Applied::local(index))
    }

    /// Local only. `series_number` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::Tracker` if the series has not been started.
    pub fn navigate_to_series(&mut self, series_number: usize) -> Result<Applied<()>, TrainingError> {
        self.tracker_mut()?.navigate_to_series(series_number)?;
        log::debug!("navigated to series {series_number}");
        self.schedule_autosave();
        Ok(Applied::local(()))
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn tracker_mut(&mut self) -> Result<&mut SessionTracker, TrainingError> {
        self.tracker.as_mut().ok_or(TrainingError::NoActiveSession)
    }

    fn schedule_autosave(&mut self) {
        if let Some(tracker) = self.tracker.as_ref().filter(|t| !t.is_finalized()) {
            self.autosave.schedule(tracker.snapshot(), self.owner);
        }
    }

    async fn clear_cache(&self) {
        if let Err(err) = self.cache.clear().await {
            log::warn!("could not clear snapshot cache: {err}");
        }
    }

    async fn push_arrow(&mut self, slot: ArrowSlot, arrow: Arrow) -> RemoteWrite {
        let Some(session_id) = self.session().and_then(Session::id) else {
            log::debug!("session has no remote id yet; arrow kept locally");
            return RemoteWrite::Skipped;
        };
        match self.store_arrow(session_id, slot, arrow).await {
            Ok(()) => {
                self.schedule_autosave();
                RemoteWrite::Saved
            }
            Err(err) => failed("create arrow", err),
        }
    }

    /// Create the arrow row, and its series row on first use, then record
    /// the remote ids on the tracker.
    async fn store_arrow(
        &mut self,
        session_id: SessionId,
        slot: ArrowSlot,
        arrow: Arrow,
    ) -> Result<(), PersistenceError> {
        let series_id = self.series_row(session_id, slot.series_index).await?;
        let id = within(
            self.request_timeout,
            self.storage
                .arrows
                .create_arrow(series_id, ordinal(slot.arrow_index), &arrow),
        )
        .await?;
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.assign_arrow_id(slot, id);
        }
        Ok(())
    }

    async fn series_row(
        &mut self,
        session_id: SessionId,
        series_index: usize,
    ) -> Result<SeriesId, PersistenceError> {
        let known = self
            .session()
            .and_then(|session| session.series().get(series_index))
            .and_then(Series::id);
        if let Some(id) = known {
            return Ok(id);
        }
        let id = within(
            self.request_timeout,
            self.storage
                .series
                .create_series(session_id, ordinal(series_index), 0),
        )
        .await?;
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.assign_series_id(series_index, id);
        }
        Ok(id)
    }

    /// Arrows recorded locally whose row was never created.
    fn unsent_arrows(&self) -> Vec<(ArrowSlot, Arrow)> {
        let Some(session) = self.session() else {
            return Vec::new();
        };
        session
            .series()
            .iter()
            .enumerate()
            .flat_map(|(series_index, series)| {
                series
                    .arrows()
                    .iter()
                    .enumerate()
                    .filter(|(_, arrow)| arrow.id.is_none())
                    .map(move |(arrow_index, arrow)| {
                        let slot = ArrowSlot {
                            series_index,
                            arrow_index,
                        };
                        (slot, *arrow)
                    })
            })
            .collect()
    }

    async fn push_final(&mut self, session: &Session) -> RemoteWrite {
        let Some(session_id) = session.id() else {
            return match within(
                self.request_timeout,
                self.storage.insert_full_session(session),
            )
            .await
            {
                Ok(id) => {
                    if let Some(tracker) = self.tracker.as_mut() {
                        tracker.assign_session_id(id);
                    }
                    RemoteWrite::Saved
                }
                Err(err) => failed("upload session", err),
            };
        };

        // Totals are only pushed once every arrow has a row.
        let unsent = self.unsent_arrows();
        for (slot, arrow) in &unsent {
            if let Err(err) = self.store_arrow(session_id, *slot, *arrow).await {
                return failed("send unsent arrows", err);
            }
        }
        if !unsent.is_empty() {
            log::info!("sent {} arrows left over from failed writes", unsent.len());
        }
        let Some(session) = self.session().cloned() else {
            return RemoteWrite::Skipped;
        };

        let storage = &self.storage;
        let write = async {
            for series in session.series() {
                if let Some(series_id) = series.id() {
                    storage
                        .series
                        .update_series_score(series_id, series.score())
                        .await?;
                }
            }
            storage.sessions.update_session(&session).await?;
            if let Some(assessment) = session.self_assessment() {
                storage
                    .assessments
                    .save_assessment(session_id, assessment)
                    .await?;
            }
            Ok::<(), StorageError>(())
        };
        settle("finalize session", within(self.request_timeout, write).await)
    }
}

/// Run one remote write, bounded by `limit`.
async fn within<T>(
    limit: Duration,
    write: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, PersistenceError> {
    match tokio::time::timeout(limit, write).await {
        Ok(result) => result.map_err(PersistenceError::from),
        Err(_) => Err(PersistenceError::Timeout(limit)),
    }
}

fn settle(what: &str, result: Result<(), PersistenceError>) -> RemoteWrite {
    match result {
        Ok(()) => RemoteWrite::Saved,
        Err(err) => failed(what, err),
    }
}

fn failed(what: &str, err: PersistenceError) -> RemoteWrite {
    log::warn!("{what} failed remotely, keeping local state: {err}");
    RemoteWrite::Failed(err)
}

/// 1-based position for storage rows.
fn ordinal(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
