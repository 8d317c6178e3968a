use arco_core::SessionTracker;
use arco_core::model::{
    Arrow, AssessmentCategory, HitPoint, OwnerId, Score, SelfAssessmentDraft, SeriesId, Session,
    SessionConfigDraft, SessionId,
};
use arco_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{
    ArrowRepository, AssessmentRepository, SeriesRepository, SessionRepository, Storage,
    StorageError,
};
use storage::sqlite::SqliteRepository;

fn finished_session(owner: OwnerId, days_ago: i64) -> Session {
    let at = fixed_now() - Duration::days(days_ago);
    let draft = SessionConfigDraft::new(at.date_naive())
        .with_series(2, 3)
        .with_goal(Some(40));
    let mut tracker = SessionTracker::start(draft, owner, at).unwrap();
    for arrow in [
        Arrow::at(HitPoint::new(140.0, 140.0)),
        Arrow::manual(Score::new(9).unwrap()),
        Arrow::manual(Score::new(8).unwrap()),
    ] {
        tracker.register_arrow(arrow).unwrap();
    }
    tracker.advance_to_next_series().unwrap();
    for _ in 0..3 {
        tracker
            .register_arrow(Arrow::manual(Score::new(5).unwrap()))
            .unwrap();
    }
    let assessment = SelfAssessmentDraft::uniform(7)
        .with(AssessmentCategory::Release, 3)
        .validate()
        .unwrap();
    tracker
        .finalize(Some("  steady wind  ".into()), Some(assessment))
        .unwrap()
        .clone()
}

#[tokio::test]
async fn sqlite_roundtrip_rebuilds_full_session() {
    let storage = Storage::sqlite("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    let owner = OwnerId::random();
    let original = finished_session(owner, 0);

    let id = storage.insert_full_session(&original).await.expect("insert");
    let loaded = storage.sessions.get_session(id).await.expect("fetch");

    assert_eq!(loaded.id(), Some(id));
    assert_eq!(loaded.total_score(), 42);
    assert_eq!(loaded.best_series(), Some(27));
    assert_eq!(loaded.notes(), Some("steady wind"));
    assert!(loaded.is_completed());
    assert!(loaded.goal_reached());
    assert_eq!(
        loaded.series()[0].arrows()[0].position,
        Some(HitPoint::new(140.0, 140.0))
    );
    assert_eq!(loaded.series()[0].arrows()[1].position, None);
    assert_eq!(
        loaded
            .self_assessment()
            .map(|a| a.rating(AssessmentCategory::Release)),
        Some(3)
    );
}

#[tokio::test]
async fn sqlite_lists_newest_first_and_scopes_by_owner() {
    let storage = Storage::sqlite("sqlite:file:memdb_listing?mode=memory&cache=shared")
        .await
        .expect("connect");
    let owner = OwnerId::random();
    let older = storage
        .insert_full_session(&finished_session(owner, 10))
        .await
        .unwrap();
    let newer = storage
        .insert_full_session(&finished_session(owner, 1))
        .await
        .unwrap();
    storage
        .insert_full_session(&finished_session(OwnerId::random(), 0))
        .await
        .unwrap();

    let ids: Vec<SessionId> = storage
        .sessions
        .list_sessions(owner)
        .await
        .unwrap()
        .iter()
        .filter_map(Session::id)
        .collect();
    assert_eq!(ids, vec![newer, older]);
}

#[tokio::test]
async fn sqlite_updates_arrows_and_headers() {
    let storage = Storage::sqlite("sqlite:file:memdb_updates?mode=memory&cache=shared")
        .await
        .expect("connect");

    let id = storage
        .insert_full_session(&finished_session(OwnerId::random(), 0))
        .await
        .unwrap();
    let mut session = storage.sessions.get_session(id).await.unwrap();
    let arrow_id = session.series()[1].arrows()[2].id.unwrap();
    let series_id = session.series()[1].id().unwrap();

    session
        .replace_arrow(1, 2, Arrow::manual(Score::MAX))
        .unwrap();
    storage
        .arrows
        .update_arrow(arrow_id, &session.series()[1].arrows()[2])
        .await
        .unwrap();
    storage
        .series
        .update_series_score(series_id, session.series()[1].score())
        .await
        .unwrap();
    session.set_notes(Some("edited".into()));
    storage.sessions.update_session(&session).await.unwrap();

    let reloaded = storage.sessions.get_session(id).await.unwrap();
    assert_eq!(reloaded.total_score(), 47);
    assert_eq!(reloaded.series()[1].score(), 20);
    assert_eq!(reloaded.notes(), Some("edited"));
}

#[tokio::test]
async fn sqlite_delete_cascades_to_children() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_cascade?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let owner = OwnerId::random();
    let session = finished_session(owner, 0);
    let id = repo.create_session(&session).await.unwrap();
    let series = repo.create_series(id, 1, 10).await.unwrap();
    repo.create_arrow(series, 1, &Arrow::manual(Score::MAX))
        .await
        .unwrap();
    repo.save_assessment(id, session.self_assessment().unwrap())
        .await
        .unwrap();

    repo.delete_session(id).await.unwrap();

    assert!(matches!(
        repo.get_session(id).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.update_series_score(series, 0).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.delete_session(id).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_rejects_orphans() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_orphans?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(matches!(
        repo.create_series(SessionId::new(404), 1, 0).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.create_arrow(SeriesId::new(404), 1, &Arrow::miss()).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_assessment_upsert_replaces_ratings() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_assessment?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let id = repo
        .create_session(&finished_session(OwnerId::random(), 0))
        .await
        .unwrap();
    for value in [4, 9] {
        let assessment = SelfAssessmentDraft::uniform(value).validate().unwrap();
        repo.save_assessment(id, &assessment).await.unwrap();
    }

    let loaded = repo.get_session(id).await.unwrap();
    assert_eq!(
        loaded
            .self_assessment()
            .map(|a| a.rating(AssessmentCategory::Focus)),
        Some(9)
    );
}
