use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies the versioned schema migrations that have not run yet.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: sessions, series, arrows, self-assessments.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY,
                    owner TEXT NOT NULL,
                    session_date TEXT NOT NULL,
                    series_count INTEGER NOT NULL CHECK (series_count > 0),
                    arrows_per_series INTEGER NOT NULL CHECK (arrows_per_series > 0),
                    distance INTEGER NOT NULL CHECK (distance > 0),
                    goal INTEGER CHECK (goal IS NULL OR goal > 0),
                    total_score INTEGER NOT NULL DEFAULT 0 CHECK (total_score >= 0),
                    best_series INTEGER CHECK (best_series IS NULL OR best_series >= 0),
                    notes TEXT,
                    completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS series (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    number INTEGER NOT NULL CHECK (number >= 1),
                    score INTEGER NOT NULL DEFAULT 0 CHECK (score >= 0),
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS arrows (
                    id INTEGER PRIMARY KEY,
                    series_id INTEGER NOT NULL,
                    ord INTEGER NOT NULL CHECK (ord >= 1),
                    score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 10),
                    x REAL,
                    y REAL,
                    FOREIGN KEY (series_id) REFERENCES series(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS self_assessments (
                    session_id INTEGER PRIMARY KEY,
                    posture INTEGER NOT NULL CHECK (posture BETWEEN 0 AND 10),
                    anchoring INTEGER NOT NULL CHECK (anchoring BETWEEN 0 AND 10),
                    alignment INTEGER NOT NULL CHECK (alignment BETWEEN 0 AND 10),
                    breathing INTEGER NOT NULL CHECK (breathing BETWEEN 0 AND 10),
                    aiming INTEGER NOT NULL CHECK (aiming BETWEEN 0 AND 10),
                    release INTEGER NOT NULL CHECK (release BETWEEN 0 AND 10),
                    follow_through INTEGER NOT NULL CHECK (follow_through BETWEEN 0 AND 10),
                    consistency INTEGER NOT NULL CHECK (consistency BETWEEN 0 AND 10),
                    rhythm INTEGER NOT NULL CHECK (rhythm BETWEEN 0 AND 10),
                    focus INTEGER NOT NULL CHECK (focus BETWEEN 0 AND 10),
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_owner_date
                    ON sessions (owner, session_date, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_series_session_number
                    ON series (session_id, number);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_arrows_series_ord
                    ON arrows (series_id, ord);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
