use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS families (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lists (
            id INTEGER PRIMARY KEY,
            family_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            language TEXT,
            FOREIGN KEY (family_id) REFERENCES families(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS facts (
            id INTEGER PRIMARY KEY,
            list_id INTEGER NOT NULL,
            term TEXT NOT NULL,
            definition TEXT NOT NULL,
            rank INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (list_id) REFERENCES lists(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS review_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fact_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            success INTEGER NOT NULL CHECK (success IN (0, 1)),
            next_review_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS session_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            mode TEXT NOT NULL,
            direction TEXT NOT NULL,
            language TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            words_seen INTEGER NOT NULL,
            words_retained INTEGER NOT NULL,
            words_written INTEGER NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lists_family ON lists(family_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_facts_list_rank
            ON facts(list_id, rank, created_at, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_review_records_user_fact_created
            ON review_records(user_id, fact_id, created_at, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_session_summaries_user_started
            ON session_summaries(user_id, started_at);
    ",
];

/// Runs the schema migrations that have not been applied yet.
///
/// Review records and summaries use `AUTOINCREMENT` so ids are never reused and
/// keep increasing with insertion order.
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

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1.iter().copied() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

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
        debug!(version = 1, "applied schema migration");
    }

    Ok(())
}
