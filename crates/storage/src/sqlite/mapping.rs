use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use vocab_core::model::{
    Direction, Fact, FactId, FamilyId, LanguageCode, List, ListId, ReviewRecord, ReviewRecordId,
    SessionMode, SessionSummary, SessionSummaryId, UserId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a failed write; a missing parent row surfaces as `NotFound`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Ids bound per `IN (…)` query; stays well under SQLite's host-parameter limit.
pub(crate) const BIND_CHUNK: usize = 500;

/// `?1, ?2, …` placeholders for an `IN (…)` clause starting after `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn language_from(raw: Option<String>) -> Result<Option<LanguageCode>, StorageError> {
    raw.map(LanguageCode::new).transpose().map_err(ser)
}

pub(crate) fn map_list_row(row: &SqliteRow) -> Result<List, StorageError> {
    List::new(
        ListId::new(i64_to_u64("list_id", row.try_get("id").map_err(ser)?)?),
        FamilyId::new(i64_to_u64("family_id", row.try_get("family_id").map_err(ser)?)?),
        row.try_get::<String, _>("name").map_err(ser)?,
        language_from(row.try_get("language").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_fact_row(row: &SqliteRow) -> Result<Fact, StorageError> {
    Fact::new(
        FactId::new(i64_to_u64("fact_id", row.try_get("id").map_err(ser)?)?),
        ListId::new(i64_to_u64("list_id", row.try_get("list_id").map_err(ser)?)?),
        row.try_get::<String, _>("term").map_err(ser)?,
        row.try_get::<String, _>("definition").map_err(ser)?,
        row.try_get("rank").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_review_record_row(row: &SqliteRow) -> Result<ReviewRecord, StorageError> {
    Ok(ReviewRecord {
        id: ReviewRecordId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        fact_id: FactId::new(i64_to_u64("fact_id", row.try_get("fact_id").map_err(ser)?)?),
        user_id: UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        success: row.try_get("success").map_err(ser)?,
        next_review_at: row.try_get("next_review_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

/// Rebuild a summary; any error here marks the row as malformed rather than failing the query.
pub(crate) fn map_summary_row(row: &SqliteRow) -> Result<SessionSummary, StorageError> {
    let mode: SessionMode = row
        .try_get::<String, _>("mode")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let direction: Direction = row
        .try_get::<String, _>("direction")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
    let ended_at: DateTime<Utc> = row.try_get("ended_at").map_err(ser)?;
    let duration_seconds = i64_to_u64(
        "duration_seconds",
        row.try_get("duration_seconds").map_err(ser)?,
    )?;

    SessionSummary::from_persisted(
        SessionSummaryId::new(i64_to_u64("id", row.try_get("id").map_err(ser)?)?),
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        mode,
        direction,
        language_from(row.try_get("language").map_err(ser)?)?,
        started_at,
        ended_at,
        duration_seconds,
        u32_from_i64("words_seen", row.try_get("words_seen").map_err(ser)?)?,
        u32_from_i64("words_retained", row.try_get("words_retained").map_err(ser)?)?,
        u32_from_i64("words_written", row.try_get("words_written").map_err(ser)?)?,
    )
    .map_err(ser)
}
