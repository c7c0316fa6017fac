use sqlx::Row;
use vocab_core::model::{LanguageCode, SessionSummary, SessionSummaryDraft, SessionSummaryId, UserId};
use vocab_core::progress::LanguageFilter;
use vocab_core::time::Window;

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_summary_row, placeholders, ser, write_err},
};
use crate::repository::{MalformedRow, SessionSummaryRepository, StorageError, StoredSummary};

const SUMMARY_COLUMNS: &str = "id, user_id, mode, direction, language, started_at, ended_at, \
     duration_seconds, words_seen, words_retained, words_written";

/// `WHERE` clause for user + window, numbering placeholders from `?1`.
fn window_clause(window: &Window) -> (String, usize) {
    let mut sql = String::from("user_id = ?1");
    let mut next = 2;
    if window.start.is_some() {
        sql.push_str(&format!(" AND started_at >= ?{next}"));
        next += 1;
    }
    sql.push_str(&format!(" AND started_at <= ?{next}"));
    next += 1;
    (sql, next)
}

#[async_trait::async_trait]
impl SessionSummaryRepository for SqliteRepository {
    async fn append_summary(
        &self,
        draft: &SessionSummaryDraft,
    ) -> Result<SessionSummary, StorageError> {
        let duration = i64::try_from(draft.duration_seconds()).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO session_summaries (
                    user_id, mode, direction, language, started_at, ended_at,
                    duration_seconds, words_seen, words_retained, words_written
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(id_i64("user_id", draft.user_id().value())?)
        .bind(draft.mode().as_str())
        .bind(draft.direction().as_str())
        .bind(draft.language().map(|code| code.as_str().to_owned()))
        .bind(draft.started_at())
        .bind(draft.ended_at())
        .bind(duration)
        .bind(i64::from(draft.words_seen()))
        .bind(i64::from(draft.words_retained()))
        .bind(i64::from(draft.words_written()))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(draft.clone().assign_id(SessionSummaryId::new(id)))
    }

    async fn list_summaries(
        &self,
        user: UserId,
        window: &Window,
        languages: &LanguageFilter,
    ) -> Result<Vec<StoredSummary>, StorageError> {
        let (mut clause, next) = window_clause(window);
        let codes: Vec<String> = languages.iter().map(|c| c.as_str().to_owned()).collect();
        if !codes.is_empty() {
            clause.push_str(&format!(
                " AND language IN ({})",
                placeholders(next, codes.len())
            ));
        }
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM session_summaries
             WHERE {clause}
             ORDER BY started_at ASC, id ASC"
        );

        let mut query = sqlx::query(&sql).bind(id_i64("user_id", user.value())?);
        if let Some(start) = window.start {
            query = query.bind(start);
        }
        query = query.bind(window.end);
        for code in codes {
            query = query.bind(code);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let row_id: i64 = row.try_get("id").map_err(ser)?;
            out.push(map_summary_row(row).map_err(|e| MalformedRow {
                row_id,
                reason: e.to_string(),
            }));
        }
        Ok(out)
    }

    async fn distinct_languages(
        &self,
        user: UserId,
        window: &Window,
    ) -> Result<Vec<LanguageCode>, StorageError> {
        let (clause, _) = window_clause(window);
        let sql = format!(
            "SELECT DISTINCT language FROM session_summaries
             WHERE {clause} AND language IS NOT NULL
             ORDER BY language ASC"
        );

        let mut query = sqlx::query(&sql).bind(id_i64("user_id", user.value())?);
        if let Some(start) = window.start {
            query = query.bind(start);
        }
        query = query.bind(window.end);

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        // Unreadable codes are left out rather than failing the whole report.
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw: String = row.try_get("language").map_err(ser)?;
            if let Ok(code) = LanguageCode::new(raw) {
                out.push(code);
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    async fn get_summary(&self, id: SessionSummaryId) -> Result<SessionSummary, StorageError> {
        let sql = format!("SELECT {SUMMARY_COLUMNS} FROM session_summaries WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("summary_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_summary_row(&row)
    }
}
