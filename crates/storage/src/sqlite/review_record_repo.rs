use std::collections::HashMap;

use vocab_core::model::{FactId, NewReviewRecord, ReviewRecord, ReviewRecordId, UserId};

use super::{
    SqliteRepository,
    mapping::{BIND_CHUNK, conn, id_i64, map_review_record_row, placeholders, ser, write_err},
};
use crate::repository::{ReviewRecordRepository, StorageError};

const RECORD_COLUMNS: &str = "id, fact_id, user_id, success, next_review_at, created_at";

#[async_trait::async_trait]
impl ReviewRecordRepository for SqliteRepository {
    async fn append_record(&self, record: &NewReviewRecord) -> Result<ReviewRecord, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO review_records (fact_id, user_id, success, next_review_at, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("fact_id", record.fact_id.value())?)
        .bind(id_i64("user_id", record.user_id.value())?)
        .bind(record.success)
        .bind(record.next_review_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(record.clone().assign_id(ReviewRecordId::new(id)))
    }

    async fn latest_record(
        &self,
        user: UserId,
        fact: FactId,
    ) -> Result<Option<ReviewRecord>, StorageError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM review_records
             WHERE user_id = ?1 AND fact_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("user_id", user.value())?)
            .bind(id_i64("fact_id", fact.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_review_record_row).transpose()
    }

    async fn latest_records(
        &self,
        user: UserId,
        facts: &[FactId],
    ) -> Result<HashMap<FactId, ReviewRecord>, StorageError> {
        let user_id = id_i64("user_id", user.value())?;
        let mut latest = HashMap::new();
        for chunk in facts.chunks(BIND_CHUNK) {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM review_records
                 WHERE user_id = ?1 AND fact_id IN ({})
                 ORDER BY fact_id ASC, created_at DESC, id DESC",
                placeholders(2, chunk.len())
            );
            let mut query = sqlx::query(&sql).bind(user_id);
            for fact in chunk {
                query = query.bind(id_i64("fact_id", fact.value())?);
            }
            let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

            // Rows arrive newest first per fact; keep the first one seen.
            for row in &rows {
                let record = map_review_record_row(row)?;
                latest.entry(record.fact_id).or_insert(record);
            }
        }
        Ok(latest)
    }

    async fn records_for_fact(
        &self,
        user: UserId,
        fact: FactId,
    ) -> Result<Vec<ReviewRecord>, StorageError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM review_records
             WHERE user_id = ?1 AND fact_id = ?2
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user.value())?)
            .bind(id_i64("fact_id", fact.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_review_record_row).collect()
    }
}
