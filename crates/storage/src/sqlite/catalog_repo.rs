use std::collections::BTreeSet;

use vocab_core::model::{Fact, FactId, Family, List, ListId, Scope, UserId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_fact_row, map_list_row, placeholders, write_err},
};
use crate::repository::{CatalogRepository, StorageError};

const LIST_COLUMNS: &str = "l.id, l.family_id, l.name, l.language";

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_family(&self, family: &Family) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO families (id, user_id, name)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    name = excluded.name
            ",
        )
        .bind(id_i64("family_id", family.id.value())?)
        .bind(id_i64("user_id", family.user_id.value())?)
        .bind(&family.name)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn upsert_list(&self, list: &List) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO lists (id, family_id, name, language)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    family_id = excluded.family_id,
                    name = excluded.name,
                    language = excluded.language
            ",
        )
        .bind(id_i64("list_id", list.id.value())?)
        .bind(id_i64("family_id", list.family_id.value())?)
        .bind(&list.name)
        .bind(list.language.as_ref().map(|code| code.as_str().to_owned()))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn upsert_fact(&self, fact: &Fact) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO facts (id, list_id, term, definition, rank, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    -- created_at stays as first inserted
                    list_id = excluded.list_id,
                    term = excluded.term,
                    definition = excluded.definition,
                    rank = excluded.rank
            ",
        )
        .bind(id_i64("fact_id", fact.id().value())?)
        .bind(id_i64("list_id", fact.list_id().value())?)
        .bind(fact.term().to_owned())
        .bind(fact.definition().to_owned())
        .bind(fact.rank())
        .bind(fact.created_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn scope_lists(&self, user: UserId, scope: &Scope) -> Result<Vec<List>, StorageError> {
        let user = id_i64("user_id", user.value())?;

        let rows = match scope {
            Scope::List(id) => {
                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM lists l
                     JOIN families f ON f.id = l.family_id
                     WHERE f.user_id = ?1 AND l.id = ?2"
                );
                let rows = sqlx::query(&sql)
                    .bind(user)
                    .bind(id_i64("list_id", id.value())?)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(conn)?;
                if rows.is_empty() {
                    return Err(StorageError::NotFound);
                }
                rows
            }
            Scope::Lists(ids) => {
                let unique: BTreeSet<ListId> = ids.iter().copied().collect();
                if unique.is_empty() {
                    return Ok(Vec::new());
                }
                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM lists l
                     JOIN families f ON f.id = l.family_id
                     WHERE f.user_id = ?1 AND l.id IN ({})
                     ORDER BY l.id ASC",
                    placeholders(2, unique.len())
                );
                let mut query = sqlx::query(&sql).bind(user);
                for id in &unique {
                    query = query.bind(id_i64("list_id", id.value())?);
                }
                let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
                if rows.len() != unique.len() {
                    return Err(StorageError::NotFound);
                }
                rows
            }
            Scope::Family(family_id) => {
                let family = id_i64("family_id", family_id.value())?;
                sqlx::query("SELECT 1 FROM families WHERE id = ?1 AND user_id = ?2")
                    .bind(family)
                    .bind(user)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(conn)?
                    .ok_or(StorageError::NotFound)?;

                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM lists l
                     WHERE l.family_id = ?1
                     ORDER BY l.id ASC"
                );
                sqlx::query(&sql)
                    .bind(family)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(conn)?
            }
            Scope::All => {
                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM lists l
                     JOIN families f ON f.id = l.family_id
                     WHERE f.user_id = ?1
                     ORDER BY l.id ASC"
                );
                sqlx::query(&sql)
                    .bind(user)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(conn)?
            }
        };

        rows.iter().map(map_list_row).collect()
    }

    async fn facts_for_lists(&self, lists: &[ListId]) -> Result<Vec<Fact>, StorageError> {
        if lists.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, list_id, term, definition, rank, created_at
             FROM facts
             WHERE list_id IN ({})
             ORDER BY rank ASC, created_at ASC, id ASC",
            placeholders(1, lists.len())
        );
        let mut query = sqlx::query(&sql);
        for list in lists {
            query = query.bind(id_i64("list_id", list.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_fact_row).collect()
    }

    async fn owned_fact(&self, user: UserId, fact: FactId) -> Result<Fact, StorageError> {
        let row = sqlx::query(
            r"
                SELECT fa.id, fa.list_id, fa.term, fa.definition, fa.rank, fa.created_at
                FROM facts fa
                JOIN lists l ON l.id = fa.list_id
                JOIN families f ON f.id = l.family_id
                WHERE fa.id = ?1 AND f.user_id = ?2
            ",
        )
        .bind(id_i64("fact_id", fact.value())?)
        .bind(id_i64("user_id", user.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_fact_row(&row)
    }
}
