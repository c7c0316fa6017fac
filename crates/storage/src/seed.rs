//! Demo catalog used by the `seed` CLI command.

use chrono::{DateTime, Duration, Utc};
use vocab_core::model::{
    Direction, Fact, FactId, Family, FamilyId, LanguageCode, List, ListId, SessionMode,
    SessionSummaryDraft, UserId,
};

use crate::repository::{Storage, StorageError};

const FRENCH: &[(&str, &str)] = &[
    ("bonjour", "hello"),
    ("merci", "thank you"),
    ("s'il vous plaît", "please"),
    ("au revoir", "goodbye"),
    ("élève", "pupil"),
];

const GERMAN: &[(&str, &str)] = &[
    ("Hallo", "hello"),
    ("Danke", "thank you"),
    ("Bitte", "please"),
    ("Tschüss", "bye"),
];

/// Past sessions generated when the caller does not ask for a count.
pub const DEFAULT_SUMMARIES: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub family_id: FamilyId,
    pub lists: u32,
    pub facts: u32,
    pub summaries: u32,
}

/// Upsert a demo family with a French and a German list for `user`.
///
/// Ids are derived from the user id so several learners can be seeded side by side.
/// `summaries` past sessions are appended, one every other day before `now`.
///
/// # Errors
///
/// Returns `StorageError` if any write fails, or `StorageError::Serialization`
/// if the demo data does not validate.
pub async fn seed_demo(
    storage: &Storage,
    user: UserId,
    summaries: u32,
    now: DateTime<Utc>,
) -> Result<SeedReport, StorageError> {
    let base = user.value().saturating_mul(100);
    let invalid = |e: vocab_core::model::CatalogError| StorageError::Serialization(e.to_string());

    let family_id = FamilyId::new(base + 1);
    storage
        .catalog
        .upsert_family(&Family::new(family_id, user, "Travel").map_err(invalid)?)
        .await?;

    let mut facts = 0_u32;
    let mut lists = 0_u32;
    for (offset, (name, code, pairs)) in [("French basics", "fra", FRENCH), ("German basics", "deu", GERMAN)]
        .into_iter()
        .enumerate()
    {
        let list_id = ListId::new(base + 1 + offset as u64);
        let language = LanguageCode::new(code).map_err(invalid)?;
        storage
            .catalog
            .upsert_list(&List::new(list_id, family_id, name, Some(language)).map_err(invalid)?)
            .await?;
        lists += 1;

        for (rank, (term, definition)) in pairs.iter().enumerate() {
            let fact_id = FactId::new(list_id.value() * 1000 + rank as u64 + 1);
            let rank = i64::try_from(rank).unwrap_or(i64::MAX);
            let fact =
                Fact::new(fact_id, list_id, *term, *definition, rank, now).map_err(invalid)?;
            storage.catalog.upsert_fact(&fact).await?;
            facts += 1;
        }
    }

    let french = LanguageCode::new("fra").map_err(invalid)?;
    for i in 0..summaries {
        let started_at = now - Duration::days(i64::from(i) * 2) - Duration::minutes(15);
        let mode = if i % 2 == 0 {
            SessionMode::Flashcard
        } else {
            SessionMode::Dictation
        };
        let written = if mode == SessionMode::Dictation { 4 } else { 0 };
        let draft = SessionSummaryDraft::new(
            user,
            mode,
            Direction::ForeignToNative,
            Some(french.clone()),
            started_at,
            started_at + Duration::minutes(6),
            5,
            3,
            written,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        storage.summaries.append_summary(&draft).await?;
    }

    Ok(SeedReport {
        family_id,
        lists,
        facts,
        summaries,
    })
}
