use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{FactId, FamilyId, ListId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("language code cannot be empty")]
    EmptyLanguage,

    #[error("language code contains invalid characters: {0}")]
    InvalidLanguage(String),

    #[error("term cannot be empty")]
    EmptyTerm,

    #[error("definition cannot be empty")]
    EmptyDefinition,

    #[error("name cannot be empty")]
    EmptyName,
}

//
// ─── LANGUAGE ──────────────────────────────────────────────────────────────────
//

/// ISO 639-3 style language code attached to lists and sessions (e.g. `eng`, `fra`).
///
/// Stored lowercase and trimmed so set-membership filters compare reliably.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyLanguage` for blank input and
    /// `CatalogError::InvalidLanguage` for anything that is not ASCII letters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CatalogError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CatalogError::EmptyLanguage);
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CatalogError::InvalidLanguage(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageCode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

//
// ─── FAMILY / LIST ─────────────────────────────────────────────────────────────
//

/// Top-level grouping of lists; the root of the ownership chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    pub id: FamilyId,
    pub user_id: UserId,
    pub name: String,
}

impl Family {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` if the name is blank.
    pub fn new(id: FamilyId, user_id: UserId, name: impl Into<String>) -> Result<Self, CatalogError> {
        let name = non_blank(name.into()).ok_or(CatalogError::EmptyName)?;
        Ok(Self { id, user_id, name })
    }
}

/// A named list of facts inside a family, optionally tagged with its language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub id: ListId,
    pub family_id: FamilyId,
    pub name: String,
    pub language: Option<LanguageCode>,
}

impl List {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyName` if the name is blank.
    pub fn new(
        id: ListId,
        family_id: FamilyId,
        name: impl Into<String>,
        language: Option<LanguageCode>,
    ) -> Result<Self, CatalogError> {
        let name = non_blank(name.into()).ok_or(CatalogError::EmptyName)?;
        Ok(Self {
            id,
            family_id,
            name,
            language,
        })
    }
}

//
// ─── FACT ──────────────────────────────────────────────────────────────────────
//

/// A single term/definition pair to be learned.
///
/// `rank` is the display order inside its list; `created_at` breaks rank ties so
/// manually entered order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    id: FactId,
    list_id: ListId,
    term: String,
    definition: String,
    rank: i64,
    created_at: DateTime<Utc>,
}

impl Fact {
    /// Build a fact, trimming term and definition.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTerm` / `CatalogError::EmptyDefinition` for blank text.
    pub fn new(
        id: FactId,
        list_id: ListId,
        term: impl Into<String>,
        definition: impl Into<String>,
        rank: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        let term = non_blank(term.into()).ok_or(CatalogError::EmptyTerm)?;
        let definition = non_blank(definition.into()).ok_or(CatalogError::EmptyDefinition)?;
        Ok(Self {
            id,
            list_id,
            term,
            definition,
            rank,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> FactId {
        self.id
    }

    #[must_use]
    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    #[must_use]
    pub fn rank(&self) -> i64 {
        self.rank
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Deterministic display/review order: `(rank, created_at, id)`.
    #[must_use]
    pub fn order_key(&self) -> (i64, DateTime<Utc>, FactId) {
        (self.rank, self.created_at, self.id)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
