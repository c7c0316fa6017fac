use thiserror::Error;

use crate::model::catalog::LanguageCode;
use crate::model::ids::{FamilyId, ListId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScopeError {
    #[error("a multi-list scope needs at least one list")]
    NoLists,

    #[error("lists in one scope must share a language (found {first} and {second})")]
    MixedLanguages {
        first: LanguageCode,
        second: LanguageCode,
    },
}

/// Ephemeral selection of facts a review session draws from.
///
/// Never persisted; it is only a query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every fact of one list.
    List(ListId),
    /// Every fact across several lists of the same language.
    Lists(Vec<ListId>),
    /// Every fact of every list in a family.
    Family(FamilyId),
    /// Every fact the learner owns.
    All,
}

impl Scope {
    /// Reject scopes that are malformed before touching storage.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::NoLists` for an empty multi-list scope.
    pub fn validate(&self) -> Result<(), ScopeError> {
        match self {
            Scope::Lists(ids) if ids.is_empty() => Err(ScopeError::NoLists),
            _ => Ok(()),
        }
    }
}

/// A scope resolved against the catalog for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedScope {
    pub list_ids: Vec<ListId>,
    /// Shared language of the resolved lists, when every tagged list agrees.
    pub language: Option<LanguageCode>,
}

impl ResolvedScope {
    /// Build a resolved scope from `(list, language)` pairs.
    ///
    /// When `require_same_language` is set (multi-list scopes) two different
    /// non-null languages are an error; otherwise the language is only kept if
    /// all tagged lists agree.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::MixedLanguages` when languages conflict and agreement is required.
    pub fn from_lists(
        lists: impl IntoIterator<Item = (ListId, Option<LanguageCode>)>,
        require_same_language: bool,
    ) -> Result<Self, ScopeError> {
        let mut list_ids = Vec::new();
        let mut language: Option<LanguageCode> = None;
        let mut mixed = false;

        for (id, lang) in lists {
            list_ids.push(id);
            let Some(lang) = lang else { continue };
            match &language {
                None => language = Some(lang),
                Some(first) if *first != lang => {
                    if require_same_language {
                        return Err(ScopeError::MixedLanguages {
                            first: first.clone(),
                            second: lang,
                        });
                    }
                    mixed = true;
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            list_ids,
            language: if mixed { None } else { language },
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list_ids.is_empty()
    }
}
