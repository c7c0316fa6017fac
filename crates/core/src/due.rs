//! Due-set rule: which facts of a scope are eligible for review at an instant.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::{DueState, Fact, FactId, ReviewRecord};

/// Sort candidates into the stable review order `(rank, created_at, id)`.
pub fn sort_for_review(facts: &mut [Fact]) {
    facts.sort_by_key(Fact::order_key);
}

/// Keep the facts that are due at `now`, in stable review order.
///
/// `latest` maps a fact to its most recent review record; a fact missing from the
/// map has never been reviewed and is always due.
#[must_use]
pub fn filter_due(
    mut facts: Vec<Fact>,
    latest: &HashMap<FactId, ReviewRecord>,
    now: DateTime<Utc>,
) -> Vec<Fact> {
    sort_for_review(&mut facts);
    facts.retain(|fact| DueState::at(latest.get(&fact.id()), now).is_due());
    facts
}

/// Reduce a history of records to the latest one per fact.
#[must_use]
pub fn latest_by_fact<'a, I>(records: I) -> HashMap<FactId, ReviewRecord>
where
    I: IntoIterator<Item = &'a ReviewRecord>,
{
    let mut latest: HashMap<FactId, ReviewRecord> = HashMap::new();
    for record in records {
        match latest.get(&record.fact_id) {
            Some(current) if current.recency_key() >= record.recency_key() => {}
            _ => {
                latest.insert(record.fact_id, record.clone());
            }
        }
    }
    latest
}
