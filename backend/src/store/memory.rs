//! Process-local store.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{query, stamp_key, Filter, NaturalKey, RecordStore, SortKey, UpsertOutcome};
use crate::error::{StoreError, StoreResult};
use crate::models::RecordKind;

/// Documents of one kind keyed by `(lowercased identity, identity)`, so a
/// prefix on the leading key field is a range scan.
type Collection = BTreeMap<(String, String), Value>;
type Collections = HashMap<RecordKind, Collection>;

/// In-memory store. Also serves as the index of [`super::JsonFileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document by identity, without key checks.
    pub(crate) fn put(&self, kind: RecordKind, identity: String, doc: Value) -> StoreResult<UpsertOutcome> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let slot = (identity.to_lowercase(), identity);
        let previous = collections.entry(kind).or_default().insert(slot, doc);
        Ok(if previous.is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Created
        })
    }
}

/// Documents that can match `filter`. Only the slots under the filter's lead
/// prefix are visited when it has one.
fn candidates<'c>(collection: &'c Collection, kind: RecordKind, filter: &Filter) -> Vec<&'c Value> {
    match filter.lead_prefix(kind.lead_key_field()) {
        Some(prefix) => collection
            .range((prefix.clone(), String::new())..)
            .take_while(|((folded, _), _)| folded.starts_with(&prefix))
            .map(|(_, doc)| doc)
            .collect(),
        None => collection.values().collect(),
    }
}

impl RecordStore for MemoryStore {
    fn upsert_by_key(&self, kind: RecordKind, key: &NaturalKey, doc: Value) -> StoreResult<UpsertOutcome> {
        key.check(kind)?;
        self.put(kind, key.identity(), stamp_key(key, doc))
    }

    fn find_by_filter(
        &self,
        kind: RecordKind,
        filter: &Filter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let docs = collections
            .get(&kind)
            .map(|c| candidates(c, kind, filter))
            .unwrap_or_default();
        query(docs, filter, sort, limit)
    }

    fn clear(&self, kind: RecordKind) -> StoreResult<usize> {
        let mut collections = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.remove(&kind).map_or(0, |c| c.len()))
    }

    fn count(&self, kind: RecordKind) -> StoreResult<usize> {
        let collections = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(&kind).map_or(0, |c| c.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_creates_then_replaces() {
        let store = MemoryStore::new();
        let key = NaturalKey::single("url", "u1");

        let first = store
            .upsert_by_key(RecordKind::Fighters, &key, json!({"name": "A", "nickname": "x"}))
            .unwrap();
        let second = store
            .upsert_by_key(RecordKind::Fighters, &key, json!({"name": "B"}))
            .unwrap();

        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(second, UpsertOutcome::Replaced);
        assert_eq!(store.count(RecordKind::Fighters).unwrap(), 1);

        // Replace, not merge: the old nickname is gone
        let docs = store
            .find_by_filter(RecordKind::Fighters, &key.to_filter(), &[], None)
            .unwrap();
        assert_eq!(docs[0], json!({"url": "u1", "name": "B"}));
    }

    #[test]
    fn test_kinds_are_separate() {
        let store = MemoryStore::new();
        store
            .upsert_by_key(RecordKind::Events, &NaturalKey::single("eventId", "e1"), json!({}))
            .unwrap();
        assert_eq!(store.count(RecordKind::Events).unwrap(), 1);
        assert_eq!(store.count(RecordKind::Fighters).unwrap(), 0);
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        let err = store
            .upsert_by_key(RecordKind::Fighters, &NaturalKey::single("url", ""), json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
        assert_eq!(store.count(RecordKind::Fighters).unwrap(), 0);
    }

    #[test]
    fn test_clear_returns_removed_count() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store
                .upsert_by_key(RecordKind::Events, &NaturalKey::single("eventId", id), json!({}))
                .unwrap();
        }
        assert_eq!(store.clear(RecordKind::Events).unwrap(), 3);
        assert_eq!(store.clear(RecordKind::Events).unwrap(), 0);
    }

    #[test]
    fn test_prefix_lookup_visits_one_event() {
        let store = MemoryStore::new();
        for (fight, name) in [("UFC300_1", "Alex Pereira"), ("ufc300_1", "Jamahal Hill"), ("UFC3001_1", "X"), ("UFC30_1", "Y")] {
            let key = NaturalKey::compound([("fightId", fight), ("fighterName", name)]);
            store.upsert_by_key(RecordKind::FightStats, &key, json!({})).unwrap();
        }

        let collections = store.collections.read().unwrap();
        let collection = &collections[&RecordKind::FightStats];
        let filter = Filter::prefix_ci("fightId", "Ufc300_");
        assert_eq!(candidates(collection, RecordKind::FightStats, &filter).len(), 2);
        assert_eq!(candidates(collection, RecordKind::FightStats, &Filter::All).len(), 4);
        drop(collections);

        let found = store
            .find_by_filter(RecordKind::FightStats, &filter, &[SortKey::asc("fighterName")], None)
            .unwrap();
        let names: Vec<&str> = found.iter().filter_map(|d| d["fighterName"].as_str()).collect();
        assert_eq!(names, vec!["Alex Pereira", "Jamahal Hill"]);
    }

    #[test]
    fn test_identities_differing_in_case_stay_apart() {
        let store = MemoryStore::new();
        for url in ["http://f/A", "http://f/a"] {
            store
                .upsert_by_key(RecordKind::Fighters, &NaturalKey::single("url", url), json!({}))
                .unwrap();
        }
        assert_eq!(store.count(RecordKind::Fighters).unwrap(), 2);

        let found = store
            .find_by_filter(RecordKind::Fighters, &Filter::eq("url", "http://f/a"), &[], None)
            .unwrap();
        assert_eq!(found, vec![json!({"url": "http://f/a"})]);
    }
}
