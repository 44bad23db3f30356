//! Record stores keyed by natural key.
//!
//! A store holds one collection of JSON documents per [`RecordKind`]. Writes
//! go through [`RecordStore::upsert_by_key`], which creates the document or
//! replaces it whole; reads go through [`RecordStore::find_by_filter`].
//!
//! - [`MemoryStore`] - process-local, used by tests and dry runs
//! - [`JsonFileStore`] - one JSON file per document on disk

pub mod json_file;
pub mod memory;

use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{StoreError, StoreResult};
use crate::models::RecordKind;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

// =============================================================================
// Keys and documents
// =============================================================================

/// Separator between compound key parts in a document identity.
const KEY_PART_SEPARATOR: char = '\u{1f}';

/// Domain identifier of a document: one or more `(field, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    parts: Vec<(String, String)>,
}

impl NaturalKey {
    pub fn single(field: &str, value: &str) -> Self {
        Self {
            parts: vec![(field.to_string(), value.to_string())],
        }
    }

    pub fn compound<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            parts: parts
                .into_iter()
                .map(|(f, v)| (f.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn parts(&self) -> &[(String, String)] {
        &self.parts
    }

    /// First key field whose value is empty, if any.
    pub fn first_empty_field(&self) -> Option<&str> {
        self.parts
            .iter()
            .find(|(_, v)| v.trim().is_empty())
            .map(|(f, _)| f.as_str())
    }

    /// Stable string form, unique per key.
    pub fn identity(&self) -> String {
        self.parts
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(&KEY_PART_SEPARATOR.to_string())
    }

    /// Exact-match filter selecting this key.
    pub fn to_filter(&self) -> Filter {
        Filter::And(
            self.parts
                .iter()
                .map(|(f, v)| Filter::eq(f, Value::String(v.clone())))
                .collect(),
        )
    }

    fn check(&self, kind: RecordKind) -> StoreResult<()> {
        if self.parts.is_empty() {
            return Err(StoreError::InvalidKey {
                kind,
                message: "no key fields".to_string(),
            });
        }
        match self.first_empty_field() {
            Some(field) => Err(StoreError::InvalidKey {
                kind,
                message: format!("empty '{}'", field),
            }),
            None => Ok(()),
        }
    }
}

/// A typed record that lives in a store collection.
pub trait Document: Serialize + DeserializeOwned {
    const KIND: RecordKind;

    fn natural_key(&self) -> NaturalKey;
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

// =============================================================================
// Filters and sorting
// =============================================================================

/// Document filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document
    All,
    /// Field equals value exactly
    Eq { field: String, value: Value },
    /// String field starts with prefix
    Prefix {
        field: String,
        prefix: String,
        case_insensitive: bool,
    },
    /// String field contains substring
    Contains {
        field: String,
        needle: String,
        case_insensitive: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Case-insensitive prefix match.
    pub fn prefix_ci(field: &str, prefix: &str) -> Self {
        Self::Prefix {
            field: field.to_string(),
            prefix: prefix.to_string(),
            case_insensitive: true,
        }
    }

    /// Case-insensitive substring match.
    pub fn contains_ci(field: &str, needle: &str) -> Self {
        Self::Contains {
            field: field.to_string(),
            needle: needle.to_string(),
            case_insensitive: true,
        }
    }

    fn compile(&self) -> StoreResult<CompiledFilter> {
        let compile_pattern = |field: &str, pattern: String, ci: bool| {
            RegexBuilder::new(&pattern)
                .case_insensitive(ci)
                .build()
                .map(|re| CompiledFilter::Pattern(field.to_string(), re))
                .map_err(|e| StoreError::InvalidFilter(e.to_string()))
        };

        match self {
            Self::All => Ok(CompiledFilter::All),
            Self::Eq { field, value } => Ok(CompiledFilter::Eq(field.clone(), value.clone())),
            Self::Prefix { field, prefix, case_insensitive } => Ok(CompiledFilter::Prefix {
                field: field.clone(),
                prefix: if *case_insensitive { prefix.to_lowercase() } else { prefix.clone() },
                case_insensitive: *case_insensitive,
            }),
            Self::Contains { field, needle, case_insensitive } => {
                compile_pattern(field.as_str(), regex::escape(needle), *case_insensitive)
            }
            Self::And(filters) => Ok(CompiledFilter::And(
                filters.iter().map(Filter::compile).collect::<StoreResult<_>>()?,
            )),
            Self::Or(filters) => Ok(CompiledFilter::Or(
                filters.iter().map(Filter::compile).collect::<StoreResult<_>>()?,
            )),
        }
    }

    /// Lowercased ASCII prefix that `field` must start with for a document
    /// to match, when the filter pins one down.
    fn lead_prefix(&self, field: &str) -> Option<String> {
        let ascii_lower = |s: &str| s.is_ascii().then(|| s.to_ascii_lowercase());
        match self {
            Self::Prefix { field: f, prefix, .. } if f == field => ascii_lower(prefix),
            Self::Eq { field: f, value: Value::String(v) } if f == field => ascii_lower(v),
            Self::And(filters) => filters.iter().find_map(|f| f.lead_prefix(field)),
            _ => None,
        }
    }
}

enum CompiledFilter {
    All,
    Eq(String, Value),
    /// `prefix` is already lowercased when case-insensitive
    Prefix {
        field: String,
        prefix: String,
        case_insensitive: bool,
    },
    Pattern(String, Regex),
    And(Vec<CompiledFilter>),
    Or(Vec<CompiledFilter>),
}

impl CompiledFilter {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => doc.get(field) == Some(value),
            Self::Prefix { field, prefix, case_insensitive } => doc
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| {
                    if *case_insensitive {
                        s.to_lowercase().starts_with(prefix.as_str())
                    } else {
                        s.starts_with(prefix.as_str())
                    }
                }),
            Self::Pattern(field, re) => doc
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| re.is_match(s)),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), descending: false }
    }

    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), descending: true }
    }
}

/// Missing and null sort first; numbers compare numerically, strings
/// lexicographically.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Filter, sort (stable) and limit candidate documents.
fn query<'a>(
    docs: impl IntoIterator<Item = &'a Value>,
    filter: &Filter,
    sort: &[SortKey],
    limit: Option<usize>,
) -> StoreResult<Vec<Value>> {
    let compiled = filter.compile()?;
    let mut found: Vec<Value> = docs
        .into_iter()
        .filter(|doc| compiled.matches(doc))
        .cloned()
        .collect();

    if !sort.is_empty() {
        found.sort_by(|a, b| {
            sort.iter()
                .map(|key| {
                    let ord = compare_values(a.get(&key.field), b.get(&key.field));
                    if key.descending { ord.reverse() } else { ord }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    if let Some(limit) = limit {
        found.truncate(limit);
    }
    Ok(found)
}

/// Key fields are always written into the stored document, like an upsert
/// filter is applied on insert.
fn stamp_key(key: &NaturalKey, mut doc: Value) -> Value {
    if let Value::Object(ref mut obj) = doc {
        for (field, value) in key.parts() {
            obj.insert(field.clone(), Value::String(value.clone()));
        }
    }
    doc
}

// =============================================================================
// Store trait
// =============================================================================

/// Persistent document store.
///
/// Each call is atomic per document; there are no multi-document
/// transactions.
pub trait RecordStore: Send + Sync {
    /// Create the document for `key`, or replace every field of the existing
    /// one.
    fn upsert_by_key(&self, kind: RecordKind, key: &NaturalKey, doc: Value) -> StoreResult<UpsertOutcome>;

    /// Documents matching `filter`, sorted by `sort`, at most `limit`.
    fn find_by_filter(
        &self,
        kind: RecordKind,
        filter: &Filter,
        sort: &[SortKey],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>>;

    /// Remove every document of a kind, returning how many were removed.
    fn clear(&self, kind: RecordKind) -> StoreResult<usize>;

    fn count(&self, kind: RecordKind) -> StoreResult<usize>;
}

/// Upsert a typed record under its natural key.
pub fn upsert_record<T, S>(store: &S, record: &T) -> StoreResult<UpsertOutcome>
where
    T: Document,
    S: RecordStore + ?Sized,
{
    let key = record.natural_key();
    let doc = serde_json::to_value(record)?;
    store.upsert_by_key(T::KIND, &key, doc)
}

/// Typed [`RecordStore::find_by_filter`].
pub fn find_records<T, S>(
    store: &S,
    filter: &Filter,
    sort: &[SortKey],
    limit: Option<usize>,
) -> StoreResult<Vec<T>>
where
    T: Document,
    S: RecordStore + ?Sized,
{
    store
        .find_by_filter(T::KIND, filter, sort, limit)?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn docs(values: Vec<Value>) -> BTreeMap<String, Value> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("{:03}", i), v))
            .collect()
    }

    #[test]
    fn test_prefix_is_case_insensitive_and_literal() {
        let c = docs(vec![
            json!({"fightId": "ufc300_1"}),
            json!({"fightId": "UFC300_2"}),
            json!({"fightId": "ufc3001_1"}),
            json!({"fightId": "ufc30_1"}),
        ]);
        let found = query(c.values(), &Filter::prefix_ci("fightId", "ufc300_"), &[], None).unwrap();
        assert_eq!(found.len(), 2);

        // Regex metacharacters in the prefix are matched literally
        let found = query(c.values(), &Filter::prefix_ci("fightId", "ufc.00_"), &[], None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_contains_and_or() {
        let c = docs(vec![
            json!({"name": "Jon Jones", "nickname": "Bones"}),
            json!({"name": "Israel Adesanya", "nickname": "The Last Stylebender"}),
        ]);
        let filter = Filter::Or(vec![
            Filter::contains_ci("name", "bones"),
            Filter::contains_ci("nickname", "BONES"),
        ]);
        let found = query(c.values(), &filter, &[], None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], "Jon Jones");
    }

    #[test]
    fn test_sort_and_limit() {
        let c = docs(vec![
            json!({"fightId": "E1_2", "fighterPosition": 1}),
            json!({"fightId": "E1_1", "fighterPosition": 2}),
            json!({"fightId": "E1_1", "fighterPosition": 1}),
        ]);
        let sort = [SortKey::asc("fightId"), SortKey::asc("fighterPosition")];
        let found = query(c.values(), &Filter::All, &sort, None).unwrap();
        let order: Vec<(String, i64)> = found
            .iter()
            .map(|d| (d["fightId"].as_str().unwrap().to_string(), d["fighterPosition"].as_i64().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![("E1_1".into(), 1), ("E1_1".into(), 2), ("E1_2".into(), 1)]
        );

        let found = query(c.values(), &Filter::All, &[SortKey::desc("fightId")], Some(1)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["fightId"], "E1_2");
    }

    #[test]
    fn test_null_sorts_first() {
        let c = docs(vec![json!({"date": "2024-01-01"}), json!({"date": null})]);
        let found = query(c.values(), &Filter::All, &[SortKey::asc("date")], None).unwrap();
        assert!(found[0]["date"].is_null());
    }

    #[test]
    fn test_missing_collection_is_empty() {
        assert!(query(std::iter::empty(), &Filter::All, &[], None).unwrap().is_empty());
    }

    #[test]
    fn test_natural_key_identity_and_filter() {
        let key = NaturalKey::compound([("fightId", "E1_1"), ("fighterName", "A")]);
        assert_eq!(key.identity(), "E1_1\u{1f}A");
        let c = docs(vec![
            json!({"fightId": "E1_1", "fighterName": "A"}),
            json!({"fightId": "E1_1", "fighterName": "B"}),
        ]);
        let found = query(c.values(), &key.to_filter(), &[], None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["fighterName"], "A");
    }

    #[test]
    fn test_empty_key_rejected() {
        let key = NaturalKey::compound([("fightId", "E1_1"), ("fighterName", " ")]);
        assert_eq!(key.first_empty_field(), Some("fighterName"));
        assert!(key.check(RecordKind::FightStats).is_err());
    }

    #[test]
    fn test_lead_prefix() {
        let prefix = Filter::prefix_ci("fightId", "UFC300_");
        assert_eq!(prefix.lead_prefix("fightId"), Some("ufc300_".to_string()));
        assert_eq!(prefix.lead_prefix("fighterName"), None);

        let key = NaturalKey::compound([("fightId", "E1_1"), ("fighterName", "A")]);
        assert_eq!(key.to_filter().lead_prefix("fightId"), Some("e1_1".to_string()));

        assert_eq!(Filter::contains_ci("fightId", "e1").lead_prefix("fightId"), None);
        assert_eq!(Filter::prefix_ci("fightId", "É").lead_prefix("fightId"), None);
    }

    #[test]
    fn test_stamp_key_overrides_fields() {
        let key = NaturalKey::single("url", "u1");
        let doc = stamp_key(&key, json!({"url": "other", "name": "A"}));
        assert_eq!(doc["url"], "u1");
        assert_eq!(doc["name"], "A");
    }
}
