// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Equality filters, find options and dedup keys.
//!
//! The memory backend evaluates these in process; the SQLite backend
//! translates them to SQL with the same semantics.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde_json::Value;

use crate::store::Document;

/// Conjunction of `field == value` clauses. An empty filter matches every
/// document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Filter matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// The `(field, value)` clauses, in insertion order.
    pub(crate) fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Whether the document satisfies every clause.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// Sorting and paging for [`crate::DocumentStore::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Field to sort by. Without it, documents come back in insertion order.
    pub sort: Option<(String, SortOrder)>,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Sort by `field` in `order`.
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    /// Skip the first `skip` documents.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Return at most `limit` documents.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply sorting and paging to an already filtered list.
    pub(crate) fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if let Some((field, order)) = &self.sort {
            // stable sort keeps insertion order among equal keys
            docs.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        docs.into_iter().skip(skip).take(limit).collect()
    }
}

/// Missing and null sort first; values of different kinds compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Identity of a derived record.
///
/// At most one document per key may exist in a collection. `window` narrows
/// the key to a calendar day for derived records that legitimately repeat
/// (one sleep reminder per schedule per day).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Owner of the derived record.
    pub subject_id: String,
    /// Source record the derived record was computed from.
    pub source_id: String,
    /// Derived record category.
    pub category: u8,
    /// Optional day the key is scoped to.
    pub window: Option<NaiveDate>,
}

impl DedupKey {
    /// Key valid for the whole lifetime of the source record.
    pub fn new(subject_id: impl Into<String>, source_id: impl Into<String>, category: u8) -> Self {
        Self {
            subject_id: subject_id.into(),
            source_id: source_id.into(),
            category,
            window: None,
        }
    }

    /// Scope the key to a single day.
    pub fn on_day(mut self, day: NaiveDate) -> Self {
        self.window = Some(day);
        self
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.subject_id, self.source_id, self.category)?;
        if let Some(day) = self.window {
            write!(f, ":{}", day.format("%Y-%m-%d"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_filter_matches_all_clauses() {
        let d = doc(json!({"usuarioId": "a", "leida": false, "tipo": 2}));
        assert!(Filter::new().matches(&d));
        assert!(Filter::new().eq("usuarioId", "a").eq("leida", false).matches(&d));
        assert!(!Filter::new().eq("usuarioId", "a").eq("leida", true).matches(&d));
        assert!(!Filter::new().eq("missing", 1).matches(&d));
    }

    #[test]
    fn test_apply_sorts_and_pages() {
        let docs = vec![
            doc(json!({"n": 2})),
            doc(json!({"n": 3})),
            doc(json!({"n": 1})),
            doc(json!({})),
        ];
        let out = FindOptions::default()
            .sort_by("n", SortOrder::Desc)
            .skip(1)
            .limit(2)
            .apply(docs);
        let ns: Vec<_> = out.iter().map(|d| d.get("n").cloned()).collect();
        assert_eq!(ns, vec![Some(json!(2)), Some(json!(1))]);
    }

    #[test]
    fn test_apply_without_sort_keeps_insertion_order() {
        let docs = vec![doc(json!({"n": "b"})), doc(json!({"n": "a"}))];
        let out = FindOptions::default().apply(docs);
        assert_eq!(out[0].get("n"), Some(&json!("b")));
    }

    #[test]
    fn test_dedup_key_display() {
        let key = DedupKey::new("u1", "a1", 3);
        assert_eq!(key.to_string(), "u1:a1:3");
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(key.on_day(day).to_string(), "u1:a1:3:2026-10-18");
    }
}
