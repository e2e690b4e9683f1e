// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The document store trait.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::id::RecordId;
use crate::query::{DedupKey, Filter, FindOptions};

/// A stored JSON object. The id lives under `_id`.
pub type Document = serde_json::Map<String, Value>;

/// Field holding the record id inside every document.
pub const ID_FIELD: &str = "_id";

/// Result of [`DocumentStore::insert_unique`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The document was stored under this id.
    Inserted(RecordId),
    /// A document with the same dedup key already exists; nothing was written.
    AlreadyExists,
}

impl InsertOutcome {
    /// Whether a new document was written.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Collection-oriented JSON document storage.
///
/// Implementations are shared across request handlers and background jobs,
/// so every method takes `&self` and must be safe to call concurrently.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend identifier (e.g., "memory", "sqlite").
    fn backend(&self) -> &'static str;

    /// Return the documents of `collection` matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>>;

    /// Insert a document and return its id.
    ///
    /// A valid `_id` already present in the document is kept; otherwise a
    /// fresh id is generated.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<RecordId>;

    /// Insert a document unless one with the same dedup key exists.
    ///
    /// The existence check and the write are a single atomic step.
    async fn insert_unique(
        &self,
        collection: &str,
        key: &DedupKey,
        doc: Document,
    ) -> Result<InsertOutcome>;

    /// Merge `set` into the document with `id`. Returns false when no
    /// document matched.
    async fn update_by_id(&self, collection: &str, id: &RecordId, set: Document) -> Result<bool>;

    /// Delete the document with `id`. Returns false when no document matched.
    ///
    /// Deleting a derived record releases its dedup key.
    async fn delete_by_id(&self, collection: &str, id: &RecordId) -> Result<bool>;

    /// First document matching `filter`, in insertion order.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let mut docs = self
            .find(collection, filter, &FindOptions::default().limit(1))
            .await?;
        Ok(docs.pop())
    }

    /// Document with the given id.
    async fn find_by_id(&self, collection: &str, id: &RecordId) -> Result<Option<Document>> {
        self.find_one(collection, &Filter::new().eq(ID_FIELD, id.as_str()))
            .await
    }
}

/// Serialize a typed record into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Deserialize a document into a typed record.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Ensure `doc` carries a valid `_id`, generating one if needed.
pub(crate) fn assign_id(doc: &mut Document) -> RecordId {
    let existing = doc
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| RecordId::parse(raw).ok());
    let id = existing.unwrap_or_default();
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    id
}

/// Apply a partial update, never touching the id.
pub(crate) fn merge(doc: &mut Document, set: Document) {
    for (field, value) in set {
        if field != ID_FIELD {
            doc.insert(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_id_keeps_valid_id() {
        let mut doc = to_document(&json!({"_id": "64b7f0c2a1b2c3d4e5f6a7b8"})).unwrap();
        let id = assign_id(&mut doc);
        assert_eq!(id.as_str(), "64b7f0c2a1b2c3d4e5f6a7b8");
    }

    #[test]
    fn test_assign_id_replaces_invalid_id() {
        let mut doc = to_document(&json!({"_id": "nope"})).unwrap();
        let id = assign_id(&mut doc);
        assert_ne!(id.as_str(), "nope");
        assert_eq!(doc.get(ID_FIELD), Some(&json!(id.as_str())));
    }

    #[test]
    fn test_merge_ignores_id() {
        let mut doc = to_document(&json!({"_id": "64b7f0c2a1b2c3d4e5f6a7b8", "leida": false})).unwrap();
        let set = to_document(&json!({"_id": "ffffffffffffffffffffffff", "leida": true})).unwrap();
        merge(&mut doc, set);
        assert_eq!(doc.get("leida"), Some(&json!(true)));
        assert_eq!(doc.get(ID_FIELD), Some(&json!("64b7f0c2a1b2c3d4e5f6a7b8")));
    }

    #[test]
    fn test_to_document_rejects_non_objects() {
        assert!(to_document(&json!([1, 2])).is_err());
    }
}
