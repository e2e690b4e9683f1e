// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory document store.
//!
//! Nothing is persisted. Used by tests and for local runs with
//! `GDAY_DATABASE_URL=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::id::RecordId;
use crate::query::{DedupKey, Filter, FindOptions};
use crate::store::{Document, DocumentStore, ID_FIELD, InsertOutcome, assign_id, merge};

#[derive(Debug, Default)]
struct Collection {
    /// Documents in insertion order.
    docs: Vec<Document>,
    /// Dedup key -> id of the document holding it.
    keys: HashMap<String, RecordId>,
}

impl Collection {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.docs
            .iter()
            .position(|d| d.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id.as_str()))
    }
}

fn duplicate_id(collection: &str, id: &RecordId) -> StoreError {
    StoreError::DuplicateId {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// Document store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.docs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let matching = collections
            .get(collection)
            .map(|c| {
                c.docs
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(options.apply(matching))
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<RecordId> {
        let id = assign_id(&mut doc);
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        if coll.position(&id).is_some() {
            return Err(duplicate_id(collection, &id));
        }
        coll.docs.push(doc);
        Ok(id)
    }

    async fn insert_unique(
        &self,
        collection: &str,
        key: &DedupKey,
        mut doc: Document,
    ) -> Result<InsertOutcome> {
        // check and insert under one write lock
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        let key = key.to_string();
        if coll.keys.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        let id = assign_id(&mut doc);
        if coll.position(&id).is_some() {
            return Err(duplicate_id(collection, &id));
        }
        coll.keys.insert(key, id.clone());
        coll.docs.push(doc);
        Ok(InsertOutcome::Inserted(id))
    }

    async fn update_by_id(&self, collection: &str, id: &RecordId, set: Document) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match coll.position(id) {
            Some(pos) => {
                merge(&mut coll.docs[pos], set);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, collection: &str, id: &RecordId) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match coll.position(id) {
            Some(pos) => {
                coll.docs.remove(pos);
                coll.keys.retain(|_, holder| holder != id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
