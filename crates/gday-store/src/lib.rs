// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! G-Day Store - document storage for the G-Day backend services.
//!
//! Services and scheduled jobs never talk to a database driver directly.
//! They receive an `Arc<dyn DocumentStore>` at construction time and address
//! documents by collection name.
//!
//! # Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`MemoryStore`] | Process-local maps, used by tests and `GDAY_DATABASE_URL=memory` |
//! | [`SqliteStore`] | JSON documents in a single SQLite table |
//!
//! # Dedup keys
//!
//! Derived records (notifications created by jobs) are written with
//! [`DocumentStore::insert_unique`]. Both backends enforce at most one
//! document per [`DedupKey`] atomically, so a second insert for the same key
//! reports [`InsertOutcome::AlreadyExists`] instead of creating a duplicate.
//!
//! # Modules
//!
//! - [`error`]: Store error types
//! - [`id`]: Store-native record identifiers
//! - [`query`]: Equality filters, sorting and paging
//! - [`model`]: Typed views of the documents shared by services and jobs
//! - [`memory`]: In-memory backend
//! - [`sqlite`]: SQLite backend

#![deny(missing_docs)]

/// Store error types.
pub mod error;

/// Store-native record identifiers.
pub mod id;

/// In-memory backend.
pub mod memory;

/// Typed document models.
pub mod model;

/// Filters and find options.
pub mod query;

/// SQLite backend.
pub mod sqlite;

mod store;

use std::sync::Arc;

pub use error::{Result, StoreError};
pub use id::RecordId;
pub use memory::MemoryStore;
pub use query::{DedupKey, Filter, FindOptions, SortOrder};
pub use sqlite::SqliteStore;
pub use store::{Document, DocumentStore, ID_FIELD, InsertOutcome, from_document, to_document};

/// Collection names shared by every service.
pub mod collections {
    /// Activities (source records for notification and report jobs).
    pub const ACTIVITIES: &str = "actividades";
    /// Classes.
    pub const CLASSES: &str = "clases";
    /// Notifications (derived records).
    pub const NOTIFICATIONS: &str = "notificaciones";
    /// Weekly reports (derived aggregates).
    pub const REPORTS: &str = "reportes";
    /// Users.
    pub const USERS: &str = "usuarios";
    /// Sleep schedules (source records for sleep reminders).
    pub const SLEEP_SCHEDULES: &str = "horario_sueno";
}

/// Open a store from a connection string.
///
/// `memory` selects [`MemoryStore`]; anything else is treated as a SQLite
/// connection URL (e.g. `sqlite:.data/gday.db?mode=rwc`).
pub async fn open(url: &str) -> Result<Arc<dyn DocumentStore>> {
    if url == "memory" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(url).await?;
    Ok(Arc::new(store))
}
