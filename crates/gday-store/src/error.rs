// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gday-store.

use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying embedded migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document with the same id already exists in the collection.
    #[error("Duplicate id {id} in {collection}")]
    DuplicateId {
        /// Collection name.
        collection: String,
        /// Conflicting id.
        id: String,
    },

    /// A document could not be stored or read back as an object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Result type using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
