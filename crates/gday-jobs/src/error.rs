// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gday-jobs.

use gday_store::StoreError;
use thiserror::Error;

/// Job errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JobError {
    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A source document does not have the expected shape.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A required field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A date field could not be parsed.
    #[error("Invalid date in {field}: {value:?}")]
    InvalidDate {
        /// Field holding the date.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// A `HH:MM` time could not be parsed.
    #[error("Invalid time: {0:?}")]
    InvalidTime(String),

    /// A schedule expression could not be parsed or has no next occurrence.
    #[error("Schedule error: {0}")]
    Schedule(String),
}

/// Result type using [`JobError`].
pub type Result<T> = std::result::Result<T, JobError>;
