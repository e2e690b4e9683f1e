// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Store-native record identifiers.
//!
//! Ids are 12 bytes rendered as 24 lowercase hex characters: a 4-byte
//! big-endian Unix timestamp followed by 8 random bytes. Ids generated in
//! the same second therefore still differ, and ids sort roughly by creation
//! time.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the hex form of a [`RecordId`].
pub const RECORD_ID_LEN: usize = 24;

/// Error returned when a string is not a valid record id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid record id: {0:?}")]
pub struct InvalidRecordId(pub String);

/// Identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];
        let secs = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        let random = uuid::Uuid::new_v4();
        bytes[4..].copy_from_slice(&random.as_bytes()[..8]);
        Self(hex::encode(bytes))
    }

    /// Parse and validate an id received from a client.
    pub fn parse(raw: &str) -> Result<Self, InvalidRecordId> {
        if raw.len() == RECORD_ID_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(InvalidRecordId(raw.to_string()))
        }
    }

    /// Hex form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = InvalidRecordId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = InvalidRecordId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}
