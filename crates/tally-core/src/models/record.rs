//! Shared record shape for every synced entity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Lifecycle state of a record. Deleted records stay addressable by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordStatus {
    Live,
    Deleted { deleted_at: i64 },
}

impl RecordStatus {
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    pub const fn deleted_at(self) -> Option<i64> {
        match self {
            Self::Live => None,
            Self::Deleted { deleted_at } => Some(deleted_at),
        }
    }
}

/// Device and client-local operation that created a record. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOrigin {
    pub device_id: String,
    pub local_id: String,
}

/// Envelope stamped onto a record by the last sync operation that touched it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Server time the operation was processed (Unix ms)
    pub synced_at: i64,
    /// Client-reported time of the operation (Unix ms)
    pub original_timestamp: i64,
    /// Client-assigned operation id
    pub local_id: String,
}

/// Columns shared by every record table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: RecordId,
    /// Optimistic concurrency counter, starts at 1
    pub version: i64,
    pub status: RecordStatus,
    pub idempotency_key: Option<String>,
    pub origin: Option<SyncOrigin>,
    pub sync: Option<SyncMetadata>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl RecordMeta {
    /// Metadata for a record created outside of sync (seeding, admin tools)
    #[must_use]
    pub fn new(created_by: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RecordId::new(),
            version: 1,
            status: RecordStatus::Live,
            idempotency_key: None,
            origin: None,
            sync: None,
            updated_by: created_by.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Metadata for a record created by a sync operation
    #[must_use]
    pub fn from_sync(
        user_id: &str,
        device_id: &str,
        metadata: SyncMetadata,
        idempotency_key: Option<String>,
    ) -> Self {
        let mut meta = Self::new(Some(user_id.to_string()));
        meta.created_at = metadata.synced_at;
        meta.updated_at = metadata.synced_at;
        meta.idempotency_key = idempotency_key;
        meta.origin = Some(SyncOrigin {
            device_id: device_id.to_string(),
            local_id: metadata.local_id.clone(),
        });
        meta.sync = Some(metadata);
        meta
    }

    pub const fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Record one successful mutation: bumps the version by exactly one.
    pub fn touch(&mut self, user_id: Option<&str>, sync: Option<SyncMetadata>) {
        let now = sync
            .as_ref()
            .map_or_else(|| chrono::Utc::now().timestamp_millis(), |s| s.synced_at);
        self.version += 1;
        self.updated_at = now.max(self.updated_at);
        if let Some(user_id) = user_id {
            self.updated_by = Some(user_id.to_string());
        }
        if sync.is_some() {
            self.sync = sync;
        }
    }

    /// Soft delete. Counts as a mutation.
    pub fn mark_deleted(&mut self, user_id: Option<&str>, sync: Option<SyncMetadata>) {
        self.touch(user_id, sync);
        self.status = RecordStatus::Deleted {
            deleted_at: self.updated_at,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(local_id: &str) -> SyncMetadata {
        SyncMetadata {
            synced_at: 1_700_000_000_000,
            original_timestamp: 1_699_999_999_000,
            local_id: local_id.to_string(),
        }
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_new_meta_starts_at_version_one() {
        let meta = RecordMeta::new(None);
        assert_eq!(meta.version, 1);
        assert!(meta.is_live());
        assert_eq!(meta.created_at, meta.updated_at);
    }

    #[test]
    fn test_from_sync_records_origin() {
        let meta = RecordMeta::from_sync("user-1", "device-a", metadata("op-1"), Some("k".into()));
        let origin = meta.origin.as_ref().unwrap();
        assert_eq!(origin.device_id, "device-a");
        assert_eq!(origin.local_id, "op-1");
        assert_eq!(meta.idempotency_key.as_deref(), Some("k"));
        assert_eq!(meta.created_by.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_touch_increments_version_once() {
        let mut meta = RecordMeta::new(None);
        meta.touch(Some("user-2"), Some(metadata("op-2")));
        assert_eq!(meta.version, 2);
        assert_eq!(meta.updated_by.as_deref(), Some("user-2"));
        assert_eq!(meta.sync.as_ref().unwrap().local_id, "op-2");
    }

    #[test]
    fn test_mark_deleted_keeps_origin() {
        let mut meta = RecordMeta::from_sync("u", "d", metadata("op-1"), None);
        meta.mark_deleted(Some("u"), Some(metadata("op-9")));
        assert_eq!(meta.version, 2);
        assert!(!meta.is_live());
        assert_eq!(meta.status.deleted_at(), Some(meta.updated_at));
        assert_eq!(meta.origin.as_ref().unwrap().local_id, "op-1");
    }
}
