//! Sync request and response types

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::record::RecordId;
use super::sync_conflict::ConflictData;

/// The closed set of entity kinds a sync operation can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Supplier,
    Product,
    #[serde(alias = "product_rate")]
    RateVersion,
    Collection,
    Payment,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Supplier,
        Self::Product,
        Self::RateVersion,
        Self::Collection,
        Self::Payment,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Supplier => "supplier",
            Self::Product => "product",
            Self::RateVersion => "rate_version",
            Self::Collection => "collection",
            Self::Payment => "payment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supplier" => Ok(Self::Supplier),
            "product" => Ok(Self::Product),
            "rate_version" | "product_rate" => Ok(Self::RateVersion),
            "collection" => Ok(Self::Collection),
            "payment" => Ok(Self::Payment),
            other => Err(Error::InvalidInput(format!("Unknown entity: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("Unknown operation: {other}"))),
        }
    }
}

/// A batch of operations uploaded by one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub device_id: String,
    #[serde(default)]
    pub operations: Vec<SyncOperation>,
}

/// One client-originated mutation, as received on the wire.
///
/// `entity`, `operation` and `timestamp` stay as raw strings so a malformed
/// operation fails on its own instead of failing the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    #[serde(default)]
    pub local_id: String,
    pub entity: String,
    pub operation: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, alias = "client_timestamp")]
    pub timestamp: Option<String>,
    /// Expected server version for update/delete
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl SyncOperation {
    /// Resolve the entity and operation names into their closed enums
    pub fn target(&self) -> Result<(EntityKind, OperationKind)> {
        Ok((self.entity.parse()?, self.operation.parse()?))
    }

    /// Client timestamp in Unix ms, or `fallback` when the client sent none
    pub fn client_timestamp_millis(&self, fallback: i64) -> Result<i64> {
        let Some(raw) = normalize_text_option(self.timestamp.clone()) else {
            return Ok(fallback);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|timestamp| timestamp.timestamp_millis())
            .map_err(|error| Error::InvalidInput(format!("Invalid timestamp `{raw}`: {error}")))
    }

    /// Expected version, from the operation or its payload
    pub fn expected_version(&self) -> Option<i64> {
        self.version
            .or_else(|| self.data.get("version").and_then(Value::as_i64))
    }

    /// Target record id for update/delete, from the operation or its payload
    pub fn record_id(&self) -> Result<RecordId> {
        let raw = self
            .entity_id
            .clone()
            .or_else(|| {
                self.data
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .and_then(|id| normalize_text_option(Some(id)))
            .ok_or_else(|| {
                Error::InvalidInput(format!("{} requires a record id", self.operation))
            })?;
        raw.parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid record id: {raw}")))
    }

    /// Client idempotency key, from the operation or its payload
    pub fn idempotency_key(&self) -> Option<String> {
        normalize_text_option(self.idempotency_key.clone()).or_else(|| {
            self.data
                .get("idempotency_key")
                .and_then(Value::as_str)
                .and_then(|key| normalize_text_option(Some(key.to_string())))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Duplicate,
    NotFound,
    Conflict,
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Duplicate => "duplicate",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Error => "error",
        }
    }
}

/// Outcome of one operation; `results[i]` answers `operations[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub local_id: String,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Record version after the operation (success and duplicate only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_data: Option<ConflictData>,
}

impl SyncResult {
    fn new(local_id: impl Into<String>, status: SyncStatus) -> Self {
        Self {
            local_id: local_id.into(),
            status,
            entity_id: None,
            version: None,
            message: None,
            conflict_data: None,
        }
    }

    pub fn success(local_id: impl Into<String>, id: RecordId, version: i64) -> Self {
        Self {
            entity_id: Some(id.as_str()),
            version: Some(version),
            ..Self::new(local_id, SyncStatus::Success)
        }
    }

    pub fn duplicate(local_id: impl Into<String>, id: RecordId, version: i64) -> Self {
        Self {
            entity_id: Some(id.as_str()),
            version: Some(version),
            message: Some("Operation already applied".to_string()),
            ..Self::new(local_id, SyncStatus::Duplicate)
        }
    }

    pub fn not_found(local_id: impl Into<String>, id: RecordId) -> Self {
        Self {
            entity_id: Some(id.as_str()),
            message: Some(format!("Record {id} not found")),
            ..Self::new(local_id, SyncStatus::NotFound)
        }
    }

    pub fn conflict(local_id: impl Into<String>, id: RecordId, conflict: ConflictData) -> Self {
        Self {
            entity_id: Some(id.as_str()),
            message: Some(format!(
                "Version conflict: client expected {}, server is at {}",
                conflict.client_version, conflict.server_version
            )),
            conflict_data: Some(conflict),
            ..Self::new(local_id, SyncStatus::Conflict)
        }
    }

    pub fn error(local_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(local_id, SyncStatus::Error)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub results: Vec<SyncResult>,
}
