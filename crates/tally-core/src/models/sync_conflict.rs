//! Sync conflict model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Both sides of a rejected write, returned to the client for manual resolution.
///
/// The server state is authoritative; the client must reconcile and resubmit
/// with `server_version` as its expected version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictData {
    /// Version the client expected the record to be at
    pub client_version: i64,
    /// Version the record is actually at
    pub server_version: i64,
    /// Full current server-side record
    pub server_data: Value,
    /// Data the client attempted to write (updates only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_data: Option<Value>,
}
