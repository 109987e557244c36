//! Explicit request context threaded through every engine call

use crate::models::{RecordMeta, SyncMetadata};

/// Who is syncing, from which device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Authenticated user, recorded in the audit columns
    pub user_id: String,
    pub device_id: String,
}

impl SyncContext {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// Per-operation view of the context, carrying the sync envelope
#[derive(Debug, Clone)]
pub struct OperationContext<'a> {
    pub session: &'a SyncContext,
    pub metadata: SyncMetadata,
    pub idempotency_key: Option<String>,
}

impl OperationContext<'_> {
    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    pub fn device_id(&self) -> &str {
        &self.session.device_id
    }

    pub fn local_id(&self) -> Option<&str> {
        let local_id = self.metadata.local_id.trim();
        (!local_id.is_empty()).then_some(local_id)
    }

    /// Metadata for a record created by this operation
    pub fn new_meta(&self) -> RecordMeta {
        let mut meta = RecordMeta::from_sync(
            self.user_id(),
            self.device_id(),
            self.metadata.clone(),
            self.idempotency_key.clone(),
        );
        // The origin pair only identifies keyless creates
        if self.idempotency_key.is_some() || self.local_id().is_none() {
            meta.origin = None;
        }
        meta
    }

    /// Stamp one mutation of an existing record
    pub fn touch(&self, meta: &mut RecordMeta) {
        meta.touch(Some(self.user_id()), Some(self.metadata.clone()));
    }

    pub fn mark_deleted(&self, meta: &mut RecordMeta) {
        meta.mark_deleted(Some(self.user_id()), Some(self.metadata.clone()));
    }
}
