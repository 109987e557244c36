//! Exactly-once detection for create operations

use crate::db::{RecordRepository, StoredRecord};
use crate::error::Result;

use super::context::OperationContext;

/// Finds the record an earlier delivery of the same create already produced.
///
/// The explicit idempotency key is authoritative; the device origin pair is
/// only recorded and consulted when the client sent no key. Both are unique
/// indexes, so a concurrent duplicate that slips past the lookup fails on
/// insert and is resolved with [`DuplicateDetector::find_after_violation`].
pub struct DuplicateDetector;

impl DuplicateDetector {
    pub fn find<T: StoredRecord>(
        repo: &RecordRepository<'_, T>,
        ctx: &OperationContext<'_>,
    ) -> Result<Option<T>> {
        match ctx.idempotency_key.as_deref() {
            Some(key) => repo.find_by_idempotency_key(key),
            None => Self::find_by_origin(repo, ctx),
        }
    }

    /// Resolve the record behind a unique-constraint failure on insert.
    ///
    /// Uses the same key the lookup did, so a keyed create is never matched
    /// to a record through its origin.
    pub fn find_after_violation<T: StoredRecord>(
        repo: &RecordRepository<'_, T>,
        ctx: &OperationContext<'_>,
    ) -> Result<Option<T>> {
        Self::find(repo, ctx)
    }

    fn find_by_origin<T: StoredRecord>(
        repo: &RecordRepository<'_, T>,
        ctx: &OperationContext<'_>,
    ) -> Result<Option<T>> {
        match ctx.local_id() {
            Some(local_id) => repo.find_by_origin(ctx.device_id(), local_id),
            None => Ok(None),
        }
    }
}
