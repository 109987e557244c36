//! Batch entry point: one isolated transaction per operation

use rusqlite::{Connection, TransactionBehavior};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{SyncMetadata, SyncOperation, SyncRequest, SyncResponse, SyncResult, SyncStatus};
use crate::util::{normalize_text_option, unix_millis_now};

use super::context::{OperationContext, SyncContext};
use super::dispatcher::EntityOperationDispatcher;

/// Applies a device's batch in array order.
///
/// Each operation runs in its own `IMMEDIATE` transaction. A failing operation
/// rolls back alone and becomes an `error` result; committed siblings stay
/// committed and later ones still run. Only a failure to open a transaction
/// aborts the request.
#[derive(Debug, Clone, Default)]
pub struct SyncBatchCoordinator {
    config: EngineConfig,
}

impl SyncBatchCoordinator {
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn process(
        &self,
        conn: &mut Connection,
        user_id: &str,
        request: &SyncRequest,
    ) -> Result<SyncResponse> {
        let device_id = normalize_text_option(Some(request.device_id.clone()))
            .ok_or_else(|| Error::InvalidInput("device_id is required".to_string()))?;
        let count = request.operations.len();
        if count > self.config.max_batch_operations {
            return Err(Error::InvalidInput(format!(
                "Batch has {count} operations, the limit is {}",
                self.config.max_batch_operations
            )));
        }

        let session = SyncContext::new(user_id, device_id);
        let mut results = Vec::with_capacity(count);
        for op in &request.operations {
            results.push(Self::process_operation(conn, &session, op)?);
        }

        let tally = |status: SyncStatus| results.iter().filter(|r| r.status == status).count();
        tracing::info!(
            device = %session.device_id,
            operations = count,
            succeeded = tally(SyncStatus::Success),
            duplicates = tally(SyncStatus::Duplicate),
            not_found = tally(SyncStatus::NotFound),
            conflicts = tally(SyncStatus::Conflict),
            failed = tally(SyncStatus::Error),
            "Processed sync batch"
        );
        Ok(SyncResponse { results })
    }

    fn process_operation(
        conn: &mut Connection,
        session: &SyncContext,
        op: &SyncOperation,
    ) -> Result<SyncResult> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let synced_at = unix_millis_now();

        let result = match Self::apply(&tx, session, op, synced_at) {
            Ok(result) => match tx.commit() {
                Ok(()) => result,
                Err(error) => SyncResult::error(&op.local_id, Error::from(error).to_string()),
            },
            Err(error) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(local_id = %op.local_id, error = %rollback, "Rollback failed");
                }
                SyncResult::error(&op.local_id, error.to_string())
            }
        };

        match result.status {
            SyncStatus::Conflict | SyncStatus::Error => tracing::warn!(
                entity = %op.entity,
                operation = %op.operation,
                local_id = %op.local_id,
                status = result.status.as_str(),
                message = result.message.as_deref().unwrap_or_default(),
                "Sync operation rejected"
            ),
            _ => tracing::debug!(
                entity = %op.entity,
                operation = %op.operation,
                local_id = %op.local_id,
                status = result.status.as_str(),
                "Processed sync operation"
            ),
        }
        Ok(result)
    }

    fn apply(
        conn: &Connection,
        session: &SyncContext,
        op: &SyncOperation,
        synced_at: i64,
    ) -> Result<SyncResult> {
        let (entity, operation) = op.target()?;
        let ctx = OperationContext {
            session,
            metadata: SyncMetadata {
                synced_at,
                original_timestamp: op.client_timestamp_millis(synced_at)?,
                local_id: op.local_id.clone(),
            },
            idempotency_key: op.idempotency_key(),
        };
        EntityOperationDispatcher::new(conn).dispatch(entity, operation, op, &ctx)
    }
}
