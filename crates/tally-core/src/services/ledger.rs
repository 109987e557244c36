//! Thread-safe service wrapping the database and the sync engine.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::ledger::{supplier_balance, SupplierBalance};
use crate::models::{RecordId, SyncRequest, SyncResponse};
use crate::sync::{changes_since, ChangeSet, SyncBatchCoordinator};
use crate::{Error, Result};

/// Shared handle used by the HTTP layer.
///
/// Engine calls block on `SQLite`, so they run on the blocking pool while
/// holding the database lock.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<Mutex<Database>>,
    config: EngineConfig,
}

impl LedgerService {
    /// Open a service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let db_path = db_path.into();
        let db = tokio::task::spawn_blocking(move || {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Database::open(&db_path)
        })
        .await
        .map_err(join_error)??;
        Ok(Self::from_database(db, config))
    }

    /// Open an in-memory service (primarily for tests).
    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_database(Database::open_in_memory()?, config))
    }

    fn from_database(db: Database, config: EngineConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a device's batch on behalf of `user_id`
    pub async fn sync(&self, user_id: String, request: SyncRequest) -> Result<SyncResponse> {
        let coordinator = SyncBatchCoordinator::new(self.config);
        self.with_db(move |db| coordinator.process(db.connection_mut(), &user_id, &request))
            .await
    }

    /// Pull changes after `since`; `limit` is capped by the configured page size
    pub async fn changes(&self, since: i64, limit: Option<usize>) -> Result<ChangeSet> {
        let limit = self.config.page_limit(limit);
        self.with_db(move |db| changes_since(db.connection(), since, limit))
            .await
    }

    pub async fn supplier_balance(&self, supplier_id: RecordId) -> Result<SupplierBalance> {
        self.with_db(move |db| supplier_balance(db.connection(), &supplier_id))
            .await
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut db = db.blocking_lock();
            f(&mut db)
        })
        .await
        .map_err(join_error)?
    }
}

fn join_error(error: tokio::task::JoinError) -> Error {
    Error::Database(format!("Blocking task failed: {error}"))
}
