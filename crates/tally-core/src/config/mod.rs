//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_BATCH_OPERATIONS: usize = 500;
pub const DEFAULT_PULL_PAGE_LIMIT: usize = 1000;

/// Limits applied by the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest batch accepted by one sync request
    pub max_batch_operations: usize,
    /// Largest page returned by the change feed
    pub pull_page_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_operations: DEFAULT_MAX_BATCH_OPERATIONS,
            pull_page_limit: DEFAULT_PULL_PAGE_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_operations == 0 {
            return Err(Error::InvalidInput(
                "max_batch_operations must be at least 1".to_string(),
            ));
        }
        if self.pull_page_limit == 0 {
            return Err(Error::InvalidInput(
                "pull_page_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Page size for a pull, capped at the configured limit
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.pull_page_limit)
            .clamp(1, self.pull_page_limit.max(1))
    }
}
