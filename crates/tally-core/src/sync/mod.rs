//! Batch sync engine
//!
//! [`SyncBatchCoordinator`] drives a batch: every operation gets its own
//! transaction and goes through [`EntityOperationDispatcher`], which consults
//! [`DuplicateDetector`] on create, [`RateSnapshotResolver`] for collections
//! and [`VersionGuard`] on update and delete.

mod changes;
mod context;
mod coordinator;
mod dispatcher;
mod duplicate;
mod rate_resolver;
mod version_guard;

pub use changes::{changes_since, ChangeSet, ChangedRecord};
pub use context::{OperationContext, SyncContext};
pub use coordinator::SyncBatchCoordinator;
pub use dispatcher::{EntityOperationDispatcher, SyncEntity};
pub use duplicate::DuplicateDetector;
pub use rate_resolver::RateSnapshotResolver;
pub use version_guard::{VersionCheck, VersionGuard};
