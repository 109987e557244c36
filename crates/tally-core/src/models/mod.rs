//! Data models for Tally

mod collection;
mod payment;
mod product;
mod rate_version;
mod record;
mod supplier;
mod sync;
mod sync_conflict;

pub use collection::{Collection, CollectionPatch, NewCollection};
pub use payment::{NewPayment, Payment, PaymentPatch, PaymentType};
pub use product::{normalize_unit, NewProduct, Product, ProductPatch};
pub use rate_version::{NewRateVersion, RateVersion, RateVersionPatch};
pub use record::{RecordId, RecordMeta, RecordStatus, SyncMetadata, SyncOrigin};
pub use supplier::{NewSupplier, Supplier, SupplierPatch};
pub use sync::{
    EntityKind, OperationKind, SyncOperation, SyncRequest, SyncResponse, SyncResult, SyncStatus,
};
pub use sync_conflict::ConflictData;
