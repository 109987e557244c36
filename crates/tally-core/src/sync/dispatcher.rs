//! Routes one sync operation to the handler for its entity kind

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{RecordRepository, StoredRecord};
use crate::error::{Error, Result};
use crate::models::{
    normalize_unit, Collection, CollectionPatch, ConflictData, EntityKind, NewCollection,
    NewPayment, NewProduct, NewRateVersion, NewSupplier, OperationKind, Payment, PaymentPatch,
    Product, ProductPatch, RateVersion, RateVersionPatch, RecordId, RecordMeta, Supplier,
    SupplierPatch, SyncOperation, SyncResult,
};

use super::context::OperationContext;
use super::duplicate::DuplicateDetector;
use super::rate_resolver::RateSnapshotResolver;
use super::version_guard::{VersionCheck, VersionGuard};

/// Entity-specific behavior the dispatcher needs on top of the table mapping
pub trait SyncEntity: StoredRecord + Serialize {
    /// Payload of a create operation
    type Create: DeserializeOwned;
    /// Payload of an update operation; absent fields are left alone
    type Patch: DeserializeOwned + Default;

    /// Build a new record, checking the records it references
    fn build(conn: &Connection, meta: RecordMeta, input: Self::Create) -> Result<Self>;

    fn patch(&mut self, patch: Self::Patch) -> Result<()>;

    /// Storage invariants checked after a create or update, in the same transaction
    fn after_write(
        _conn: &Connection,
        _record: &Self,
        _ctx: &OperationContext<'_>,
        _created: bool,
    ) -> Result<()> {
        Ok(())
    }
}

/// Fetch a live record another record points at
fn require_live<T: StoredRecord>(conn: &Connection, id: &RecordId) -> Result<T> {
    RecordRepository::<T>::new(conn)
        .get(id)?
        .ok_or_else(|| Error::NotFound(format!("{} {id}", T::KIND)))
}

impl SyncEntity for Supplier {
    type Create = NewSupplier;
    type Patch = SupplierPatch;

    fn build(_conn: &Connection, meta: RecordMeta, input: NewSupplier) -> Result<Self> {
        Self::new(meta, input)
    }

    fn patch(&mut self, patch: SupplierPatch) -> Result<()> {
        self.apply(patch)
    }
}

impl SyncEntity for Product {
    type Create = NewProduct;
    type Patch = ProductPatch;

    fn build(_conn: &Connection, meta: RecordMeta, input: NewProduct) -> Result<Self> {
        Self::new(meta, input)
    }

    fn patch(&mut self, patch: ProductPatch) -> Result<()> {
        self.apply(patch)
    }
}

impl SyncEntity for RateVersion {
    type Create = NewRateVersion;
    type Patch = RateVersionPatch;

    fn build(conn: &Connection, meta: RecordMeta, input: NewRateVersion) -> Result<Self> {
        require_live::<Product>(conn, &input.product_id)?;
        Self::new(meta, input)
    }

    fn patch(&mut self, patch: RateVersionPatch) -> Result<()> {
        self.apply(patch)
    }

    /// Active windows of one product and unit never overlap. A new window that
    /// starts inside an earlier open-ended one closes it at the new start.
    fn after_write(
        conn: &Connection,
        record: &Self,
        ctx: &OperationContext<'_>,
        created: bool,
    ) -> Result<()> {
        if !record.is_active || !record.meta.is_live() {
            return Ok(());
        }

        let repo = RecordRepository::<Self>::new(conn);
        let windows = RateSnapshotResolver::new(conn).active_windows(&record.product_id, &record.unit)?;
        for mut other in windows {
            if other.meta.id == record.meta.id
                || !other.overlaps(record.effective_from, record.effective_to)
            {
                continue;
            }

            let supersedes = created
                && other.effective_to.is_none()
                && other.effective_from < record.effective_from;
            if !supersedes {
                return Err(Error::InvalidInput(format!(
                    "Rate window {} overlaps active rate {} {}",
                    window_label(record),
                    other.meta.id,
                    window_label(&other)
                )));
            }

            let version = other.meta.version;
            other.effective_to = Some(record.effective_from);
            other.is_active = false;
            ctx.touch(&mut other.meta);
            if !repo.save(&other, version)? {
                return Err(Error::Database(format!(
                    "Rate {} changed while closing its window",
                    other.meta.id
                )));
            }
            tracing::debug!(
                rate = %other.meta.id,
                effective_to = %record.effective_from,
                "Closed superseded rate window"
            );
        }
        Ok(())
    }
}

fn window_label(rate: &RateVersion) -> String {
    match rate.effective_to {
        Some(to) => format!("[{}, {to})", rate.effective_from),
        None => format!("[{}, open)", rate.effective_from),
    }
}

impl SyncEntity for Collection {
    type Create = NewCollection;
    type Patch = CollectionPatch;

    /// Snapshots the rate effective on the collection date
    fn build(conn: &Connection, meta: RecordMeta, input: NewCollection) -> Result<Self> {
        require_live::<Supplier>(conn, &input.supplier_id)?;
        let product = require_live::<Product>(conn, &input.product_id)?;
        let unit = input
            .unit
            .as_deref()
            .map(normalize_unit)
            .filter(|unit| !unit.is_empty())
            .unwrap_or_else(|| product.default_unit.clone());
        let rate = RateSnapshotResolver::new(conn).require(
            &product.meta.id,
            &unit,
            input.collection_date,
        )?;
        Self::new(meta, input, unit, &rate)
    }

    fn patch(&mut self, patch: CollectionPatch) -> Result<()> {
        self.apply(patch)
    }
}

impl SyncEntity for Payment {
    type Create = NewPayment;
    type Patch = PaymentPatch;

    fn build(conn: &Connection, meta: RecordMeta, input: NewPayment) -> Result<Self> {
        require_live::<Supplier>(conn, &input.supplier_id)?;
        Self::new(meta, input)
    }

    fn patch(&mut self, patch: PaymentPatch) -> Result<()> {
        self.apply(patch)
    }
}

/// Target of an update or delete once lookup and version check are done
enum Target<T> {
    Live(T),
    Settled(SyncResult),
}

/// Binds each entity kind to its repository and runs create, update and delete.
///
/// Works on whatever connection it is given; the caller owns the transaction.
pub struct EntityOperationDispatcher<'a> {
    conn: &'a Connection,
}

impl<'a> EntityOperationDispatcher<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn dispatch(
        &self,
        entity: EntityKind,
        operation: OperationKind,
        op: &SyncOperation,
        ctx: &OperationContext<'_>,
    ) -> Result<SyncResult> {
        match entity {
            EntityKind::Supplier => self.route::<Supplier>(operation, op, ctx),
            EntityKind::Product => self.route::<Product>(operation, op, ctx),
            EntityKind::RateVersion => self.route::<RateVersion>(operation, op, ctx),
            EntityKind::Collection => self.route::<Collection>(operation, op, ctx),
            EntityKind::Payment => self.route::<Payment>(operation, op, ctx),
        }
    }

    fn route<T: SyncEntity>(
        &self,
        operation: OperationKind,
        op: &SyncOperation,
        ctx: &OperationContext<'_>,
    ) -> Result<SyncResult> {
        let repo = RecordRepository::<T>::new(self.conn);
        match operation {
            OperationKind::Create => self.create(&repo, op, ctx),
            OperationKind::Update => self.update(&repo, op, ctx),
            OperationKind::Delete => Self::delete(&repo, op, ctx),
        }
    }

    fn create<T: SyncEntity>(
        &self,
        repo: &RecordRepository<'_, T>,
        op: &SyncOperation,
        ctx: &OperationContext<'_>,
    ) -> Result<SyncResult> {
        // A replay must not re-run any business logic, rate lookup included
        if let Some(existing) = DuplicateDetector::find(repo, ctx)? {
            return Ok(duplicate(op, existing.meta()));
        }

        let input = parse_payload::<T::Create>(&op.data, T::KIND)?;
        let record = T::build(self.conn, ctx.new_meta(), input)?;
        match repo.insert(&record) {
            Ok(()) => {}
            Err(error) if error.is_unique_violation() => {
                return match DuplicateDetector::find_after_violation(repo, ctx)? {
                    Some(existing) => Ok(duplicate(op, existing.meta())),
                    None => Err(error),
                };
            }
            Err(error) => return Err(error),
        }
        T::after_write(self.conn, &record, ctx, true)?;

        let meta = record.meta();
        Ok(SyncResult::success(&op.local_id, meta.id, meta.version))
    }

    fn update<T: SyncEntity>(
        &self,
        repo: &RecordRepository<'_, T>,
        op: &SyncOperation,
        ctx: &OperationContext<'_>,
    ) -> Result<SyncResult> {
        let id = op.record_id()?;
        let mut record = match Self::target(repo, op, id, Some(&op.data))? {
            Target::Live(record) => record,
            Target::Settled(result) => return Ok(result),
        };

        let patch = if op.data.is_null() {
            T::Patch::default()
        } else {
            parse_payload::<T::Patch>(&op.data, T::KIND)?
        };
        let current = record.meta().version;
        record.patch(patch)?;
        ctx.touch(record.meta_mut());

        if let Some(result) = Self::save(repo, &record, current, op, Some(&op.data))? {
            return Ok(result);
        }
        T::after_write(self.conn, &record, ctx, false)?;
        Ok(SyncResult::success(&op.local_id, id, record.meta().version))
    }

    fn delete<T: SyncEntity>(
        repo: &RecordRepository<'_, T>,
        op: &SyncOperation,
        ctx: &OperationContext<'_>,
    ) -> Result<SyncResult> {
        let id = op.record_id()?;
        let mut record = match Self::target(repo, op, id, None)? {
            Target::Live(record) => record,
            Target::Settled(result) => return Ok(result),
        };

        let current = record.meta().version;
        ctx.mark_deleted(record.meta_mut());
        if let Some(result) = Self::save(repo, &record, current, op, None)? {
            return Ok(result);
        }
        Ok(SyncResult::success(&op.local_id, id, record.meta().version))
    }

    /// Look up the target and run the version guard.
    ///
    /// A deleted record still reports a conflict against a stale expected
    /// version; otherwise it reads as not found.
    fn target<T: SyncEntity>(
        repo: &RecordRepository<'_, T>,
        op: &SyncOperation,
        id: RecordId,
        client_data: Option<&Value>,
    ) -> Result<Target<T>> {
        let Some(record) = repo.find(&id)? else {
            return Ok(Target::Settled(SyncResult::not_found(&op.local_id, id)));
        };

        if let VersionCheck::Conflict {
            client_version,
            server_version,
        } = VersionGuard::check(op.expected_version(), record.meta().version)
        {
            let conflict = ConflictData {
                client_version,
                server_version,
                server_data: serde_json::to_value(&record)?,
                client_data: client_data.cloned(),
            };
            return Ok(Target::Settled(SyncResult::conflict(&op.local_id, id, conflict)));
        }

        if !record.meta().is_live() {
            return Ok(Target::Settled(SyncResult::not_found(&op.local_id, id)));
        }
        Ok(Target::Live(record))
    }

    /// Compare-and-swap write. Returns the result to report when another
    /// writer moved the record since it was read.
    fn save<T: SyncEntity>(
        repo: &RecordRepository<'_, T>,
        record: &T,
        read_version: i64,
        op: &SyncOperation,
        client_data: Option<&Value>,
    ) -> Result<Option<SyncResult>> {
        if repo.save(record, read_version)? {
            return Ok(None);
        }

        let id = record.meta().id;
        let Some(latest) = repo.find(&id)? else {
            return Ok(Some(SyncResult::not_found(&op.local_id, id)));
        };
        let conflict = ConflictData {
            client_version: op.expected_version().unwrap_or(read_version),
            server_version: latest.meta().version,
            server_data: serde_json::to_value(&latest)?,
            client_data: client_data.cloned(),
        };
        Ok(Some(SyncResult::conflict(&op.local_id, id, conflict)))
    }
}

fn duplicate(op: &SyncOperation, meta: &RecordMeta) -> SyncResult {
    SyncResult::duplicate(&op.local_id, meta.id, meta.version)
}

fn parse_payload<P: DeserializeOwned>(data: &Value, kind: EntityKind) -> Result<P> {
    P::deserialize(data).map_err(|error| Error::InvalidInput(format!("Invalid {kind} payload: {error}")))
}
