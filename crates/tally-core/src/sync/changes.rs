//! Change feed for pulling server state down to devices

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{RecordRepository, StoredRecord};
use crate::error::Result;
use crate::models::{Collection, EntityKind, Payment, Product, RateVersion, RecordMeta, Supplier};

/// One changed record, tagged with its entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", content = "record", rename_all = "snake_case")]
pub enum ChangedRecord {
    Supplier(Supplier),
    Product(Product),
    RateVersion(RateVersion),
    Collection(Collection),
    Payment(Payment),
}

impl ChangedRecord {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Supplier(_) => EntityKind::Supplier,
            Self::Product(_) => EntityKind::Product,
            Self::RateVersion(_) => EntityKind::RateVersion,
            Self::Collection(_) => EntityKind::Collection,
            Self::Payment(_) => EntityKind::Payment,
        }
    }

    pub const fn meta(&self) -> &RecordMeta {
        match self {
            Self::Supplier(record) => &record.meta,
            Self::Product(record) => &record.meta,
            Self::RateVersion(record) => &record.meta,
            Self::Collection(record) => &record.meta,
            Self::Payment(record) => &record.meta,
        }
    }

    fn sort_key(&self) -> (i64, usize, String) {
        let meta = self.meta();
        let kind = EntityKind::ALL
            .iter()
            .position(|kind| *kind == self.kind())
            .unwrap_or_default();
        (meta.updated_at, kind, meta.id.as_str())
    }
}

/// A page of the change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub changes: Vec<ChangedRecord>,
    /// Cursor for the next pull
    pub next_since: i64,
    pub has_more: bool,
}

/// Records of every kind updated strictly after `since`, tombstones included,
/// oldest first.
///
/// A page never ends in the middle of a group of records sharing one
/// `updated_at`, since the cursor is exclusive and would skip the rest.
pub fn changes_since(conn: &Connection, since: i64, limit: usize) -> Result<ChangeSet> {
    let limit = limit.max(1);
    let mut changes = Vec::new();
    collect_changed::<Supplier>(conn, since, limit, ChangedRecord::Supplier, &mut changes)?;
    collect_changed::<Product>(conn, since, limit, ChangedRecord::Product, &mut changes)?;
    collect_changed::<RateVersion>(conn, since, limit, ChangedRecord::RateVersion, &mut changes)?;
    collect_changed::<Collection>(conn, since, limit, ChangedRecord::Collection, &mut changes)?;
    collect_changed::<Payment>(conn, since, limit, ChangedRecord::Payment, &mut changes)?;
    changes.sort_by_cached_key(ChangedRecord::sort_key);

    let has_more = changes.len() > limit;
    if has_more {
        let boundary = changes[limit].meta().updated_at;
        changes.truncate(limit);
        if changes.last().is_some_and(|last| last.meta().updated_at == boundary) {
            changes.retain(|change| change.meta().updated_at < boundary);
            if changes.is_empty() {
                // The whole page shares one timestamp: return the full group
                changes = changed_at(conn, boundary)?;
            }
        }
    }

    let next_since = changes.last().map_or(since, |last| last.meta().updated_at);
    tracing::debug!(since, next_since, count = changes.len(), has_more, "Built change set");
    Ok(ChangeSet {
        changes,
        next_since,
        has_more,
    })
}

fn collect_changed<T: StoredRecord>(
    conn: &Connection,
    since: i64,
    limit: usize,
    wrap: fn(T) -> ChangedRecord,
    out: &mut Vec<ChangedRecord>,
) -> Result<()> {
    // One extra row per table tells whether another page exists
    let records = RecordRepository::<T>::new(conn).changed_since(since, limit + 1)?;
    out.extend(records.into_iter().map(wrap));
    Ok(())
}

fn changed_at(conn: &Connection, updated_at: i64) -> Result<Vec<ChangedRecord>> {
    let mut changes = Vec::new();
    collect_at::<Supplier>(conn, updated_at, ChangedRecord::Supplier, &mut changes)?;
    collect_at::<Product>(conn, updated_at, ChangedRecord::Product, &mut changes)?;
    collect_at::<RateVersion>(conn, updated_at, ChangedRecord::RateVersion, &mut changes)?;
    collect_at::<Collection>(conn, updated_at, ChangedRecord::Collection, &mut changes)?;
    collect_at::<Payment>(conn, updated_at, ChangedRecord::Payment, &mut changes)?;
    changes.sort_by_cached_key(ChangedRecord::sort_key);
    Ok(changes)
}

fn collect_at<T: StoredRecord>(
    conn: &Connection,
    updated_at: i64,
    wrap: fn(T) -> ChangedRecord,
    out: &mut Vec<ChangedRecord>,
) -> Result<()> {
    let records =
        RecordRepository::<T>::new(conn).select("updated_at = ? ORDER BY id ASC", [updated_at])?;
    out.extend(records.into_iter().map(wrap));
    Ok(())
}
