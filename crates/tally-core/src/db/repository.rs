//! Record repository implementation
//!
//! One generic `SQLite` repository serves every entity kind. Each model
//! describes its table through [`StoredRecord`]; the repository owns the shared
//! record columns (identity, version, soft delete, sync origin).

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::marker::PhantomData;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Params, Row};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::models::{EntityKind, RecordId, RecordMeta, RecordStatus, SyncMetadata, SyncOrigin};

/// Shared record columns, in the order [`read_meta`] expects them
const META_COLUMNS: [&str; 14] = [
    "id",
    "version",
    "is_deleted",
    "deleted_at",
    "idempotency_key",
    "origin_device_id",
    "origin_local_id",
    "synced_at",
    "client_timestamp",
    "sync_local_id",
    "created_by",
    "updated_by",
    "created_at",
    "updated_at",
];

/// Shared columns an update may rewrite; identity, origin and creation stay fixed
const MUTABLE_META_COLUMNS: [&str; 8] = [
    "version",
    "is_deleted",
    "deleted_at",
    "synced_at",
    "client_timestamp",
    "sync_local_id",
    "updated_by",
    "updated_at",
];

/// Table mapping for a synced entity
pub trait StoredRecord: Sized {
    const KIND: EntityKind;
    const TABLE: &'static str;
    /// Entity-specific columns, in the order of [`StoredRecord::field_values`]
    const FIELDS: &'static [&'static str];

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
    fn field_values(&self) -> Vec<Value>;
    fn from_fields(meta: RecordMeta, row: &FieldRow<'_, '_>) -> rusqlite::Result<Self>;
}

/// Typed access to the entity-specific columns of a row
pub struct FieldRow<'r, 's> {
    row: &'r Row<'s>,
    offset: usize,
}

impl FieldRow<'_, '_> {
    pub fn text(&self, index: usize) -> rusqlite::Result<String> {
        self.row.get(self.offset + index)
    }

    pub fn opt_text(&self, index: usize) -> rusqlite::Result<Option<String>> {
        self.row.get(self.offset + index)
    }

    pub fn flag(&self, index: usize) -> rusqlite::Result<bool> {
        self.row.get(self.offset + index)
    }

    pub fn date(&self, index: usize) -> rusqlite::Result<NaiveDate> {
        self.row.get(self.offset + index)
    }

    pub fn opt_date(&self, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
        self.row.get(self.offset + index)
    }

    pub fn id(&self, index: usize) -> rusqlite::Result<RecordId> {
        parse_column(self.offset + index, &self.text(index)?)
    }

    pub fn decimal(&self, index: usize) -> rusqlite::Result<Decimal> {
        parse_column(self.offset + index, &self.text(index)?)
    }

    pub fn parsed<T>(&self, index: usize) -> rusqlite::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        parse_column(self.offset + index, &self.text(index)?)
    }
}

fn parse_column<T>(index: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error)))
}

pub fn text_value(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub fn opt_text_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text_value)
}

pub fn display_value<T: ToString>(value: T) -> Value {
    Value::Text(value.to_string())
}

pub fn opt_display_value<T: ToString>(value: Option<T>) -> Value {
    value.map_or(Value::Null, display_value)
}

pub fn flag_value(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

fn read_meta(row: &Row<'_>) -> rusqlite::Result<RecordMeta> {
    let id: String = row.get(0)?;
    let updated_at: i64 = row.get(13)?;
    let status = if row.get::<_, bool>(2)? {
        RecordStatus::Deleted {
            deleted_at: row.get::<_, Option<i64>>(3)?.unwrap_or(updated_at),
        }
    } else {
        RecordStatus::Live
    };

    let origin = match (row.get::<_, Option<String>>(5)?, row.get::<_, Option<String>>(6)?) {
        (Some(device_id), Some(local_id)) => Some(SyncOrigin {
            device_id,
            local_id,
        }),
        _ => None,
    };

    let sync = match (
        row.get::<_, Option<i64>>(7)?,
        row.get::<_, Option<i64>>(8)?,
        row.get::<_, Option<String>>(9)?,
    ) {
        (Some(synced_at), Some(original_timestamp), Some(local_id)) => Some(SyncMetadata {
            synced_at,
            original_timestamp,
            local_id,
        }),
        _ => None,
    };

    Ok(RecordMeta {
        id: parse_column(0, &id)?,
        version: row.get(1)?,
        status,
        idempotency_key: row.get(4)?,
        origin,
        sync,
        created_by: row.get(10)?,
        updated_by: row.get(11)?,
        created_at: row.get(12)?,
        updated_at,
    })
}

fn meta_values(meta: &RecordMeta) -> Vec<Value> {
    vec![
        text_value(&meta.id.as_str()),
        Value::Integer(meta.version),
        flag_value(!meta.is_live()),
        meta.status.deleted_at().map_or(Value::Null, Value::Integer),
        opt_text_value(meta.idempotency_key.as_deref()),
        opt_text_value(meta.origin.as_ref().map(|o| o.device_id.as_str())),
        opt_text_value(meta.origin.as_ref().map(|o| o.local_id.as_str())),
        meta.sync.as_ref().map_or(Value::Null, |s| Value::Integer(s.synced_at)),
        meta.sync
            .as_ref()
            .map_or(Value::Null, |s| Value::Integer(s.original_timestamp)),
        opt_text_value(meta.sync.as_ref().map(|s| s.local_id.as_str())),
        opt_text_value(meta.created_by.as_deref()),
        opt_text_value(meta.updated_by.as_deref()),
        Value::Integer(meta.created_at),
        Value::Integer(meta.updated_at),
    ]
}

/// `SQLite` repository for one entity kind
pub struct RecordRepository<'a, T> {
    conn: &'a Connection,
    _record: PhantomData<T>,
}

impl<'a, T: StoredRecord> RecordRepository<'a, T> {
    /// Create a new repository with the given connection (or open transaction)
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            _record: PhantomData,
        }
    }

    fn columns() -> String {
        META_COLUMNS
            .iter()
            .chain(T::FIELDS)
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn parse(row: &Row<'_>) -> rusqlite::Result<T> {
        let meta = read_meta(row)?;
        T::from_fields(
            meta,
            &FieldRow {
                row,
                offset: META_COLUMNS.len(),
            },
        )
    }

    /// Select records matching a `WHERE` clause (plus optional ordering/limit)
    pub(crate) fn select(&self, clause: &str, params: impl Params) -> Result<Vec<T>> {
        let sql = format!("SELECT {} FROM {} WHERE {clause}", Self::columns(), T::TABLE);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params, Self::parse)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn select_one(&self, clause: &str, params: impl Params) -> Result<Option<T>> {
        let sql = format!("SELECT {} FROM {} WHERE {clause}", Self::columns(), T::TABLE);
        Ok(self.conn.query_row(&sql, params, Self::parse).optional()?)
    }

    /// Get a record by ID, deleted or not
    pub fn find(&self, id: &RecordId) -> Result<Option<T>> {
        self.select_one("id = ?", [id.as_str()])
    }

    /// Get a live record by ID
    pub fn get(&self, id: &RecordId) -> Result<Option<T>> {
        self.select_one("id = ? AND is_deleted = 0", [id.as_str()])
    }

    pub fn find_by_idempotency_key(&self, key: &str) -> Result<Option<T>> {
        self.select_one("idempotency_key = ?", [key])
    }

    /// Find the record created by a device's client-local operation
    pub fn find_by_origin(&self, device_id: &str, local_id: &str) -> Result<Option<T>> {
        self.select_one(
            "origin_device_id = ? AND origin_local_id = ?",
            [device_id, local_id],
        )
    }

    /// List live records, most recently updated first
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<T>> {
        self.select(
            "is_deleted = 0 ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
            [limit as i64, offset as i64],
        )
    }

    /// Records (tombstones included) updated strictly after `since`, oldest first
    pub fn changed_since(&self, since: i64, limit: usize) -> Result<Vec<T>> {
        self.select(
            "updated_at > ? ORDER BY updated_at ASC, id ASC LIMIT ?",
            [since, limit as i64],
        )
    }

    /// Insert a new record. A collision on the id, the idempotency key or the
    /// origin pair is reported as [`Error::Duplicate`].
    pub fn insert(&self, record: &T) -> Result<()> {
        let mut values = meta_values(record.meta());
        values.extend(record.field_values());

        let columns = Self::columns();
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!("INSERT INTO {} ({columns}) VALUES ({placeholders})", T::TABLE);
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|error| match Error::from(error) {
                error if error.is_unique_violation() => {
                    Error::Duplicate(format!("{} {}", T::KIND, record.meta().id))
                }
                error => error,
            })?;
        Ok(())
    }

    /// Write back a mutated record if the stored row is still at `expected_version`.
    ///
    /// Returns `false` when another writer got there first.
    pub fn save(&self, record: &T, expected_version: i64) -> Result<bool> {
        let meta = meta_values(record.meta());
        let mut values: Vec<Value> = META_COLUMNS
            .iter()
            .zip(meta)
            .filter(|(column, _)| MUTABLE_META_COLUMNS.contains(*column))
            .map(|(_, value)| value)
            .collect();
        values.extend(record.field_values());
        values.push(text_value(&record.meta().id.as_str()));
        values.push(Value::Integer(expected_version));

        let assignments = MUTABLE_META_COLUMNS
            .iter()
            .chain(T::FIELDS)
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE id = ? AND version = ?",
            T::TABLE
        );
        let rows = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(rows == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{NewSupplier, Supplier};
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn supplier(name: &str) -> Supplier {
        Supplier::new(
            RecordMeta::new(Some("admin".into())),
            NewSupplier {
                name: name.into(),
                code: None,
                phone: None,
                address: None,
                region: None,
                is_active: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let db = setup();
        let repo = RecordRepository::<Supplier>::new(db.connection());

        let record = supplier("Acme");
        repo.insert(&record).unwrap();

        let fetched = repo.find(&record.meta.id).unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn test_insert_reports_taken_key_as_duplicate() {
        let db = setup();
        let repo = RecordRepository::<Supplier>::new(db.connection());

        let mut first = supplier("Acme");
        first.meta.idempotency_key = Some("key-1".into());
        repo.insert(&first).unwrap();

        let mut second = supplier("Other");
        second.meta.idempotency_key = Some("key-1".into());
        let err = repo.insert(&second).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
        assert!(err.is_unique_violation());

        assert!(matches!(repo.insert(&first), Err(Error::Duplicate(_))));
    }

    #[test]
    fn test_save_is_compare_and_swap() {
        let db = setup();
        let repo = RecordRepository::<Supplier>::new(db.connection());

        let mut record = supplier("Acme");
        repo.insert(&record).unwrap();

        record.name = "Acme Ltd".into();
        record.meta.touch(Some("admin"), None);
        assert!(repo.save(&record, 1).unwrap());

        // A second writer still holding version 1 loses
        let mut stale = record.clone();
        stale.name = "Stale".into();
        assert!(!repo.save(&stale, 1).unwrap());

        let stored = repo.find(&record.meta.id).unwrap().unwrap();
        assert_eq!(stored.meta.version, 2);
        assert_eq!(stored.name, "Acme Ltd");
    }

    #[test]
    fn test_deleted_records_excluded_from_reads_but_addressable() {
        let db = setup();
        let repo = RecordRepository::<Supplier>::new(db.connection());

        let mut record = supplier("Gone");
        repo.insert(&record).unwrap();
        record.meta.mark_deleted(None, None);
        assert!(repo.save(&record, 1).unwrap());

        assert!(repo.get(&record.meta.id).unwrap().is_none());
        assert!(repo.list(10, 0).unwrap().is_empty());

        let found = repo.find(&record.meta.id).unwrap().unwrap();
        assert!(!found.meta.is_live());
        assert_eq!(found.meta.version, 2);
    }

    #[test]
    fn test_idempotency_key_collision_is_unique_violation() {
        let db = setup();
        let repo = RecordRepository::<Supplier>::new(db.connection());

        let mut first = supplier("One");
        first.meta.idempotency_key = Some("key-1".into());
        repo.insert(&first).unwrap();

        let mut second = supplier("Two");
        second.meta.idempotency_key = Some("key-1".into());
        let err = repo.insert(&second).unwrap_err();
        assert!(err.is_unique_violation());

        let found = repo.find_by_idempotency_key("key-1").unwrap().unwrap();
        assert_eq!(found.meta.id, first.meta.id);
    }

    #[test]
    fn test_changed_since_includes_tombstones() {
        let db = setup();
        let repo = RecordRepository::<Supplier>::new(db.connection());

        let mut record = supplier("Tomb");
        repo.insert(&record).unwrap();
        let since = record.meta.updated_at;

        assert!(repo.changed_since(since, 10).unwrap().is_empty());

        record.meta.mark_deleted(None, None);
        record.meta.updated_at = since + 1;
        record.meta.status = RecordStatus::Deleted {
            deleted_at: since + 1,
        };
        repo.save(&record, 1).unwrap();

        let changes = repo.changed_since(since, 10).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(!changes[0].meta.is_live());
    }
}
