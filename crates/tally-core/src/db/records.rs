//! Table mappings for each entity kind

use rusqlite::types::Value;

use super::repository::{
    display_value, flag_value, opt_display_value, opt_text_value, text_value, FieldRow,
    StoredRecord,
};
use crate::models::{Collection, EntityKind, Payment, Product, RateVersion, RecordMeta, Supplier};

impl StoredRecord for Supplier {
    const KIND: EntityKind = EntityKind::Supplier;
    const TABLE: &'static str = "suppliers";
    const FIELDS: &'static [&'static str] =
        &["name", "code", "phone", "address", "region", "is_active"];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            text_value(&self.name),
            opt_text_value(self.code.as_deref()),
            opt_text_value(self.phone.as_deref()),
            opt_text_value(self.address.as_deref()),
            opt_text_value(self.region.as_deref()),
            flag_value(self.is_active),
        ]
    }

    fn from_fields(meta: RecordMeta, row: &FieldRow<'_, '_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta,
            name: row.text(0)?,
            code: row.opt_text(1)?,
            phone: row.opt_text(2)?,
            address: row.opt_text(3)?,
            region: row.opt_text(4)?,
            is_active: row.flag(5)?,
        })
    }
}

impl StoredRecord for Product {
    const KIND: EntityKind = EntityKind::Product;
    const TABLE: &'static str = "products";
    const FIELDS: &'static [&'static str] =
        &["name", "code", "default_unit", "description", "is_active"];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            text_value(&self.name),
            opt_text_value(self.code.as_deref()),
            text_value(&self.default_unit),
            opt_text_value(self.description.as_deref()),
            flag_value(self.is_active),
        ]
    }

    fn from_fields(meta: RecordMeta, row: &FieldRow<'_, '_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta,
            name: row.text(0)?,
            code: row.opt_text(1)?,
            default_unit: row.text(2)?,
            description: row.opt_text(3)?,
            is_active: row.flag(4)?,
        })
    }
}

impl StoredRecord for RateVersion {
    const KIND: EntityKind = EntityKind::RateVersion;
    const TABLE: &'static str = "rate_versions";
    const FIELDS: &'static [&'static str] = &[
        "product_id",
        "unit",
        "rate",
        "effective_from",
        "effective_to",
        "is_active",
        "notes",
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            display_value(self.product_id),
            text_value(&self.unit),
            display_value(self.rate),
            display_value(self.effective_from),
            opt_display_value(self.effective_to),
            flag_value(self.is_active),
            opt_text_value(self.notes.as_deref()),
        ]
    }

    fn from_fields(meta: RecordMeta, row: &FieldRow<'_, '_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta,
            product_id: row.id(0)?,
            unit: row.text(1)?,
            rate: row.decimal(2)?,
            effective_from: row.date(3)?,
            effective_to: row.opt_date(4)?,
            is_active: row.flag(5)?,
            notes: row.opt_text(6)?,
        })
    }
}

impl StoredRecord for Collection {
    const KIND: EntityKind = EntityKind::Collection;
    const TABLE: &'static str = "collections";
    const FIELDS: &'static [&'static str] = &[
        "supplier_id",
        "product_id",
        "unit",
        "quantity",
        "collection_date",
        "rate_version_id",
        "applied_rate",
        "notes",
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            display_value(self.supplier_id),
            display_value(self.product_id),
            text_value(&self.unit),
            display_value(self.quantity),
            display_value(self.collection_date),
            display_value(self.rate_version_id),
            display_value(self.applied_rate),
            opt_text_value(self.notes.as_deref()),
        ]
    }

    fn from_fields(meta: RecordMeta, row: &FieldRow<'_, '_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta,
            supplier_id: row.id(0)?,
            product_id: row.id(1)?,
            unit: row.text(2)?,
            quantity: row.decimal(3)?,
            collection_date: row.date(4)?,
            rate_version_id: row.id(5)?,
            applied_rate: row.decimal(6)?,
            notes: row.opt_text(7)?,
        })
    }
}

impl StoredRecord for Payment {
    const KIND: EntityKind = EntityKind::Payment;
    const TABLE: &'static str = "payments";
    const FIELDS: &'static [&'static str] = &[
        "supplier_id",
        "amount",
        "payment_type",
        "payment_date",
        "reference",
        "notes",
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            display_value(self.supplier_id),
            display_value(self.amount),
            text_value(self.payment_type.as_str()),
            display_value(self.payment_date),
            opt_text_value(self.reference.as_deref()),
            opt_text_value(self.notes.as_deref()),
        ]
    }

    fn from_fields(meta: RecordMeta, row: &FieldRow<'_, '_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta,
            supplier_id: row.id(0)?,
            amount: row.decimal(1)?,
            payment_type: row.parsed(2)?,
            payment_date: row.date(3)?,
            reference: row.opt_text(4)?,
            notes: row.opt_text(5)?,
        })
    }
}
