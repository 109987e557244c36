//! Collection model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::rate_version::RateVersion;
use super::record::{RecordId, RecordMeta};

/// A quantity of product received from a supplier on a given day.
///
/// `rate_version_id` and `applied_rate` are copied from the rate effective on
/// `collection_date` when the collection is created and never change after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub supplier_id: RecordId,
    pub product_id: RecordId,
    pub unit: String,
    pub quantity: Decimal,
    pub collection_date: NaiveDate,
    pub rate_version_id: RecordId,
    pub applied_rate: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCollection {
    pub supplier_id: RecordId,
    pub product_id: RecordId,
    /// Falls back to the product's default unit
    #[serde(default)]
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub collection_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Only the quantity and notes of a collection can be edited
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionPatch {
    pub quantity: Option<Decimal>,
    pub notes: Option<String>,
}

impl Collection {
    /// Build a collection valued at the given rate snapshot
    pub fn new(meta: RecordMeta, input: NewCollection, unit: String, rate: &RateVersion) -> Result<Self> {
        validate_quantity(input.quantity)?;
        Ok(Self {
            meta,
            supplier_id: input.supplier_id,
            product_id: input.product_id,
            unit,
            quantity: input.quantity,
            collection_date: input.collection_date,
            rate_version_id: rate.meta.id,
            applied_rate: rate.rate,
            notes: normalize_text_option(input.notes),
        })
    }

    pub fn apply(&mut self, patch: CollectionPatch) -> Result<()> {
        if let Some(quantity) = patch.quantity {
            validate_quantity(quantity)?;
            self.quantity = quantity;
        }
        if patch.notes.is_some() {
            self.notes = normalize_text_option(patch.notes);
        }
        Ok(())
    }

    /// Value of the collection at its snapshotted rate
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.quantity * self.applied_rate
    }
}

fn validate_quantity(quantity: Decimal) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!(
            "Collection quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}
