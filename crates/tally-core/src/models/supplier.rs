//! Supplier model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::record::RecordMeta;

/// A supplier delivering produce to collection points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub code: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub is_active: bool,
}

/// Payload of a supplier create operation
#[derive(Debug, Clone, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Fields a supplier update may change; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub is_active: Option<bool>,
}

impl Supplier {
    /// Build a supplier from a create payload
    pub fn new(meta: RecordMeta, input: NewSupplier) -> Result<Self> {
        Ok(Self {
            meta,
            name: required_name(input.name)?,
            code: normalize_text_option(input.code),
            phone: normalize_text_option(input.phone),
            address: normalize_text_option(input.address),
            region: normalize_text_option(input.region),
            is_active: input.is_active.unwrap_or(true),
        })
    }

    /// Apply the fields present in `patch`
    pub fn apply(&mut self, patch: SupplierPatch) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = required_name(name)?;
        }
        if patch.code.is_some() {
            self.code = normalize_text_option(patch.code);
        }
        if patch.phone.is_some() {
            self.phone = normalize_text_option(patch.phone);
        }
        if patch.address.is_some() {
            self.address = normalize_text_option(patch.address);
        }
        if patch.region.is_some() {
            self.region = normalize_text_option(patch.region);
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        Ok(())
    }
}

fn required_name(name: String) -> Result<String> {
    normalize_text_option(Some(name))
        .ok_or_else(|| Error::InvalidInput("Supplier name must not be empty".into()))
}
