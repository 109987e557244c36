//! Product model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::record::RecordMeta;

/// A product that can be collected and rated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub code: Option<String>,
    /// Unit used when a collection does not name one (e.g. `kg`)
    pub default_unit: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(alias = "unit")]
    pub default_unit: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(alias = "unit")]
    pub default_unit: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl Product {
    pub fn new(meta: RecordMeta, input: NewProduct) -> Result<Self> {
        Ok(Self {
            meta,
            name: required(input.name, "Product name")?,
            code: normalize_text_option(input.code),
            default_unit: normalize_unit(&required(input.default_unit, "Product unit")?),
            description: normalize_text_option(input.description),
            is_active: input.is_active.unwrap_or(true),
        })
    }

    pub fn apply(&mut self, patch: ProductPatch) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = required(name, "Product name")?;
        }
        if patch.code.is_some() {
            self.code = normalize_text_option(patch.code);
        }
        if let Some(unit) = patch.default_unit {
            self.default_unit = normalize_unit(&required(unit, "Product unit")?);
        }
        if patch.description.is_some() {
            self.description = normalize_text_option(patch.description);
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        Ok(())
    }
}

/// Units compare case-insensitively (`KG` and `kg` are the same unit)
#[must_use]
pub fn normalize_unit(unit: &str) -> String {
    unit.trim().to_lowercase()
}

fn required(value: String, what: &str) -> Result<String> {
    normalize_text_option(Some(value))
        .ok_or_else(|| Error::InvalidInput(format!("{what} must not be empty")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_unit() {
        let product = Product::new(
            RecordMeta::new(None),
            NewProduct {
                name: "Tea leaves".into(),
                code: None,
                default_unit: " KG ".into(),
                description: None,
                is_active: None,
            },
        )
        .unwrap();
        assert_eq!(product.default_unit, "kg");
    }

    #[test]
    fn test_payload_accepts_unit_alias() {
        let input: NewProduct =
            serde_json::from_value(serde_json::json!({"name": "Milk", "unit": "litre"})).unwrap();
        assert_eq!(input.default_unit, "litre");
    }

    #[test]
    fn test_apply_rejects_blank_unit() {
        let mut product = Product::new(
            RecordMeta::new(None),
            NewProduct {
                name: "Milk".into(),
                code: None,
                default_unit: "litre".into(),
                description: None,
                is_active: None,
            },
        )
        .unwrap();
        let result = product.apply(ProductPatch {
            default_unit: Some(" ".into()),
            ..ProductPatch::default()
        });
        assert!(result.is_err());
        assert_eq!(product.default_unit, "litre");
    }
}
