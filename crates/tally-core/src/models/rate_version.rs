//! Time-windowed product rates

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::product::normalize_unit;
use super::record::{RecordId, RecordMeta};

/// Rate for one product and unit, effective on `[effective_from, effective_to)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateVersion {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub product_id: RecordId,
    pub unit: String,
    pub rate: Decimal,
    /// First day the rate applies (inclusive)
    pub effective_from: NaiveDate,
    /// First day the rate no longer applies; `None` is open-ended
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRateVersion {
    pub product_id: RecordId,
    pub unit: String,
    pub rate: Decimal,
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateVersionPatch {
    pub rate: Option<Decimal>,
    pub effective_to: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

impl RateVersion {
    pub fn new(meta: RecordMeta, input: NewRateVersion) -> Result<Self> {
        let unit = normalize_unit(&input.unit);
        if unit.is_empty() {
            return Err(Error::InvalidInput("Rate unit must not be empty".into()));
        }
        let rate = Self {
            meta,
            product_id: input.product_id,
            unit,
            rate: input.rate,
            effective_from: input.effective_from,
            effective_to: input.effective_to,
            is_active: true,
            notes: normalize_text_option(input.notes),
        };
        rate.validate()?;
        Ok(rate)
    }

    pub fn apply(&mut self, patch: RateVersionPatch) -> Result<()> {
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if patch.effective_to.is_some() {
            self.effective_to = patch.effective_to;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if patch.notes.is_some() {
            self.notes = normalize_text_option(patch.notes);
        }
        self.validate()
    }

    /// True if `date` falls inside this window
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date < to)
    }

    /// True if the two half-open windows share at least one day
    #[must_use]
    pub fn overlaps(&self, from: NaiveDate, to: Option<NaiveDate>) -> bool {
        let starts_before_other_ends = to.is_none_or(|to| self.effective_from < to);
        let other_starts_before_end = self.effective_to.is_none_or(|end| from < end);
        starts_before_other_ends && other_starts_before_end
    }

    fn validate(&self) -> Result<()> {
        if self.rate < Decimal::ZERO {
            return Err(Error::InvalidInput("Rate must not be negative".into()));
        }
        if let Some(to) = self.effective_to {
            if to <= self.effective_from {
                return Err(Error::InvalidInput(format!(
                    "Rate window end {to} must be after its start {}",
                    self.effective_from
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn rate(from: &str, to: Option<&str>) -> RateVersion {
        RateVersion::new(
            RecordMeta::new(None),
            NewRateVersion {
                product_id: RecordId::new(),
                unit: "KG".into(),
                rate: Decimal::new(1000, 2),
                effective_from: date(from),
                effective_to: to.map(date),
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_covers_is_half_open() {
        let window = rate("2024-01-01", Some("2024-06-01"));
        assert!(window.covers(date("2024-01-01")));
        assert!(window.covers(date("2024-05-31")));
        assert!(!window.covers(date("2024-06-01")));
        assert!(!window.covers(date("2023-12-31")));
    }

    #[test]
    fn test_open_ended_window_covers_future() {
        let window = rate("2024-06-01", None);
        assert!(window.covers(date("2030-01-01")));
    }

    #[test]
    fn test_overlaps() {
        let window = rate("2024-01-01", Some("2024-06-01"));
        assert!(window.overlaps(date("2024-05-01"), None));
        assert!(!window.overlaps(date("2024-06-01"), None));
        assert!(!window.overlaps(date("2023-01-01"), Some(date("2024-01-01"))));

        let open = rate("2024-06-01", None);
        assert!(open.overlaps(date("2025-01-01"), None));
    }

    #[test]
    fn test_rejects_negative_rate_and_inverted_window() {
        let mut window = rate("2024-01-01", None);
        assert!(window
            .apply(RateVersionPatch {
                rate: Some(Decimal::new(-1, 0)),
                ..RateVersionPatch::default()
            })
            .is_err());
        assert!(window
            .apply(RateVersionPatch {
                rate: Some(Decimal::ZERO),
                effective_to: Some(date("2023-12-31")),
                ..RateVersionPatch::default()
            })
            .is_err());
    }

    #[test]
    fn test_unit_is_normalized() {
        assert_eq!(rate("2024-01-01", None).unit, "kg");
    }
}
