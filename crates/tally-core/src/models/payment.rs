//! Payment model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::record::{RecordId, RecordMeta};

/// How a payment settles the supplier's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Advance,
    Partial,
    #[serde(alias = "final")]
    Full,
}

impl PaymentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Partial => "partial",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advance" => Ok(Self::Advance),
            "partial" => Ok(Self::Partial),
            "full" | "final" => Ok(Self::Full),
            other => Err(Error::InvalidInput(format!("Unknown payment type: {other}"))),
        }
    }
}

/// Money paid out to a supplier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub supplier_id: RecordId,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub payment_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub supplier_id: RecordId,
    pub amount: Decimal,
    #[serde(alias = "type")]
    pub payment_type: PaymentType,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentPatch {
    pub amount: Option<Decimal>,
    #[serde(alias = "type")]
    pub payment_type: Option<PaymentType>,
    pub payment_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl Payment {
    pub fn new(meta: RecordMeta, input: NewPayment) -> Result<Self> {
        validate_amount(input.amount)?;
        Ok(Self {
            meta,
            supplier_id: input.supplier_id,
            amount: input.amount,
            payment_type: input.payment_type,
            payment_date: input.payment_date,
            reference: normalize_text_option(input.reference),
            notes: normalize_text_option(input.notes),
        })
    }

    pub fn apply(&mut self, patch: PaymentPatch) -> Result<()> {
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
            self.amount = amount;
        }
        if let Some(payment_type) = patch.payment_type {
            self.payment_type = payment_type;
        }
        if let Some(payment_date) = patch.payment_date {
            self.payment_date = payment_date;
        }
        if patch.reference.is_some() {
            self.reference = normalize_text_option(patch.reference);
        }
        if patch.notes.is_some() {
            self.notes = normalize_text_option(patch.notes);
        }
        Ok(())
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!(
            "Payment amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_type_parse() {
        assert_eq!("advance".parse::<PaymentType>().unwrap(), PaymentType::Advance);
        assert_eq!("FINAL".parse::<PaymentType>().unwrap(), PaymentType::Full);
        assert!("refund".parse::<PaymentType>().is_err());
    }

    #[test]
    fn test_payload_accepts_type_alias_and_final() {
        let input: NewPayment = serde_json::from_value(serde_json::json!({
            "supplier_id": RecordId::new(),
            "amount": "150.50",
            "type": "final",
            "payment_date": "2024-04-01",
        }))
        .unwrap();
        assert_eq!(input.payment_type, PaymentType::Full);
        assert_eq!(input.amount, Decimal::new(15050, 2));
    }

    #[test]
    fn test_amount_must_be_positive() {
        let input = NewPayment {
            supplier_id: RecordId::new(),
            amount: Decimal::ZERO,
            payment_type: PaymentType::Advance,
            payment_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            reference: None,
            notes: None,
        };
        assert!(Payment::new(RecordMeta::new(None), input).is_err());
    }
}
