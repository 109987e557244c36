//! Supplier balances derived from collections and payments

use rust_decimal::Decimal;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::RecordRepository;
use crate::error::{Error, Result};
use crate::models::{Collection, Payment, PaymentType, RecordId, Supplier};

/// What a supplier has delivered against what they have been paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierBalance {
    pub supplier_id: RecordId,
    pub supplier_name: String,
    pub collection_count: usize,
    /// Sum of collection totals at their snapshotted rates
    pub total_collected: Decimal,
    pub payment_count: usize,
    pub total_paid: Decimal,
    pub paid_advance: Decimal,
    pub paid_partial: Decimal,
    pub paid_full: Decimal,
    /// Amount still owed to the supplier; negative when overpaid
    pub balance: Decimal,
}

/// Balance over a supplier's live collections and payments
pub fn supplier_balance(conn: &Connection, supplier_id: &RecordId) -> Result<SupplierBalance> {
    let supplier = RecordRepository::<Supplier>::new(conn)
        .get(supplier_id)?
        .ok_or_else(|| Error::NotFound(format!("supplier {supplier_id}")))?;

    let live_for_supplier = "supplier_id = ? AND is_deleted = 0";
    let collections = RecordRepository::<Collection>::new(conn)
        .select(live_for_supplier, [supplier_id.as_str()])?;
    let payments =
        RecordRepository::<Payment>::new(conn).select(live_for_supplier, [supplier_id.as_str()])?;

    let total_collected = collections.iter().map(Collection::total_amount).sum::<Decimal>();
    let paid = |payment_type: PaymentType| {
        payments
            .iter()
            .filter(|payment| payment.payment_type == payment_type)
            .map(|payment| payment.amount)
            .sum::<Decimal>()
    };
    let paid_advance = paid(PaymentType::Advance);
    let paid_partial = paid(PaymentType::Partial);
    let paid_full = paid(PaymentType::Full);
    let total_paid = paid_advance + paid_partial + paid_full;

    Ok(SupplierBalance {
        supplier_id: supplier.meta.id,
        supplier_name: supplier.name,
        collection_count: collections.len(),
        total_collected,
        payment_count: payments.len(),
        total_paid,
        paid_advance,
        paid_partial,
        paid_full,
        balance: total_collected - total_paid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{NewCollection, NewPayment, RecordMeta};
    use crate::test_support::{date, seed_product, seed_rate, seed_supplier};
    use pretty_assertions::assert_eq;

    fn pay(conn: &Connection, supplier: &Supplier, amount: i64, payment_type: PaymentType) -> Payment {
        let payment = Payment::new(
            RecordMeta::new(None),
            NewPayment {
                supplier_id: supplier.meta.id,
                amount: Decimal::new(amount, 0),
                payment_type,
                payment_date: date("2024-03-05"),
                reference: None,
                notes: None,
            },
        )
        .unwrap();
        RecordRepository::<Payment>::new(conn).insert(&payment).unwrap();
        payment
    }

    #[test]
    fn test_balance_uses_snapshotted_rates_and_skips_deleted() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let supplier = seed_supplier(conn, "Acme");
        let product = seed_product(conn, "Tea", "kg");
        let rate = seed_rate(conn, &product, Decimal::new(1050, 2), "2024-01-01", None);

        let collection = Collection::new(
            RecordMeta::new(None),
            NewCollection {
                supplier_id: supplier.meta.id,
                product_id: product.meta.id,
                unit: None,
                quantity: Decimal::new(20, 0),
                collection_date: date("2024-03-01"),
                notes: None,
            },
            "kg".into(),
            &rate,
        )
        .unwrap();
        RecordRepository::<Collection>::new(conn).insert(&collection).unwrap();

        pay(conn, &supplier, 50, PaymentType::Advance);
        pay(conn, &supplier, 100, PaymentType::Partial);
        let mut voided = pay(conn, &supplier, 999, PaymentType::Full);
        voided.meta.mark_deleted(None, None);
        assert!(RecordRepository::<Payment>::new(conn).save(&voided, 1).unwrap());

        let balance = supplier_balance(conn, &supplier.meta.id).unwrap();
        assert_eq!(balance.collection_count, 1);
        assert_eq!(balance.total_collected, Decimal::new(210, 0));
        assert_eq!(balance.payment_count, 2);
        assert_eq!(balance.paid_advance, Decimal::new(50, 0));
        assert_eq!(balance.paid_full, Decimal::ZERO);
        assert_eq!(balance.total_paid, Decimal::new(150, 0));
        assert_eq!(balance.balance, Decimal::new(60, 0));
    }

    #[test]
    fn test_unknown_supplier_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = supplier_balance(db.connection(), &RecordId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
