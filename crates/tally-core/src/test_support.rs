//! Seeding helpers shared by unit tests

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::Connection;

use crate::db::RecordRepository;
use crate::models::{
    NewProduct, NewRateVersion, NewSupplier, Product, RateVersion, RecordMeta, Supplier,
};

pub fn date(value: &str) -> NaiveDate {
    value.parse().unwrap()
}

pub fn seed_supplier(conn: &Connection, name: &str) -> Supplier {
    let supplier = Supplier::new(
        RecordMeta::new(Some("seed".into())),
        NewSupplier {
            name: name.into(),
            code: None,
            phone: None,
            address: None,
            region: None,
            is_active: None,
        },
    )
    .unwrap();
    RecordRepository::<Supplier>::new(conn).insert(&supplier).unwrap();
    supplier
}

pub fn seed_product(conn: &Connection, name: &str, unit: &str) -> Product {
    let product = Product::new(
        RecordMeta::new(Some("seed".into())),
        NewProduct {
            name: name.into(),
            code: None,
            default_unit: unit.into(),
            description: None,
            is_active: None,
        },
    )
    .unwrap();
    RecordRepository::<Product>::new(conn).insert(&product).unwrap();
    product
}

pub fn seed_rate(
    conn: &Connection,
    product: &Product,
    rate: Decimal,
    from: &str,
    to: Option<&str>,
) -> RateVersion {
    let rate = RateVersion::new(
        RecordMeta::new(Some("seed".into())),
        NewRateVersion {
            product_id: product.meta.id,
            unit: product.default_unit.clone(),
            rate,
            effective_from: date(from),
            effective_to: to.map(date),
            notes: None,
        },
    )
    .unwrap();
    RecordRepository::<RateVersion>::new(conn).insert(&rate).unwrap();
    rate
}
