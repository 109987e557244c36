//! Time-windowed rate lookup

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::db::RecordRepository;
use crate::error::{Error, Result};
use crate::models::{normalize_unit, RateVersion, RecordId};

/// Resolves the rate effective for a product and unit on a given day.
///
/// Windows are half-open `[effective_from, effective_to)`. Deactivated windows
/// still resolve the dates they cover so historical collections can be valued;
/// deleted windows never do. Should windows overlap, an active window wins
/// over a deactivated one, then the latest start, then the most recently
/// created.
pub struct RateSnapshotResolver<'a> {
    conn: &'a Connection,
}

impl<'a> RateSnapshotResolver<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn resolve(
        &self,
        product_id: &RecordId,
        unit: &str,
        as_of: NaiveDate,
    ) -> Result<Option<RateVersion>> {
        let as_of = as_of.to_string();
        let mut rates = RecordRepository::<RateVersion>::new(self.conn).select(
            "product_id = ? AND unit = ? AND is_deleted = 0
               AND effective_from <= ?
               AND (effective_to IS NULL OR effective_to > ?)
             ORDER BY is_active DESC, effective_from DESC, created_at DESC, id DESC
             LIMIT 1",
            params![product_id.as_str(), normalize_unit(unit), as_of, as_of],
        )?;
        Ok(rates.pop())
    }

    /// Like [`Self::resolve`], but a missing rate is an error
    pub fn require(&self, product_id: &RecordId, unit: &str, as_of: NaiveDate) -> Result<RateVersion> {
        self.resolve(product_id, unit, as_of)?
            .ok_or_else(|| Error::NoEffectiveRate {
                product_id: product_id.as_str(),
                unit: normalize_unit(unit),
                date: as_of,
            })
    }

    /// Active, live windows for a product and unit, earliest first
    pub fn active_windows(&self, product_id: &RecordId, unit: &str) -> Result<Vec<RateVersion>> {
        RecordRepository::<RateVersion>::new(self.conn).select(
            "product_id = ? AND unit = ? AND is_deleted = 0 AND is_active = 1
             ORDER BY effective_from ASC, created_at ASC",
            params![product_id.as_str(), normalize_unit(unit)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::RecordStatus;
    use crate::test_support::{date, seed_product, seed_rate};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_resolves_half_open_windows() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let product = seed_product(conn, "Tea leaves", "kg");
        let a = seed_rate(conn, &product, Decimal::new(1000, 2), "2024-01-01", Some("2024-06-01"));
        let b = seed_rate(conn, &product, Decimal::new(1200, 2), "2024-06-01", None);

        let resolver = RateSnapshotResolver::new(conn);
        let id = product.meta.id;
        assert_eq!(resolver.resolve(&id, "kg", date("2024-05-31")).unwrap().unwrap().meta.id, a.meta.id);
        assert_eq!(resolver.resolve(&id, "kg", date("2024-06-01")).unwrap().unwrap().meta.id, b.meta.id);
        assert!(resolver.resolve(&id, "kg", date("2023-12-31")).unwrap().is_none());
    }

    #[test]
    fn test_unit_is_matched_case_insensitively() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let product = seed_product(conn, "Milk", "L");
        seed_rate(conn, &product, Decimal::ONE, "2024-01-01", None);

        let resolver = RateSnapshotResolver::new(conn);
        assert!(resolver.resolve(&product.meta.id, " l ", date("2024-02-01")).unwrap().is_some());
        assert!(resolver.resolve(&product.meta.id, "kg", date("2024-02-01")).unwrap().is_none());
    }

    #[test]
    fn test_overlap_prefers_latest_start() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let product = seed_product(conn, "Tea leaves", "kg");
        seed_rate(conn, &product, Decimal::new(10, 0), "2024-01-01", None);
        let later = seed_rate(conn, &product, Decimal::new(11, 0), "2024-03-01", None);

        let resolved = RateSnapshotResolver::new(conn)
            .resolve(&product.meta.id, "kg", date("2024-04-01"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.meta.id, later.meta.id);
    }

    #[test]
    fn test_active_window_wins_over_deactivated_overlap() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let product = seed_product(conn, "Tea leaves", "kg");
        let active = seed_rate(conn, &product, Decimal::new(10, 0), "2024-01-01", None);
        let mut retired = seed_rate(conn, &product, Decimal::new(11, 0), "2024-03-01", None);

        retired.is_active = false;
        retired.meta.touch(None, None);
        assert!(RecordRepository::<RateVersion>::new(conn)
            .save(&retired, 1)
            .unwrap());

        let resolved = RateSnapshotResolver::new(conn)
            .resolve(&product.meta.id, "kg", date("2024-04-01"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.meta.id, active.meta.id);
    }

    #[test]
    fn test_deleted_windows_are_skipped_but_inactive_ones_resolve() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let product = seed_product(conn, "Tea leaves", "kg");
        let mut inactive = seed_rate(conn, &product, Decimal::new(9, 0), "2024-01-01", Some("2024-02-01"));
        let mut deleted = seed_rate(conn, &product, Decimal::new(8, 0), "2024-02-01", None);

        let repo = RecordRepository::<RateVersion>::new(conn);
        inactive.is_active = false;
        inactive.meta.touch(None, None);
        assert!(repo.save(&inactive, 1).unwrap());
        deleted.meta.mark_deleted(None, None);
        assert!(repo.save(&deleted, 1).unwrap());
        assert!(matches!(deleted.meta.status, RecordStatus::Deleted { .. }));

        let resolver = RateSnapshotResolver::new(conn);
        assert!(resolver.resolve(&product.meta.id, "kg", date("2024-01-15")).unwrap().is_some());
        assert!(resolver.resolve(&product.meta.id, "kg", date("2024-03-01")).unwrap().is_none());
        assert!(resolver.active_windows(&product.meta.id, "kg").unwrap().is_empty());
    }

    #[test]
    fn test_require_reports_missing_rate() {
        let db = Database::open_in_memory().unwrap();
        let product = seed_product(db.connection(), "Tea leaves", "kg");
        let err = RateSnapshotResolver::new(db.connection())
            .require(&product.meta.id, "kg", date("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, Error::NoEffectiveRate { .. }));
    }
}
