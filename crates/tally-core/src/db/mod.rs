//! Database layer for Tally

mod connection;
mod migrations;
mod records;
mod repository;

pub use connection::Database;
pub use repository::{FieldRow, RecordRepository, StoredRecord};
