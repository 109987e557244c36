//! tally-core - Core library for Tally
//!
//! This crate contains the record models, the `SQLite` storage layer and the
//! batch sync engine shared by the Tally server and its tools.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;
pub mod sync;
mod util;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{RecordId, SyncRequest, SyncResponse};
