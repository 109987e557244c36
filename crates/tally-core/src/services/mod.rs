//! Async service layer over the synchronous engine

mod ledger;

pub use ledger::LedgerService;
