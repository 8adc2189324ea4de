//! Fact extraction and scenario classification.
//!
//! [`FactExtractor`] turns raw ledger records into [`TransactionFacts`];
//! [`classify`] maps facts to the single applicable [`TaxScenario`].
//! Classification is total — the same decision procedure serves the
//! reconciliation scanner, one-off corrections, and ingestion-time
//! classification alike.
//!
//! [`TransactionFacts`]: crate::core::TransactionFacts
//! [`TaxScenario`]: crate::core::TaxScenario

mod facts;
mod scenario;

pub use facts::{FactError, FactExtractor, FactFields};
pub use scenario::classify;
