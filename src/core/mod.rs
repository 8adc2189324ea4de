//! Core domain types for the VAT correction engine.
//!
//! Transaction facts, scenarios, tax codes, documents, and the
//! per-document correction outcome taxonomy.

mod countries;
mod error;
mod types;

pub use countries::{MODELED_COUNTRIES, is_modeled_country};
pub use error::EngineError;
pub use types::*;
