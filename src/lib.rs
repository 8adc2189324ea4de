//! # vatfix
//!
//! VAT classification and correction engine for cross-border
//! marketplace sales recorded in an external accounting ledger.
//!
//! Given the facts of a sale — ship-from/ship-to countries, buyer VAT
//! registration, marketplace collection, observed amounts — the engine
//! decides the statutorily correct tax treatment, and when an
//! already-posted document carries the wrong treatment, corrects it in
//! place through a guarded unpost → edit → repost → verify sequence.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating
//! point. Rate comparison happens in rounded integer percent.
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use vatfix::classify::classify;
//! use vatfix::core::{TaxScenario, TransactionFacts};
//!
//! let facts = TransactionFacts {
//!     ship_from_country: "DE".into(),
//!     ship_to_country: "FR".into(),
//!     buyer_vat_registration: Some("FR12345678901".into()),
//!     marketplace_collected_vat: false,
//!     declared_scheme: None,
//!     observed_net_amount: dec!(100),
//!     observed_tax_amount: dec!(0),
//! };
//!
//! assert_eq!(classify(&facts), TaxScenario::CrossBorderB2BReverseCharge);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Types, classifier, registry, corrector, scanner |
//! | `ledger` | Blocking JSON-RPC ledger transport |
//! | `cli` | The `vatfix-scan` reconciliation binary |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod classify;

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod corrector;

#[cfg(feature = "core")]
pub mod ledger;

#[cfg(feature = "core")]
pub mod registry;

#[cfg(feature = "core")]
pub mod scanner;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
