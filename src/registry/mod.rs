//! The tax code registry and the lookups built on top of it.
//!
//! One authoritative table — loaded from a reviewed JSON file or from
//! the ledger's own tax data at startup — replaces the inconsistent
//! hardcoded country→code tables this engine consolidates.

mod registry;
mod resolve;
mod tags;

pub use registry::Registry;
pub use resolve::{RegistryMiss, observed_rate_percent, resolve};
pub use tags::{TagMismatch, derive_tags, verify, verify_against};
