//! The modeled EU+adjacent destination set.
//!
//! Shipments to any country outside this set are classified as exports.
//! The set covers the EU-27 plus GB and XI (Northern Ireland), matching
//! the destination registries the correction scripts historically served.

/// Check whether `code` is inside the modeled destination set.
/// Comparison is case-insensitive; unknown and empty codes are outside.
pub fn is_modeled_country(code: &str) -> bool {
    let code = code.trim().to_ascii_uppercase();
    MODELED_COUNTRIES.binary_search(&code.as_str()).is_ok()
}

/// EU-27 member states plus GB/XI. Sorted for binary search.
pub static MODELED_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GB", "GR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK", "XI",
];
