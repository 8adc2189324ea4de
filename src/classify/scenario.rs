//! Classify a transaction's facts into its statutory tax scenario.

use crate::core::{ReportingScheme, TaxScenario, TransactionFacts, is_modeled_country};

/// Determine the tax scenario for one transaction.
///
/// Total and pure: every input maps to exactly one scenario, and no
/// I/O or error path exists. First match wins:
///
/// 1. Marketplace collected the VAT *and* the declared scheme marks a
///    marketplace-facilitated supply → `MarketplaceCollected`
/// 2. Ship-to outside the modeled set → `Export`
/// 3. Ship-from equals ship-to → `Domestic`
/// 4. Cross-border with a non-blank buyer VAT registration
///    → `CrossBorderB2BReverseCharge`
/// 5. Otherwise → `CrossBorderB2C` (OSS)
///
/// Marketplace-collected and export override everything else,
/// including buyer VAT status. A blank or whitespace-only VAT
/// registration must never count as B2B — the guard is explicit, not
/// a falsy check.
pub fn classify(facts: &TransactionFacts) -> TaxScenario {
    if facts.marketplace_collected_vat
        && facts.declared_scheme == Some(ReportingScheme::MarketplaceFacilitated)
    {
        return TaxScenario::MarketplaceCollected;
    }

    let ship_to = facts.ship_to_country.trim().to_ascii_uppercase();
    if !is_modeled_country(&ship_to) {
        return TaxScenario::Export;
    }

    let ship_from = facts.ship_from_country.trim().to_ascii_uppercase();
    if ship_from == ship_to {
        return TaxScenario::Domestic;
    }

    if has_vat_registration(facts) {
        return TaxScenario::CrossBorderB2BReverseCharge;
    }

    TaxScenario::CrossBorderB2C
}

/// True only for a present, non-blank VAT registration.
fn has_vat_registration(facts: &TransactionFacts) -> bool {
    matches!(&facts.buyer_vat_registration, Some(v) if !v.trim().is_empty())
}
