//! Resolve a scenario and facts to a concrete registry tax code.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

use crate::core::{TaxCode, TaxScenario, TransactionFacts};

use super::registry::Registry;

/// No registry entry exists for the scenario/country after walking the
/// whole fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no tax code registered for {scenario} / {country}")]
pub struct RegistryMiss {
    pub scenario: TaxScenario,
    pub country: String,
}

/// Select the tax code for a classified transaction.
///
/// Fallback order:
/// 1. Exact match on the observed rate (rounded to integer percent).
/// 2. The country's declared standard-rate entry for the scenario.
/// 3. The first entry for (scenario, country) in sequence order.
/// 4. [`RegistryMiss`] if the registry has no entry at all.
///
/// When the observed net amount is zero or negative the observed rate
/// is unknown and resolution starts at step 2 — a zero-net document
/// must never divide by zero.
pub fn resolve<'r>(
    scenario: TaxScenario,
    facts: &TransactionFacts,
    registry: &'r Registry,
) -> Result<&'r TaxCode, RegistryMiss> {
    let country = facts.ship_to_country.as_str();

    if let Some(rate) = observed_rate_percent(facts) {
        if let Some(code) = registry.lookup_rate(scenario, country, rate) {
            return Ok(code);
        }
    }

    registry
        .standard(scenario, country)
        .or_else(|| registry.first(scenario, country))
        .ok_or_else(|| RegistryMiss {
            scenario,
            country: country.to_ascii_uppercase(),
        })
}

/// Observed rate as rounded integer percent, or `None` when the net
/// amount makes the ratio meaningless. Rounding absorbs float residue
/// in observed amounts (19.999999% resolves as 20%).
pub fn observed_rate_percent(facts: &TransactionFacts) -> Option<i64> {
    if facts.observed_net_amount <= Decimal::ZERO {
        return None;
    }
    let rate = facts.observed_tax_amount / facts.observed_net_amount * Decimal::ONE_HUNDRED;
    rate.round().to_i64()
}
