use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::core::{EngineError, TaxCode, TaxScenario};
use crate::ledger::{LedgerClient, PageOptions, RetryPolicy, retry_read};

/// Ledger model holding the tax code table.
const LEDGER_TAX_MODEL: &str = "account.tax";

/// Immutable reference table mapping (scenario, country, rate) to tax
/// codes and their reporting tags.
///
/// Loaded once at startup — from a reviewed JSON file or from the
/// ledger's own tax table — and never mutated at runtime. This replaces
/// the hardcoded per-script tables the engine grew out of: business
/// logic looks codes up here and nowhere else.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<TaxCode>,
    /// (scenario, country) → indexes into `entries`, ascending by
    /// (sequence, id) so fallback order is deterministic.
    index: HashMap<(TaxScenario, String), Vec<usize>>,
}

impl Registry {
    /// Build a registry from raw entries. Country codes are normalized
    /// to uppercase; per-key ordering follows each entry's `sequence`.
    pub fn from_entries(entries: Vec<TaxCode>) -> Self {
        let mut entries = entries;
        for e in &mut entries {
            e.country = e.country.trim().to_ascii_uppercase();
        }
        let mut index: HashMap<(TaxScenario, String), Vec<usize>> = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            index.entry((e.scenario, e.country.clone())).or_default().push(i);
        }
        for bucket in index.values_mut() {
            bucket.sort_by_key(|&i| (entries[i].sequence, entries[i].id));
        }
        Self { entries, index }
    }

    /// Parse a registry from its JSON representation (an array of
    /// [`TaxCode`] objects).
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let entries: Vec<TaxCode> =
            serde_json::from_str(json).map_err(|e| EngineError::RegistryLoad(e.to_string()))?;
        if entries.is_empty() {
            return Err(EngineError::RegistryLoad("registry file is empty".into()));
        }
        Ok(Self::from_entries(entries))
    }

    /// Load the registry from a JSON file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::RegistryLoad(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Load the registry from the ledger's own tax table, the single
    /// authoritative source for code ids and tag sets.
    pub fn load_from_ledger(client: &dyn LedgerClient) -> Result<Self, EngineError> {
        let records = retry_read(&RetryPolicy::default(), "load tax registry", || {
            client.search_read(
                LEDGER_TAX_MODEL,
                &serde_json::json!([["type_tax_use", "=", "sale"]]),
                &[
                    "id",
                    "country_code",
                    "scenario",
                    "amount",
                    "tag_ids",
                    "is_standard_rate",
                    "sequence",
                ],
                &PageOptions::all(),
            )
        })?;

        let mut entries = Vec::with_capacity(records.len());
        for record in &records {
            match tax_code_from_record(record) {
                Ok(code) => entries.push(code),
                Err(reason) => {
                    tracing::warn!(%reason, "skipping unusable tax record");
                }
            }
        }
        if entries.is_empty() {
            return Err(EngineError::RegistryLoad(
                "ledger returned no usable tax codes".into(),
            ));
        }
        Ok(Self::from_entries(entries))
    }

    /// Exact lookup by scenario, country, and rounded integer rate.
    pub fn lookup_rate(
        &self,
        scenario: TaxScenario,
        country: &str,
        rate_percent: i64,
    ) -> Option<&TaxCode> {
        self.bucket(scenario, country)
            .find(|c| rounded_percent(c) == rate_percent)
    }

    /// The standard-rate entry for (scenario, country), if declared.
    pub fn standard(&self, scenario: TaxScenario, country: &str) -> Option<&TaxCode> {
        self.bucket(scenario, country).find(|c| c.standard_rate)
    }

    /// First entry for (scenario, country) in declared sequence order.
    pub fn first(&self, scenario: TaxScenario, country: &str) -> Option<&TaxCode> {
        self.bucket(scenario, country).next()
    }

    /// Look up a code by its ledger id.
    pub fn by_id(&self, id: i64) -> Option<&TaxCode> {
        self.entries.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for (scenario, country), country-specific first, then
    /// any `"*"` catch-all entries. Export and marketplace codes are
    /// typically registered once under `"*"` rather than per
    /// destination country.
    fn bucket(&self, scenario: TaxScenario, country: &str) -> impl Iterator<Item = &TaxCode> {
        let specific = (scenario, country.trim().to_ascii_uppercase());
        let catch_all = (scenario, "*".to_string());
        self.index
            .get(&specific)
            .into_iter()
            .chain(self.index.get(&catch_all))
            .flatten()
            .map(|&i| &self.entries[i])
    }
}

/// A registry entry's rate rounded to integer percent, the unit all
/// rate comparison happens in.
pub(crate) fn rounded_percent(code: &TaxCode) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    code.rate_percent.round().to_i64().unwrap_or(i64::MAX)
}

fn tax_code_from_record(record: &Value) -> Result<TaxCode, String> {
    let id = record
        .get("id")
        .and_then(Value::as_i64)
        .ok_or("missing id")?;
    let country = record
        .get("country_code")
        .and_then(Value::as_str)
        .ok_or("missing country_code")?
        .to_string();
    let scenario: TaxScenario = record
        .get("scenario")
        .cloned()
        .ok_or_else(|| "missing scenario".to_string())
        .and_then(|v| serde_json::from_value(v).map_err(|e| e.to_string()))?;
    let rate_percent = record
        .get("amount")
        .and_then(Value::as_f64)
        .ok_or("missing amount")?
        .to_string()
        .parse()
        .map_err(|_| "amount not a decimal".to_string())?;
    let report_tags = record
        .get("tag_ids")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let standard_rate = record
        .get("is_standard_rate")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let sequence = record
        .get("sequence")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    Ok(TaxCode {
        id,
        country,
        scenario,
        rate_percent,
        report_tags,
        standard_rate,
        sequence,
    })
}
