//! Extract normalized transaction facts from raw ledger records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::{ReportingScheme, TransactionFacts};

/// Field names the extractor reads from a `search_read` record.
///
/// The defaults match the flattened sale-document schema the engine
/// queries; deployments with custom field names can override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactFields {
    pub ship_from_country: String,
    pub ship_to_country: String,
    pub buyer_vat: String,
    pub marketplace_collected: String,
    pub reporting_scheme: String,
    pub net_amount: String,
    pub tax_amount: String,
}

impl Default for FactFields {
    fn default() -> Self {
        Self {
            ship_from_country: "company_country_code".into(),
            ship_to_country: "partner_shipping_country_code".into(),
            buyer_vat: "partner_vat".into(),
            marketplace_collected: "marketplace_vat_collected".into(),
            reporting_scheme: "reporting_scheme".into(),
            net_amount: "amount_untaxed".into(),
            tax_amount: "amount_tax".into(),
        }
    }
}

/// A record field was missing or could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field}': {reason}")]
pub struct FactError {
    /// Field name as configured in [`FactFields`].
    pub field: String,
    /// Why extraction failed.
    pub reason: String,
}

/// Maps raw ledger records to [`TransactionFacts`].
///
/// The ledger's RPC layer serializes empty scalar fields as `false`
/// rather than `null`; the extractor treats both as absent.
#[derive(Debug, Clone, Default)]
pub struct FactExtractor {
    fields: FactFields,
}

impl FactExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(fields: FactFields) -> Self {
        Self { fields }
    }

    /// The field mapping this extractor reads.
    pub fn fields(&self) -> &FactFields {
        &self.fields
    }

    /// Derive the facts for one record. Country codes are required and
    /// normalized to uppercase; everything else degrades to a sensible
    /// absent value.
    pub fn extract(&self, record: &Value) -> Result<TransactionFacts, FactError> {
        let ship_from = self.required_country(record, &self.fields.ship_from_country)?;
        let ship_to = self.required_country(record, &self.fields.ship_to_country)?;

        let buyer_vat = string_field(record, &self.fields.buyer_vat)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let marketplace_collected = record
            .get(&self.fields.marketplace_collected)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let declared_scheme = string_field(record, &self.fields.reporting_scheme)
            .as_deref()
            .and_then(ReportingScheme::from_code);

        let net = decimal_field(record, &self.fields.net_amount).unwrap_or(Decimal::ZERO);
        let tax = decimal_field(record, &self.fields.tax_amount).unwrap_or(Decimal::ZERO);

        Ok(TransactionFacts {
            ship_from_country: ship_from,
            ship_to_country: ship_to,
            buyer_vat_registration: buyer_vat,
            marketplace_collected_vat: marketplace_collected,
            declared_scheme,
            observed_net_amount: net,
            observed_tax_amount: tax,
        })
    }

    fn required_country(&self, record: &Value, field: &str) -> Result<String, FactError> {
        let value = string_field(record, field).ok_or_else(|| FactError {
            field: field.into(),
            reason: "missing country code".into(),
        })?;
        let code = value.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(FactError {
                field: field.into(),
                reason: format!("'{value}' is not a 2-letter country code"),
            });
        }
        Ok(code)
    }
}

/// Read a string field, treating `null`, `false`, and empty as absent.
fn string_field(record: &Value, field: &str) -> Option<String> {
    match record.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Read a numeric field as a Decimal. Accepts JSON numbers and numeric
/// strings; goes through the decimal string representation so float
/// artifacts do not leak into money values.
fn decimal_field(record: &Value, field: &str) -> Option<Decimal> {
    match record.get(field)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
