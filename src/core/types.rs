use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized facts about one cross-border sale, derived once per
/// transaction by the fact extractor and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFacts {
    /// Country the goods ship from (ISO 3166-1 alpha-2).
    pub ship_from_country: String,
    /// Country the goods ship to (ISO 3166-1 alpha-2).
    pub ship_to_country: String,
    /// Buyer's VAT registration number, if any was captured on the order.
    pub buyer_vat_registration: Option<String>,
    /// True when the marketplace collected and remits the VAT itself.
    pub marketplace_collected_vat: bool,
    /// Reporting scheme declared on the source record, if any.
    pub declared_scheme: Option<ReportingScheme>,
    /// Net amount observed on the source record.
    pub observed_net_amount: Decimal,
    /// Tax amount observed on the source record.
    pub observed_tax_amount: Decimal,
}

/// Reporting scheme hint carried on the source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingScheme {
    /// Regular domestic reporting.
    Standard,
    /// One-Stop-Shop cross-border B2C reporting.
    Oss,
    /// Marketplace-facilitated supply — the marketplace is the deemed supplier.
    MarketplaceFacilitated,
}

impl ReportingScheme {
    /// Parse from the scheme string carried on ledger/order records.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "standard" | "domestic" => Some(Self::Standard),
            "oss" | "oss_eu" => Some(Self::Oss),
            "marketplace" | "marketplace_facilitated" | "deemed_supplier" => {
                Some(Self::MarketplaceFacilitated)
            }
            _ => None,
        }
    }
}

/// Statutory tax treatment of a sale. Exactly one scenario applies to
/// any given [`TransactionFacts`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxScenario {
    /// Ship-from and ship-to in the same modeled country.
    #[serde(rename = "domestic")]
    Domestic,
    /// Cross-border B2C within the modeled set (OSS).
    #[serde(rename = "cross_border_b2c")]
    CrossBorderB2C,
    /// Cross-border B2B — buyer self-assesses, seller charges 0%.
    #[serde(rename = "cross_border_b2b_reverse_charge")]
    CrossBorderB2BReverseCharge,
    /// Destination outside the modeled set.
    #[serde(rename = "export")]
    Export,
    /// Marketplace is the deemed supplier and remits the VAT.
    #[serde(rename = "marketplace_collected")]
    MarketplaceCollected,
}

impl std::fmt::Display for TaxScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Domestic => "domestic",
            Self::CrossBorderB2C => "cross-border B2C",
            Self::CrossBorderB2BReverseCharge => "cross-border B2B reverse charge",
            Self::Export => "export",
            Self::MarketplaceCollected => "marketplace-collected",
        };
        f.write_str(s)
    }
}

/// One registry entry: a concrete tax code in the ledger together with
/// the reporting tags that must accompany it on a posted line.
///
/// Codes are immutable reference data. The resolver only ever selects
/// from the registry; it never invents new codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCode {
    /// Ledger record id of the tax code.
    pub id: i64,
    /// Destination country this code applies to.
    pub country: String,
    /// Scenario this code is registered for.
    pub scenario: TaxScenario,
    /// Rate as a percentage (e.g. 19, 5.5).
    pub rate_percent: Decimal,
    /// Reporting-box tags that must be present on a posted line.
    pub report_tags: BTreeSet<i64>,
    /// Whether this is the country's standard rate for the scenario.
    #[serde(default)]
    pub standard_rate: bool,
    /// Explicit ordering key within (scenario, country). Fallback
    /// resolution walks entries in ascending sequence, so resolution is
    /// deterministic across runs regardless of load order.
    #[serde(default)]
    pub sequence: u32,
}

/// A tax line belonging to exactly one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    /// Ledger record id of the line.
    pub id: i64,
    /// Tax code currently applied to the line.
    pub applied_code: i64,
    /// Line amount.
    pub amount: Decimal,
    /// Reporting tags currently on the line. Once posted these must
    /// equal the applied code's `report_tags`.
    pub tags: BTreeSet<i64>,
}

/// Posting state of a ledger document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Draft,
    Posted,
    Cancelled,
}

impl DocumentState {
    /// Parse from the ledger's state field.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "draft" => Some(Self::Draft),
            "posted" => Some(Self::Posted),
            "cancel" | "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Payment state of a ledger document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    NotPaid,
    PartiallyPaid,
    Paid,
}

impl PaymentState {
    /// Parse from the ledger's payment-state field. In-payment and
    /// reversed states count as paid — money has moved either way.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "not_paid" => Some(Self::NotPaid),
            "partial" | "partially_paid" => Some(Self::PartiallyPaid),
            "paid" | "in_payment" | "reversed" => Some(Self::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotPaid => "not_paid",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// An existing ledger document (sale invoice or similar) as seen by the
/// correction engine. Documents are created and destroyed elsewhere;
/// this engine only moves them between Posted and Draft to rewrite the
/// tax classification on their lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Ledger record id.
    pub id: i64,
    /// Human-readable document number (e.g. "VDE/2025/0042").
    pub name: String,
    pub state: DocumentState,
    pub payment_state: PaymentState,
    pub lines: Vec<TaxLine>,
}

/// Terminal outcome of running the corrector on one document.
/// Every processed document yields exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CorrectionResult {
    /// Lines were rewritten and the document re-posted and verified.
    Fixed { lines_changed: usize },
    /// Every line already carried the resolved code and tags; no call
    /// was issued.
    AlreadyCorrect,
    /// The facts could not be extracted or classified.
    SkippedAmbiguous { reason: String },
    /// No registry entry exists for the resolved scenario/country.
    SkippedRegistryMiss {
        scenario: TaxScenario,
        country: String,
    },
    /// The document has payment activity and must not be touched.
    SkippedPaymentBlocked { payment_state: PaymentState },
    /// The correction failed partway; `detail` describes where the
    /// document was left.
    Error { detail: String },
}

impl std::fmt::Display for CorrectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed { lines_changed } => write!(f, "fixed ({lines_changed} lines)"),
            Self::AlreadyCorrect => f.write_str("already correct"),
            Self::SkippedAmbiguous { reason } => write!(f, "skipped, ambiguous: {reason}"),
            Self::SkippedRegistryMiss { scenario, country } => {
                write!(f, "skipped, no registry entry for {scenario} / {country}")
            }
            Self::SkippedPaymentBlocked { payment_state } => {
                write!(f, "skipped, payment state {payment_state}")
            }
            Self::Error { detail } => write!(f, "error: {detail}"),
        }
    }
}
