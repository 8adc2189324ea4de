//! Shared in-memory ledger and fixtures for the integration suites.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rust_decimal_macros::dec;
use serde_json::{Value, json};

use vatfix::core::{Document, DocumentState, PaymentState, TaxCode, TaxLine, TaxScenario};
use vatfix::ledger::{ExecuteOutcome, LedgerClient, LedgerError, PageOptions};
use vatfix::registry::Registry;

/// How a configured failure behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// The call fails and has no effect.
    Reject,
    /// The call's effect lands but an error comes back anyway — the
    /// "empty response misread as error" shape the engine must survive.
    LandThenFail,
}

#[derive(Debug, Clone)]
pub struct MockLine {
    pub id: i64,
    pub tax_id: i64,
    pub tags: Vec<i64>,
    pub amount: f64,
    /// "product" for goods lines; posted documents also carry
    /// receivable/payment-term counterpart lines with no tax data.
    pub display_type: String,
}

#[derive(Debug, Clone)]
pub struct MockDoc {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub payment_state: String,
    /// Fact fields as they appear on the header record.
    pub facts: Value,
    pub lines: Vec<MockLine>,
}

/// In-memory ledger. Tracks every mutating call so tests can assert
/// the idempotence and dry-run guarantees.
#[derive(Default)]
pub struct MockLedger {
    pub docs: Mutex<Vec<MockDoc>>,
    pub mutating_calls: AtomicUsize,
    failures: Mutex<HashMap<String, FailureMode>>,
    /// When set, `write` applies the tax code but drops the tag update,
    /// simulating a ledger that recomputes tags on its own terms.
    pub drop_tag_writes: std::sync::atomic::AtomicBool,
}

impl MockLedger {
    pub fn with_docs(docs: Vec<MockDoc>) -> Self {
        Self {
            docs: Mutex::new(docs),
            ..Self::default()
        }
    }

    /// Make `method` ("button_draft", "action_post", "write") fail.
    pub fn fail(&self, method: &str, mode: FailureMode) {
        self.failures.lock().unwrap().insert(method.into(), mode);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn mutations(&self) -> usize {
        self.mutating_calls.load(Ordering::SeqCst)
    }

    pub fn doc(&self, id: i64) -> MockDoc {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .expect("document exists")
    }

    fn failure_for(&self, method: &str) -> Option<FailureMode> {
        self.failures.lock().unwrap().get(method).copied()
    }

    fn header_record(doc: &MockDoc) -> Value {
        let mut record = doc.facts.clone();
        let obj = record.as_object_mut().expect("facts object");
        obj.insert("id".into(), json!(doc.id));
        obj.insert("name".into(), json!(doc.name));
        obj.insert("state".into(), json!(doc.state));
        obj.insert("payment_state".into(), json!(doc.payment_state));
        record
    }

    fn line_record(doc_id: i64, line: &MockLine) -> Value {
        let tax_ids: Vec<i64> = if line.tax_id == 0 { vec![] } else { vec![line.tax_id] };
        json!({
            "id": line.id,
            "move_id": [doc_id, "move"],
            "display_type": line.display_type,
            "tax_ids": tax_ids,
            "tax_tag_ids": line.tags,
            "price_subtotal": line.amount,
        })
    }
}

/// Find `[field, op, operand]` in a domain expression.
fn clause<'v>(domain: &'v Value, field: &str) -> Option<(&'v str, &'v Value)> {
    domain.as_array()?.iter().find_map(|triple| {
        let triple = triple.as_array()?;
        if triple.first()?.as_str()? == field {
            Some((triple.get(1)?.as_str()?, triple.get(2)?))
        } else {
            None
        }
    })
}

fn id_matches(op: &str, operand: &Value, id: i64) -> bool {
    match op {
        "=" => operand.as_i64() == Some(id),
        "in" => operand
            .as_array()
            .is_some_and(|ids| ids.iter().any(|v| v.as_i64() == Some(id))),
        _ => false,
    }
}

impl LedgerClient for MockLedger {
    fn search_read(
        &self,
        model: &str,
        domain: &Value,
        _fields: &[&str],
        page: &PageOptions,
    ) -> Result<Vec<Value>, LedgerError> {
        if let Some(FailureMode::Reject) = self.failure_for("search_read") {
            return Err(LedgerError::Transport("mock transport down".into()));
        }
        let docs = self.docs.lock().unwrap();
        let records: Vec<Value> = if model.ends_with(".line") {
            let (op, operand) = clause(domain, "move_id").expect("line domain has move_id");
            let display_type = clause(domain, "display_type")
                .and_then(|(op, operand)| (op == "=").then(|| operand.as_str()).flatten());
            docs.iter()
                .filter(|d| id_matches(op, operand, d.id))
                .flat_map(|d| {
                    d.lines
                        .iter()
                        .filter(|l| display_type.is_none_or(|dt| l.display_type == dt))
                        .map(|l| Self::line_record(d.id, l))
                })
                .collect()
        } else {
            docs.iter()
                .filter(|d| match clause(domain, "id") {
                    Some((op, operand)) => id_matches(op, operand, d.id),
                    None => true,
                })
                .filter(|d| match clause(domain, "state") {
                    Some(("=", operand)) => operand.as_str() == Some(d.state.as_str()),
                    _ => true,
                })
                .filter(|d| match clause(domain, "name") {
                    Some(("like", operand)) => operand
                        .as_str()
                        .map(|pattern| d.name.starts_with(pattern.trim_end_matches('%')))
                        .unwrap_or(true),
                    _ => true,
                })
                .map(Self::header_record)
                .collect()
        };
        let offset = page.offset as usize;
        let mut records: Vec<Value> = records.into_iter().skip(offset).collect();
        if let Some(limit) = page.limit {
            records.truncate(limit as usize);
        }
        Ok(records)
    }

    fn write(&self, _model: &str, ids: &[i64], values: &Value) -> Result<(), LedgerError> {
        let mode = self.failure_for("write");
        if mode == Some(FailureMode::Reject) {
            return Err(LedgerError::Api("mock write rejected".into()));
        }
        self.mutating_calls.fetch_add(1, Ordering::SeqCst);

        let tax_id = values["tax_ids"][0][2][0].as_i64().expect("tax id");
        let tags: Vec<i64> = values["tax_tag_ids"][0][2]
            .as_array()
            .expect("tags")
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        let drop_tags = self.drop_tag_writes.load(Ordering::SeqCst);
        let mut docs = self.docs.lock().unwrap();
        for doc in docs.iter_mut() {
            for line in doc.lines.iter_mut() {
                if ids.contains(&line.id) {
                    line.tax_id = tax_id;
                    if !drop_tags {
                        line.tags = tags.clone();
                    }
                }
            }
        }
        if mode == Some(FailureMode::LandThenFail) {
            return Err(LedgerError::Transport("mock write flaked".into()));
        }
        Ok(())
    }

    fn execute(
        &self,
        _model: &str,
        method: &str,
        ids: &[i64],
    ) -> Result<ExecuteOutcome, LedgerError> {
        let mode = self.failure_for(method);
        if mode == Some(FailureMode::Reject) {
            return Err(LedgerError::Api(format!("mock {method} rejected")));
        }
        self.mutating_calls.fetch_add(1, Ordering::SeqCst);

        let new_state = match method {
            "button_draft" => "draft",
            "action_post" => "posted",
            other => return Err(LedgerError::Api(format!("mock cannot {other}"))),
        };
        let mut docs = self.docs.lock().unwrap();
        for doc in docs.iter_mut() {
            if ids.contains(&doc.id) {
                doc.state = new_state.into();
            }
        }
        if mode == Some(FailureMode::LandThenFail) {
            return Err(LedgerError::Transport(format!("mock {method} flaked")));
        }
        // Workflow methods return no payload; that is still success.
        Ok(ExecuteOutcome::Empty)
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

pub fn tax_code(
    id: i64,
    country: &str,
    scenario: TaxScenario,
    rate: rust_decimal::Decimal,
    tags: &[i64],
    standard: bool,
    sequence: u32,
) -> TaxCode {
    TaxCode {
        id,
        country: country.into(),
        scenario,
        rate_percent: rate,
        report_tags: tags.iter().copied().collect(),
        standard_rate: standard,
        sequence,
    }
}

/// The registry every suite shares: domestic DE codes, FR OSS and
/// reverse-charge codes, and catch-all export/marketplace codes.
pub fn fixture_registry() -> Registry {
    Registry::from_entries(vec![
        tax_code(135, "DE", TaxScenario::Domestic, dec!(19), &[101, 102], true, 1),
        tax_code(136, "DE", TaxScenario::Domestic, dec!(7), &[103], false, 2),
        tax_code(122, "FR", TaxScenario::CrossBorderB2C, dec!(20), &[201], true, 1),
        tax_code(123, "FR", TaxScenario::CrossBorderB2C, dec!(5.5), &[202], false, 2),
        tax_code(150, "FR", TaxScenario::CrossBorderB2BReverseCharge, dec!(0), &[301], true, 1),
        tax_code(160, "*", TaxScenario::Export, dec!(0), &[401], true, 1),
        tax_code(170, "*", TaxScenario::MarketplaceCollected, dec!(0), &[501], true, 1),
    ])
}

/// Header fact fields for a DE→`ship_to` consumer sale.
pub fn consumer_facts(ship_to: &str, net: f64, tax: f64) -> Value {
    json!({
        "company_country_code": "DE",
        "partner_shipping_country_code": ship_to,
        "partner_vat": false,
        "marketplace_vat_collected": false,
        "reporting_scheme": false,
        "amount_untaxed": net,
        "amount_tax": tax,
    })
}

pub fn mock_doc(id: i64, name: &str, facts: Value, lines: Vec<MockLine>) -> MockDoc {
    MockDoc {
        id,
        name: name.into(),
        state: "posted".into(),
        payment_state: "not_paid".into(),
        facts,
        lines,
    }
}

pub fn mock_line(id: i64, tax_id: i64, tags: &[i64], amount: f64) -> MockLine {
    MockLine {
        id,
        tax_id,
        tags: tags.to_vec(),
        amount,
        display_type: "product".into(),
    }
}

/// A receivable/payment-term counterpart line: no tax, no tags.
pub fn counterpart_line(id: i64, amount: f64) -> MockLine {
    MockLine {
        id,
        tax_id: 0,
        tags: Vec::new(),
        amount,
        display_type: "payment_term".into(),
    }
}

/// Engine-side view of a mock document, as the corrector receives it:
/// product lines only, like the candidate fetch delivers.
pub fn document_view(doc: &MockDoc) -> Document {
    Document {
        id: doc.id,
        name: doc.name.clone(),
        state: DocumentState::from_code(&doc.state).expect("valid state"),
        payment_state: PaymentState::from_code(&doc.payment_state).expect("valid payment state"),
        lines: doc
            .lines
            .iter()
            .filter(|l| l.display_type == "product")
            .map(|l| TaxLine {
                id: l.id,
                applied_code: l.tax_id,
                amount: rust_decimal::Decimal::try_from(l.amount).unwrap_or_default(),
                tags: l.tags.iter().copied().collect::<BTreeSet<i64>>(),
            })
            .collect(),
    }
}
