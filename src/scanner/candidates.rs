//! Candidate document queries and paged fetching.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::classify::FactFields;
use crate::core::{Document, DocumentState, PaymentState};
use crate::corrector::tax_line_from_record;
use crate::ledger::{LedgerClient, LedgerError, PageOptions, RetryPolicy, retry_read};

/// Filter describing which documents a run should look at.
///
/// The historical correction scripts sharded runs by per-country
/// document number prefixes (VDE, VFR, …) and a date window; both
/// remain first-class filters here.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    /// Ledger model to search.
    pub model: String,
    /// Line model belonging to `model`.
    pub line_model: String,
    /// Document number prefix, e.g. "VDE".
    pub name_prefix: Option<String>,
    /// Document type filter, e.g. "out_invoice".
    pub move_type: Option<String>,
    /// Posting states to include.
    pub states: Vec<String>,
    /// Inclusive document date window.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Extra raw domain triples appended verbatim.
    pub extra_domain: Vec<Value>,
}

impl Default for CandidateQuery {
    fn default() -> Self {
        Self {
            model: "account.move".into(),
            line_model: "account.move.line".into(),
            name_prefix: None,
            move_type: Some("out_invoice".into()),
            states: vec!["posted".into()],
            date_from: None,
            date_to: None,
            extra_domain: Vec::new(),
        }
    }
}

impl CandidateQuery {
    /// Render as a ledger search domain.
    pub fn to_domain(&self) -> Value {
        let mut clauses = Vec::new();
        if let Some(prefix) = &self.name_prefix {
            clauses.push(json!(["name", "like", format!("{prefix}%")]));
        }
        match self.states.as_slice() {
            [] => {}
            [one] => clauses.push(json!(["state", "=", one])),
            many => clauses.push(json!(["state", "in", many])),
        }
        if let Some(move_type) = &self.move_type {
            clauses.push(json!(["move_type", "=", move_type]));
        }
        if let Some(from) = self.date_from {
            clauses.push(json!(["invoice_date", ">=", from.to_string()]));
        }
        if let Some(to) = self.date_to {
            clauses.push(json!(["invoice_date", "<=", to.to_string()]));
        }
        clauses.extend(self.extra_domain.iter().cloned());
        Value::Array(clauses)
    }
}

/// One fetched candidate: either a parseable document plus its raw
/// header record (for fact extraction), or a record the engine cannot
/// interpret, kept so the report still accounts for it.
#[derive(Debug, Clone)]
pub(crate) enum Candidate {
    Ok { document: Document, record: Value },
    Bad { name: String, reason: String },
}

impl Candidate {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Ok { document, .. } => &document.name,
            Self::Bad { name, .. } => name,
        }
    }
}

/// Page through the candidate set, deduplicate by document id, and
/// truncate to `limit` before any processing starts.
pub(crate) fn fetch_candidates(
    client: &dyn LedgerClient,
    query: &CandidateQuery,
    fact_fields: &FactFields,
    batch_size: u32,
    limit: Option<usize>,
    retry: &RetryPolicy,
) -> Result<Vec<Candidate>, LedgerError> {
    let header_fields: Vec<&str> = [
        "id",
        "name",
        "state",
        "payment_state",
        fact_fields.ship_from_country.as_str(),
        fact_fields.ship_to_country.as_str(),
        fact_fields.buyer_vat.as_str(),
        fact_fields.marketplace_collected.as_str(),
        fact_fields.reporting_scheme.as_str(),
        fact_fields.net_amount.as_str(),
        fact_fields.tax_amount.as_str(),
    ]
    .into();
    let domain = query.to_domain();

    let mut headers: Vec<Value> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut offset = 0u32;
    loop {
        let page = retry_read(retry, "fetch candidate page", || {
            client.search_read(
                &query.model,
                &domain,
                &header_fields,
                &PageOptions::page(offset, batch_size),
            )
        })?;
        let page_len = page.len();
        for record in page {
            let id = record.get("id").and_then(Value::as_i64).unwrap_or(0);
            if seen.insert(id) {
                headers.push(record);
            }
        }
        if let Some(limit) = limit {
            if headers.len() >= limit {
                headers.truncate(limit);
                break;
            }
        }
        if page_len < batch_size as usize {
            break;
        }
        offset += batch_size;
    }

    // Batch-read lines for this candidate set, grouped by document.
    let ids: Vec<i64> = headers
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect();
    let mut lines_by_doc: HashMap<i64, Vec<crate::core::TaxLine>> = HashMap::new();
    for chunk in ids.chunks(batch_size.max(1) as usize) {
        let records = retry_read(retry, "fetch candidate lines", || {
            client.search_read(
                &query.line_model,
                &json!([["move_id", "in", chunk], ["display_type", "=", "product"]]),
                &["id", "move_id", "tax_ids", "tax_tag_ids", "price_subtotal"],
                &PageOptions::all(),
            )
        })?;
        for record in &records {
            let Some(doc_id) = move_id(record) else {
                continue;
            };
            if let Some(line) = tax_line_from_record(record) {
                lines_by_doc.entry(doc_id).or_default().push(line);
            }
        }
    }

    Ok(headers
        .into_iter()
        .map(|record| candidate_from_header(record, &mut lines_by_doc))
        .collect())
}

fn candidate_from_header(
    record: Value,
    lines_by_doc: &mut HashMap<i64, Vec<crate::core::TaxLine>>,
) -> Candidate {
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();
    let Some(id) = record.get("id").and_then(Value::as_i64) else {
        return Candidate::Bad {
            name,
            reason: "record has no id".into(),
        };
    };
    let Some(state) = record
        .get("state")
        .and_then(Value::as_str)
        .and_then(DocumentState::from_code)
    else {
        return Candidate::Bad {
            name,
            reason: "unrecognized document state".into(),
        };
    };
    let Some(payment_state) = record
        .get("payment_state")
        .and_then(Value::as_str)
        .and_then(PaymentState::from_code)
    else {
        return Candidate::Bad {
            name,
            reason: "unrecognized payment state".into(),
        };
    };
    let lines = lines_by_doc.remove(&id).unwrap_or_default();
    Candidate::Ok {
        document: Document {
            id,
            name,
            state,
            payment_state,
            lines,
        },
        record,
    }
}

/// `move_id` comes back either as a bare id or as an `[id, display]` pair.
fn move_id(record: &Value) -> Option<i64> {
    match record.get("move_id")? {
        Value::Number(n) => n.as_i64(),
        Value::Array(pair) => pair.first().and_then(Value::as_i64),
        _ => None,
    }
}
