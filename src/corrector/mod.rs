//! Guarded in-place correction of posted documents.
//!
//! [`DocumentCorrector`] drives one document through
//! Posted → Draft → (line edit) → Posted → verified, with a payment
//! guard at entry and a defined terminal outcome for every
//! partial-failure path. When a mutating call fails, the document's
//! actual state is re-read before deciding anything — an apparent
//! error may mean the call landed anyway, and success is never
//! inferred from error text.

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::{Value, json};

use crate::classify::classify;
use crate::core::{
    CorrectionResult, Document, DocumentState, PaymentState, TaxCode, TaxLine, TransactionFacts,
};
use crate::ledger::{LedgerClient, LedgerError, PageOptions, RetryPolicy, retry_read};
use crate::registry::{Registry, derive_tags, resolve, verify_against};

/// Knobs for the corrector's ledger interaction.
#[derive(Debug, Clone)]
pub struct CorrectorConfig {
    /// Ledger model of the documents being corrected.
    pub document_model: String,
    /// Ledger model of the document lines.
    pub line_model: String,
    /// Minimum pause before every mutating call, respecting the
    /// ledger's throughput limits. Reads are not paced.
    pub mutation_delay: Duration,
    /// Retry schedule for the read-backs.
    pub retry: RetryPolicy,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            document_model: "account.move".into(),
            line_model: "account.move.line".into(),
            mutation_delay: Duration::from_millis(200),
            retry: RetryPolicy::default(),
        }
    }
}

/// Corrects the tax classification on one document at a time.
pub struct DocumentCorrector<'a> {
    client: &'a dyn LedgerClient,
    registry: &'a Registry,
    config: CorrectorConfig,
}

impl<'a> DocumentCorrector<'a> {
    pub fn new(client: &'a dyn LedgerClient, registry: &'a Registry, config: CorrectorConfig) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    /// Classify, resolve, and correct. The full per-document pipeline.
    pub fn correct(&self, document: &Document, facts: &TransactionFacts) -> CorrectionResult {
        let scenario = classify(facts);
        let target = match resolve(scenario, facts, self.registry) {
            Ok(code) => code,
            Err(miss) => {
                return CorrectionResult::SkippedRegistryMiss {
                    scenario: miss.scenario,
                    country: miss.country,
                };
            }
        };
        self.correct_with_target(document, target)
    }

    /// Pre-mutation checks shared with the scanner's dry-run path.
    ///
    /// Returns the ids of lines that need rewriting, or the terminal
    /// result when nothing may (or needs to) happen. The diff check
    /// comes first so an already-fixed document short-circuits before
    /// any guard or state transition, with zero calls issued.
    pub fn preflight(
        &self,
        document: &Document,
        target: &TaxCode,
    ) -> Result<Vec<i64>, CorrectionResult> {
        if target.report_tags.is_empty() {
            // Unconfigured code — refusing up front beats posting
            // lines that can never verify.
            return Err(CorrectionResult::Error {
                detail: format!("tax code {} has no configured reporting tags", target.id),
            });
        }

        let expected = derive_tags(target);
        let stale: Vec<i64> = document
            .lines
            .iter()
            .filter(|l| l.applied_code != target.id || &l.tags != expected)
            .map(|l| l.id)
            .collect();
        if stale.is_empty() {
            return Err(CorrectionResult::AlreadyCorrect);
        }

        if document.payment_state != PaymentState::NotPaid {
            return Err(CorrectionResult::SkippedPaymentBlocked {
                payment_state: document.payment_state,
            });
        }
        if document.state == DocumentState::Cancelled {
            return Err(CorrectionResult::SkippedAmbiguous {
                reason: "document is cancelled".into(),
            });
        }
        Ok(stale)
    }

    /// Correct a document toward an already-resolved target code.
    pub fn correct_with_target(&self, document: &Document, target: &TaxCode) -> CorrectionResult {
        let stale = match self.preflight(document, target) {
            Ok(stale) => stale,
            Err(terminal) => return terminal,
        };

        tracing::debug!(
            doc = %document.name,
            target = target.id,
            lines = stale.len(),
            "correcting document"
        );

        // Unpost. An empty response payload is success.
        if document.state == DocumentState::Posted {
            self.pace();
            if let Err(err) = self
                .client
                .execute(&self.config.document_model, "button_draft", &[document.id])
            {
                match self.read_state(document.id) {
                    Ok(DocumentState::Draft) => {
                        tracing::warn!(doc = %document.name, %err, "unpost reported failure but landed");
                    }
                    Ok(state) => {
                        return CorrectionResult::Error {
                            detail: format!("unpost failed ({err}); document state is {state:?}"),
                        };
                    }
                    Err(read_err) => {
                        return CorrectionResult::Error {
                            detail: format!("unpost failed ({err}); state unreadable ({read_err})"),
                        };
                    }
                }
            }
        }

        // Rewrite only the mismatching lines; matching lines stay untouched.
        let tags: Vec<i64> = target.report_tags.iter().copied().collect();
        let values = json!({
            "tax_ids": [[6, 0, [target.id]]],
            "tax_tag_ids": [[6, 0, tags]],
        });
        for line_id in &stale {
            self.pace();
            if let Err(err) = self
                .client
                .write(&self.config.line_model, &[*line_id], &values)
            {
                return CorrectionResult::Error {
                    detail: format!("line {line_id} edit failed ({err}); document left in draft"),
                };
            }
        }

        // Repost. On failure the document deliberately stays Draft with
        // corrected lines — safer than wrong-and-posted, never reverted.
        self.pace();
        if let Err(err) = self
            .client
            .execute(&self.config.document_model, "action_post", &[document.id])
        {
            match self.read_state(document.id) {
                Ok(DocumentState::Posted) => {
                    tracing::warn!(doc = %document.name, %err, "repost reported failure but landed");
                }
                Ok(state) => {
                    return CorrectionResult::Error {
                        detail: format!(
                            "repost failed ({err}); corrected lines left unposted (state {state:?})"
                        ),
                    };
                }
                Err(read_err) => {
                    return CorrectionResult::Error {
                        detail: format!("repost failed ({err}); state unreadable ({read_err})"),
                    };
                }
            }
        }

        // Read back and verify tags. Posting succeeding is not enough.
        let lines = match self.read_lines(document.id) {
            Ok(lines) => lines,
            Err(err) => {
                return CorrectionResult::Error {
                    detail: format!("post-repost verification read failed: {err}"),
                };
            }
        };
        for line in &lines {
            if let Err(mismatch) = verify_against(line, target) {
                return CorrectionResult::Error {
                    detail: format!("verification failed after repost: {mismatch}"),
                };
            }
        }

        tracing::info!(doc = %document.name, lines = stale.len(), "document corrected");
        CorrectionResult::Fixed {
            lines_changed: stale.len(),
        }
    }

    fn pace(&self) {
        if !self.config.mutation_delay.is_zero() {
            std::thread::sleep(self.config.mutation_delay);
        }
    }

    /// Re-read the document's actual posting state.
    fn read_state(&self, document_id: i64) -> Result<DocumentState, LedgerError> {
        let records = retry_read(&self.config.retry, "re-read document state", || {
            self.client.search_read(
                &self.config.document_model,
                &json!([["id", "=", document_id]]),
                &["id", "state"],
                &PageOptions::all(),
            )
        })?;
        records
            .first()
            .and_then(|r| r.get("state"))
            .and_then(Value::as_str)
            .and_then(DocumentState::from_code)
            .ok_or_else(|| {
                LedgerError::Decode(format!("document {document_id} state missing or unknown"))
            })
    }

    /// Re-read the document's product lines for verification. The
    /// receivable and payment-term counterpart lines a posted document
    /// carries never hold tax codes, so they are excluded here exactly
    /// as they are when candidates are fetched.
    fn read_lines(&self, document_id: i64) -> Result<Vec<TaxLine>, LedgerError> {
        let records = retry_read(&self.config.retry, "re-read document lines", || {
            self.client.search_read(
                &self.config.line_model,
                &json!([["move_id", "=", document_id], ["display_type", "=", "product"]]),
                &["id", "tax_ids", "tax_tag_ids", "price_subtotal"],
                &PageOptions::all(),
            )
        })?;
        Ok(records.iter().filter_map(tax_line_from_record).collect())
    }
}

/// Parse a line record as fetched from the ledger. Lines without any
/// tax applied come back with an empty `tax_ids`; they map to code 0,
/// which no registry entry uses.
pub(crate) fn tax_line_from_record(record: &Value) -> Option<TaxLine> {
    let id = record.get("id").and_then(Value::as_i64)?;
    let applied_code = record
        .get("tax_ids")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let tags: BTreeSet<i64> = record
        .get("tax_tag_ids")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let amount = record
        .get("price_subtotal")
        .and_then(Value::as_f64)
        .and_then(|n| n.to_string().parse().ok())
        .unwrap_or_default();
    Some(TaxLine {
        id,
        applied_code,
        amount,
        tags,
    })
}
