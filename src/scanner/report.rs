//! Accumulated audit report for one reconciliation run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::CorrectionResult;

/// Bucket a [`CorrectionResult`] falls into for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Fixed,
    AlreadyCorrect,
    Ambiguous,
    RegistryMiss,
    PaymentBlocked,
    Error,
}

impl OutcomeKind {
    pub fn of(result: &CorrectionResult) -> Self {
        match result {
            CorrectionResult::Fixed { .. } => Self::Fixed,
            CorrectionResult::AlreadyCorrect => Self::AlreadyCorrect,
            CorrectionResult::SkippedAmbiguous { .. } => Self::Ambiguous,
            CorrectionResult::SkippedRegistryMiss { .. } => Self::RegistryMiss,
            CorrectionResult::SkippedPaymentBlocked { .. } => Self::PaymentBlocked,
            CorrectionResult::Error { .. } => Self::Error,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::AlreadyCorrect => "already correct",
            Self::Ambiguous => "skipped (ambiguous)",
            Self::RegistryMiss => "skipped (registry miss)",
            Self::PaymentBlocked => "skipped (payment blocked)",
            Self::Error => "errors",
        }
    }

    const ALL: [Self; 6] = [
        Self::Fixed,
        Self::AlreadyCorrect,
        Self::Ambiguous,
        Self::RegistryMiss,
        Self::PaymentBlocked,
        Self::Error,
    ];
}

/// Counts per outcome plus a bounded list of labeled examples per
/// outcome, for human review after a run. Failures are data here, not
/// process errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// True when no mutating call was issued.
    pub dry_run: bool,
    /// Candidates after dedup and limit truncation.
    pub total_candidates: u64,
    pub processed: u64,
    /// Total lines rewritten (or that would be, in a dry run).
    pub lines_changed: u64,
    pub counts: BTreeMap<OutcomeKind, u64>,
    pub samples: BTreeMap<OutcomeKind, Vec<String>>,
    #[serde(skip, default = "default_sample_cap")]
    sample_cap: usize,
}

fn default_sample_cap() -> usize {
    10
}

impl AuditReport {
    pub fn new(dry_run: bool, total_candidates: u64, sample_cap: usize) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            total_candidates,
            processed: 0,
            lines_changed: 0,
            counts: BTreeMap::new(),
            samples: BTreeMap::new(),
            sample_cap,
        }
    }

    /// Record one document's outcome.
    pub fn record(&mut self, document_name: &str, result: &CorrectionResult) {
        self.processed += 1;
        if let CorrectionResult::Fixed { lines_changed } = result {
            self.lines_changed += *lines_changed as u64;
        }
        let kind = OutcomeKind::of(result);
        *self.counts.entry(kind).or_insert(0) += 1;
        let samples = self.samples.entry(kind).or_default();
        if samples.len() < self.sample_cap {
            samples.push(format!("{document_name}: {result}"));
        }
    }

    /// Mark the run complete.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, kind: OutcomeKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Documents that ended in `Error`.
    pub fn error_count(&self) -> u64 {
        self.count(OutcomeKind::Error)
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        if self.dry_run {
            writeln!(f, "RECONCILIATION SUMMARY (dry run — nothing was changed)")?;
        } else {
            writeln!(f, "RECONCILIATION SUMMARY")?;
        }
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "documents processed: {} / {}", self.processed, self.total_candidates)?;
        let action = if self.dry_run { "lines to fix" } else { "lines fixed" };
        writeln!(f, "{action}: {}", self.lines_changed)?;
        for kind in OutcomeKind::ALL {
            writeln!(f, "{}: {}", kind.label(), self.count(kind))?;
        }
        for kind in OutcomeKind::ALL {
            if let Some(samples) = self.samples.get(&kind) {
                if samples.is_empty() {
                    continue;
                }
                writeln!(f, "\n{} examples:", kind.label())?;
                for sample in samples {
                    writeln!(f, "  {sample}")?;
                }
            }
        }
        Ok(())
    }
}
