//! Batch reconciliation over candidate documents.
//!
//! [`ReconciliationScanner`] pages candidates out of the ledger, runs
//! extraction → classification → resolution → diff → correction for
//! each, and accumulates an [`AuditReport`]. One document's failure is
//! recorded and never aborts the scan.

mod candidates;
mod report;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use candidates::{Candidate, fetch_candidates};

use crate::classify::{FactExtractor, classify};
use crate::core::{CorrectionResult, EngineError, TransactionFacts};
use crate::corrector::{CorrectorConfig, DocumentCorrector};
use crate::ledger::LedgerClient;
use crate::registry::{Registry, resolve};

pub use candidates::CandidateQuery;
pub use report::{AuditReport, OutcomeKind};

/// Per-run options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Report what would change without issuing any mutating call.
    /// Evaluated at the point a correction would occur, so the dry-run
    /// report reflects exactly the live diff detection.
    pub dry_run: bool,
    /// Cap on the candidate set, applied before processing begins.
    pub limit: Option<usize>,
    /// Page size for candidate fetching.
    pub batch_size: u32,
    /// Minimum pause before each mutating call.
    pub mutation_delay: Duration,
    /// Worker threads. 1 processes sequentially, which is usually
    /// enough — the ledger's rate limits are the bottleneck.
    pub concurrency: usize,
    /// Max labeled examples kept per outcome kind.
    pub sample_cap: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            batch_size: 80,
            mutation_delay: Duration::from_millis(200),
            concurrency: 1,
            sample_cap: 10,
        }
    }
}

/// Orchestrates one reconciliation batch.
pub struct ReconciliationScanner<'a> {
    client: &'a dyn LedgerClient,
    registry: &'a Registry,
    extractor: FactExtractor,
    corrector_config: CorrectorConfig,
}

impl<'a> ReconciliationScanner<'a> {
    pub fn new(client: &'a dyn LedgerClient, registry: &'a Registry) -> Self {
        Self {
            client,
            registry,
            extractor: FactExtractor::new(),
            corrector_config: CorrectorConfig::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: FactExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_corrector_config(mut self, config: CorrectorConfig) -> Self {
        self.corrector_config = config;
        self
    }

    /// Run one batch. Only the inability to fetch candidates at all is
    /// an error; every per-document failure lands in the report.
    pub fn run(
        &self,
        query: &CandidateQuery,
        options: &ScanOptions,
    ) -> Result<AuditReport, EngineError> {
        let candidates = fetch_candidates(
            self.client,
            query,
            self.extractor.fields(),
            options.batch_size.max(1),
            options.limit,
            &self.corrector_config.retry,
        )?;
        let total = candidates.len() as u64;
        tracing::info!(total, dry_run = options.dry_run, "starting reconciliation scan");

        let mut config = self.corrector_config.clone();
        config.mutation_delay = options.mutation_delay;
        let corrector = DocumentCorrector::new(self.client, self.registry, config);

        let mut report = AuditReport::new(options.dry_run, total, options.sample_cap);
        if options.concurrency <= 1 {
            for (done, candidate) in candidates.into_iter().enumerate() {
                let (name, result) = self.process_one(&corrector, candidate, options.dry_run);
                report.record(&name, &result);
                log_progress(done as u64 + 1, total);
            }
        } else {
            // Small worker pool. Each candidate is popped from the queue
            // exactly once, so no two workers ever hold an in-flight
            // correction on the same document.
            let queue = Mutex::new(candidates.into_iter().collect::<VecDeque<_>>());
            let shared_report = Mutex::new(&mut report);
            let done = AtomicU64::new(0);
            std::thread::scope(|scope| {
                for _ in 0..options.concurrency {
                    scope.spawn(|| {
                        loop {
                            let Some(candidate) = queue.lock().expect("queue lock").pop_front()
                            else {
                                break;
                            };
                            let (name, result) =
                                self.process_one(&corrector, candidate, options.dry_run);
                            shared_report
                                .lock()
                                .expect("report lock")
                                .record(&name, &result);
                            log_progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                        }
                    });
                }
            });
        }

        report.finish();
        Ok(report)
    }

    fn process_one(
        &self,
        corrector: &DocumentCorrector<'_>,
        candidate: Candidate,
        dry_run: bool,
    ) -> (String, CorrectionResult) {
        let name = candidate.name().to_string();
        let result = match candidate {
            Candidate::Bad { reason, .. } => CorrectionResult::SkippedAmbiguous { reason },
            Candidate::Ok { document, record } => {
                let facts = match self.extractor.extract(&record) {
                    Ok(facts) => facts,
                    Err(err) => {
                        return (
                            name,
                            CorrectionResult::SkippedAmbiguous {
                                reason: err.to_string(),
                            },
                        );
                    }
                };
                self.reconcile(corrector, &document, &facts, dry_run)
            }
        };
        tracing::debug!(doc = %name, %result, "document processed");
        (name, result)
    }

    fn reconcile(
        &self,
        corrector: &DocumentCorrector<'_>,
        document: &crate::core::Document,
        facts: &TransactionFacts,
        dry_run: bool,
    ) -> CorrectionResult {
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
        // The dry-run decision sits exactly where the first mutating
        // call would happen, behind the same diff detection.
        match corrector.preflight(document, target) {
            Err(terminal) => terminal,
            Ok(stale) if dry_run => CorrectionResult::Fixed {
                lines_changed: stale.len(),
            },
            Ok(_) => corrector.correct_with_target(document, target),
        }
    }
}

fn log_progress(done: u64, total: u64) {
    if done == total || done % 50 == 0 {
        tracing::info!(done, total, "scan progress");
    }
}
