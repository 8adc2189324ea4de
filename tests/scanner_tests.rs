//! Reconciliation scanner tests: batching, dry-run, failure isolation.

mod common;

use std::time::Duration;

use common::*;
use vatfix::corrector::CorrectorConfig;
use vatfix::ledger::RetryPolicy;
use vatfix::scanner::{CandidateQuery, OutcomeKind, ReconciliationScanner, ScanOptions};

fn fast_options() -> ScanOptions {
    ScanOptions {
        mutation_delay: Duration::ZERO,
        batch_size: 2,
        ..ScanOptions::default()
    }
}

fn fast_corrector_config() -> CorrectorConfig {
    CorrectorConfig {
        mutation_delay: Duration::ZERO,
        retry: RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        ..CorrectorConfig::default()
    }
}

/// Mixed batch: one wrong domestic doc, one already correct, one with
/// payment activity, one destined for a registry miss.
fn mixed_docs() -> Vec<MockDoc> {
    let mut blocked = mock_doc(
        3,
        "VDE/2025/0003",
        consumer_facts("DE", 50.0, 9.5),
        vec![mock_line(30, 1, &[999], 50.0)],
    );
    blocked.payment_state = "paid".into();
    vec![
        mock_doc(
            1,
            "VDE/2025/0001",
            consumer_facts("DE", 100.0, 19.0),
            vec![mock_line(10, 1, &[999], 100.0)],
        ),
        mock_doc(
            2,
            "VDE/2025/0002",
            consumer_facts("DE", 100.0, 19.0),
            vec![mock_line(20, 135, &[101, 102], 100.0)],
        ),
        blocked,
        mock_doc(
            4,
            "VIT/2025/0004",
            consumer_facts("IT", 100.0, 22.0),
            vec![mock_line(40, 1, &[999], 100.0)],
        ),
    ]
}

#[test]
fn mixed_batch_reports_every_outcome() {
    let ledger = MockLedger::with_docs(mixed_docs());
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let report = scanner
        .run(&CandidateQuery::default(), &fast_options())
        .unwrap();

    assert_eq!(report.total_candidates, 4);
    assert_eq!(report.processed, 4);
    assert_eq!(report.count(OutcomeKind::Fixed), 1);
    assert_eq!(report.count(OutcomeKind::AlreadyCorrect), 1);
    assert_eq!(report.count(OutcomeKind::PaymentBlocked), 1);
    assert_eq!(report.count(OutcomeKind::RegistryMiss), 1);
    assert_eq!(report.lines_changed, 1);
    assert!(report.finished_at.is_some());

    // Only the wrong domestic document was touched.
    assert_eq!(ledger.doc(1).lines[0].tax_id, 135);
    assert_eq!(ledger.doc(3).lines[0].tax_id, 1);
}

#[test]
fn dry_run_issues_no_mutating_calls() {
    let ledger = MockLedger::with_docs(mixed_docs());
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let options = ScanOptions {
        dry_run: true,
        ..fast_options()
    };
    let report = scanner.run(&CandidateQuery::default(), &options).unwrap();

    // Same diff detection as a live run, zero mutations.
    assert_eq!(report.count(OutcomeKind::Fixed), 1);
    assert_eq!(report.count(OutcomeKind::PaymentBlocked), 1);
    assert_eq!(report.lines_changed, 1);
    assert!(report.dry_run);
    assert_eq!(ledger.mutations(), 0);
    assert_eq!(ledger.doc(1).lines[0].tax_id, 1);
}

#[test]
fn dry_run_and_live_run_detect_identical_diffs() {
    let registry = fixture_registry();

    let dry_ledger = MockLedger::with_docs(mixed_docs());
    let dry = ReconciliationScanner::new(&dry_ledger, &registry)
        .with_corrector_config(fast_corrector_config())
        .run(
            &CandidateQuery::default(),
            &ScanOptions {
                dry_run: true,
                ..fast_options()
            },
        )
        .unwrap();

    let live_ledger = MockLedger::with_docs(mixed_docs());
    let live = ReconciliationScanner::new(&live_ledger, &registry)
        .with_corrector_config(fast_corrector_config())
        .run(&CandidateQuery::default(), &fast_options())
        .unwrap();

    assert_eq!(dry.count(OutcomeKind::Fixed), live.count(OutcomeKind::Fixed));
    assert_eq!(dry.lines_changed, live.lines_changed);
}

#[test]
fn one_document_failure_does_not_abort_the_batch() {
    let ledger = MockLedger::with_docs(mixed_docs());
    // Every repost fails outright; the fixable document becomes an
    // error but the rest of the batch still gets processed.
    ledger.fail("action_post", FailureMode::Reject);
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let report = scanner
        .run(&CandidateQuery::default(), &fast_options())
        .unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.count(OutcomeKind::Error), 1);
    assert_eq!(report.count(OutcomeKind::AlreadyCorrect), 1);
    assert_eq!(report.count(OutcomeKind::PaymentBlocked), 1);
    assert_eq!(report.count(OutcomeKind::RegistryMiss), 1);
}

#[test]
fn limit_truncates_candidates_before_processing() {
    let ledger = MockLedger::with_docs(mixed_docs());
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let options = ScanOptions {
        limit: Some(2),
        ..fast_options()
    };
    let report = scanner.run(&CandidateQuery::default(), &options).unwrap();

    assert_eq!(report.total_candidates, 2);
    assert_eq!(report.processed, 2);
}

#[test]
fn prefix_filter_restricts_candidates() {
    let ledger = MockLedger::with_docs(mixed_docs());
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let query = CandidateQuery {
        name_prefix: Some("VIT".into()),
        ..CandidateQuery::default()
    };
    let report = scanner.run(&query, &fast_options()).unwrap();

    assert_eq!(report.total_candidates, 1);
    assert_eq!(report.count(OutcomeKind::RegistryMiss), 1);
}

#[test]
fn unreachable_ledger_is_a_startup_error() {
    let ledger = MockLedger::default();
    ledger.fail("search_read", FailureMode::Reject);
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    assert!(scanner.run(&CandidateQuery::default(), &fast_options()).is_err());
}

#[test]
fn unparseable_header_is_recorded_as_ambiguous() {
    let mut bad = mock_doc(
        5,
        "VDE/2025/0005",
        consumer_facts("DE", 100.0, 19.0),
        vec![mock_line(50, 1, &[999], 100.0)],
    );
    bad.payment_state = "unheard_of".into();
    let ledger = MockLedger::with_docs(vec![bad]);
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let report = scanner
        .run(&CandidateQuery::default(), &fast_options())
        .unwrap();

    assert_eq!(report.count(OutcomeKind::Ambiguous), 1);
    assert_eq!(ledger.mutations(), 0);
}

#[test]
fn worker_pool_produces_the_same_report() {
    let ledger = MockLedger::with_docs(mixed_docs());
    let registry = fixture_registry();
    let scanner = ReconciliationScanner::new(&ledger, &registry)
        .with_corrector_config(fast_corrector_config());

    let options = ScanOptions {
        concurrency: 3,
        ..fast_options()
    };
    let report = scanner.run(&CandidateQuery::default(), &options).unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.count(OutcomeKind::Fixed), 1);
    assert_eq!(report.count(OutcomeKind::AlreadyCorrect), 1);
    assert_eq!(ledger.doc(1).lines[0].tax_id, 135);
}
