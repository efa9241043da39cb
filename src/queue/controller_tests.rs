use super::{Cursor, DecisionQueue};
use crate::criteria::{CriterionDecision, CriterionDefinition, CriterionKind};
use crate::engine::{BackingRecord, MemoryEngine, ReviewEngine};
use crate::error::{EngineError, ErrorClass, QueueError};
use crate::queue::{Decision, DecisionState, QueueKind};
use crate::status::RecordState;

fn prescreen_engine(count: usize) -> MemoryEngine {
    (0..count).fold(MemoryEngine::new(), |engine, index| {
        engine.with_record(BackingRecord::new(
            format!("rec{index}"),
            RecordState::MdProcessed,
        ))
    })
}

fn screen_engine() -> MemoryEngine {
    MemoryEngine::new()
        .with_record(BackingRecord::new("a", RecordState::PdfPrepared))
        .with_record(BackingRecord::new("b", RecordState::PdfPrepared))
        .with_criteria(vec![
            CriterionDefinition::new("population", CriterionKind::Inclusion, "adults"),
            CriterionDefinition::new("grey_literature", CriterionKind::Exclusion, "preprints"),
        ])
}

fn load(engine: &mut MemoryEngine, kind: QueueKind) -> DecisionQueue {
    DecisionQueue::load(engine, kind, 50).expect("load queue")
}

#[test]
fn ten_item_queue_counts_and_cursor() {
    let mut engine = prescreen_engine(10);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    assert_eq!(queue.len(), 10);
    assert_eq!(queue.cursor(), Cursor::At(0));

    queue
        .decide(&mut engine, 0, Decision::Include)
        .expect("decide 0");
    queue
        .decide(&mut engine, 1, Decision::Exclude)
        .expect("decide 1");

    assert_eq!(queue.included_count(), 1);
    assert_eq!(queue.excluded_count(), 1);
    assert_eq!(queue.decided_count(), 2);
    assert_eq!(queue.undecided_count(), 8);
    assert_eq!(queue.cursor(), Cursor::At(2));
    assert_eq!(queue.remaining_hint(), Some(8));
    assert_eq!(
        engine.status_of("rec1"),
        Some(RecordState::RevPrescreenExcluded)
    );
}

#[test]
fn deciding_twice_is_rejected_without_counting() {
    let mut engine = prescreen_engine(3);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    queue
        .decide(&mut engine, 0, Decision::Include)
        .expect("first decision");

    let err = queue
        .decide(&mut engine, 0, Decision::Exclude)
        .expect_err("second decision");
    assert!(matches!(err, QueueError::AlreadyDecided { .. }));
    assert_eq!(queue.included_count(), 1);
    assert_eq!(queue.excluded_count(), 0);
    assert_eq!(queue.record(0).map(|r| r.decision()), Some(DecisionState::Included));
}

#[test]
fn only_one_decision_in_flight() {
    let mut engine = prescreen_engine(3);
    let mut queue = load(&mut engine, QueueKind::Prescreen);

    let pending = queue
        .begin_decision(0, Decision::Include)
        .expect("begin 0");
    assert!(queue.is_deciding());
    let err = queue
        .begin_decision(1, Decision::Include)
        .expect_err("second begin");
    assert!(matches!(err, QueueError::DecisionInFlight { .. }));

    let receipt = engine
        .submit_decision(
            QueueKind::Prescreen,
            &crate::engine::DecisionSubmission {
                record_id: pending.record_id().to_string(),
                decision: pending.decision(),
                criteria_decisions: Default::default(),
            },
        )
        .map_err(QueueError::from);
    queue.finish_decision(pending, receipt).expect("finish");
    assert!(!queue.is_deciding());
    assert_eq!(queue.cursor(), Cursor::At(1));
}

#[test]
fn failed_submission_leaves_position_undecided() {
    let mut engine = prescreen_engine(2);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    engine.fail_next(EngineError::Transport("broken pipe".to_string()));

    let err = queue
        .decide(&mut engine, 0, Decision::Include)
        .expect_err("transport failure");
    assert_eq!(err.class(), ErrorClass::Transport);
    assert!(!queue.is_deciding());
    assert_eq!(queue.decided_count(), 0);
    assert_eq!(queue.cursor(), Cursor::At(0));

    queue
        .decide(&mut engine, 0, Decision::Include)
        .expect("retry succeeds");
}

#[test]
fn moved_backing_status_is_stale() {
    let mut engine = prescreen_engine(2);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    engine.set_status("rec0", RecordState::MdNeedsManualPreparation);

    let err = queue
        .decide(&mut engine, 0, Decision::Exclude)
        .expect_err("stale record");
    assert_eq!(err.class(), ErrorClass::Stale);
    match err {
        QueueError::StalePrecondition {
            expected, found, ..
        } => {
            assert_eq!(expected, RecordState::MdProcessed);
            assert_eq!(found, Some(RecordState::MdNeedsManualPreparation));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(queue.decided_count(), 0);
    assert_eq!(
        queue.refresh_record(&mut engine, 0).expect("refresh"),
        Some(RecordState::MdNeedsManualPreparation)
    );
}

#[test]
fn navigation_keeps_decisions() {
    let mut engine = prescreen_engine(4);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    queue
        .decide(&mut engine, 0, Decision::Include)
        .expect("decide 0");
    queue
        .decide(&mut engine, 1, Decision::Include)
        .expect("decide 1");

    queue.navigate(0).expect("go back");
    assert!(queue.is_current_decided());
    assert_eq!(queue.decided_count(), 2);
    assert_eq!(queue.skip_to_next_undecided(), Cursor::At(2));

    let err = queue.navigate(9).expect_err("out of range");
    assert!(matches!(err, QueueError::IndexOutOfRange { index: 9, len: 4 }));
    assert_eq!(queue.cursor(), Cursor::At(2));
}

#[test]
fn last_decision_reaches_completion() {
    let mut engine = prescreen_engine(2);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    queue
        .decide(&mut engine, 1, Decision::Exclude)
        .expect("decide 1");
    assert_eq!(queue.cursor(), Cursor::At(0));

    queue
        .decide_current(&mut engine, Decision::Include)
        .expect("decide 0");
    assert_eq!(queue.cursor(), Cursor::Completion);
    assert_eq!(queue.skip_to_next_undecided(), Cursor::Completion);
    assert!(matches!(
        queue.decide_current(&mut engine, Decision::Include),
        Err(QueueError::QueueComplete)
    ));
}

#[test]
fn deciding_the_tail_wraps_to_earlier_undecided() {
    let mut engine = prescreen_engine(3);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    queue.navigate(2).expect("jump to the end");
    queue
        .decide(&mut engine, 2, Decision::Include)
        .expect("decide 2");

    assert_eq!(queue.cursor(), Cursor::At(0));
    assert_eq!(queue.undecided_count(), 2);
    queue
        .decide_current(&mut engine, Decision::Exclude)
        .expect("decide 0");
    assert_eq!(queue.cursor(), Cursor::At(1));
}

#[test]
fn screen_decision_waits_for_criteria() {
    let mut engine = screen_engine();
    let mut queue = load(&mut engine, QueueKind::Screen);
    assert_eq!(queue.criteria().len(), 2);

    let err = queue
        .decide(&mut engine, 0, Decision::Include)
        .expect_err("undetermined");
    assert!(matches!(err, QueueError::CriteriaUndetermined { .. }));

    assert_eq!(
        queue.toggle_criterion(0, "population").expect("toggle"),
        CriterionDecision::In
    );
    queue.toggle_criterion(0, "grey_literature").expect("toggle");
    queue.toggle_criterion(0, "grey_literature").expect("toggle");

    let err = queue
        .decide(&mut engine, 0, Decision::Include)
        .expect_err("conflict");
    assert!(matches!(err, QueueError::CriteriaConflict { .. }));
    assert_eq!(err.class(), ErrorClass::Validation);

    let receipt = queue
        .decide_by_criteria(&mut engine, 0)
        .expect("decide by criteria");
    assert_eq!(receipt.decision, Decision::Exclude);
    assert_eq!(engine.status_of("a"), Some(RecordState::RevExcluded));
    assert_eq!(
        engine.records()[0].screening_criteria.as_deref(),
        Some("grey_literature=out;population=in")
    );
}

#[test]
fn decided_record_criteria_are_read_only() {
    let mut engine = screen_engine();
    let mut queue = load(&mut engine, QueueKind::Screen);
    queue.toggle_criterion(0, "population").expect("toggle");
    queue.toggle_criterion(0, "grey_literature").expect("toggle");
    queue
        .decide(&mut engine, 0, Decision::Include)
        .expect("decide");

    assert!(matches!(
        queue.toggle_criterion(0, "population"),
        Err(QueueError::ReadOnlyRecord { .. })
    ));
    assert!(matches!(
        queue.toggle_criterion(1, "language"),
        Err(QueueError::UnknownCriterion { .. })
    ));
}

#[test]
fn reverted_decisions_are_reasserted() {
    let mut engine = prescreen_engine(3);
    let mut queue = load(&mut engine, QueueKind::Prescreen);
    queue
        .decide(&mut engine, 0, Decision::Include)
        .expect("decide 0");
    queue
        .decide(&mut engine, 1, Decision::Exclude)
        .expect("decide 1");
    engine.set_status("rec0", RecordState::MdProcessed);

    let repaired = queue.reassert_decisions(&mut engine).expect("reassert");
    assert_eq!(repaired, ["rec0".to_string()]);
    assert_eq!(
        engine.status_of("rec0"),
        Some(RecordState::RevPrescreenIncluded)
    );
    assert_eq!(queue.included_count(), 1);
    assert_eq!(queue.excluded_count(), 1);
}

#[test]
fn empty_queue_starts_at_completion() {
    let mut engine = MemoryEngine::new();
    let queue = load(&mut engine, QueueKind::Prescreen);
    assert!(queue.is_empty());
    assert_eq!(queue.cursor(), Cursor::Completion);
    assert!(!queue.is_current_decided());
}
