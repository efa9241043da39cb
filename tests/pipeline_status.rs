//! Stage statuses derived from what the engine reports.

mod common;

use common::engine_with;
use screenflow::engine::BackingRecord;
use screenflow::{
    Decision, DecisionQueue, Exemptions, MemoryEngine, Operation, OperationFacts, PipelineView,
    QueueKind, RecordState, ReviewEngine, ReviewPipeline, StepStatus,
};

fn view_of(engine: &mut MemoryEngine, exemptions: Exemptions) -> PipelineView {
    let report = engine.get_status().expect("status");
    let facts = engine.operation_facts();
    ReviewPipeline::new(exemptions).view(Some(&report.snapshot()), &facts)
}

fn manual_prep_engine() -> MemoryEngine {
    engine_with(3, RecordState::MdProcessed)
        .with_record(BackingRecord::new("manual0", RecordState::MdNeedsManualPreparation))
        .with_record(BackingRecord::new("manual1", RecordState::MdNeedsManualPreparation))
}

#[test]
fn manual_attention_does_not_hold_back_import() {
    let view = view_of(&mut manual_prep_engine(), Exemptions::standard());

    assert_eq!(view.status_of("search"), Some(StepStatus::Complete));
    assert_eq!(view.status_of("prep"), Some(StepStatus::Complete));
    assert_eq!(view.status_of("metadata"), Some(StepStatus::Complete));
    assert!(view.import_complete);
    assert_eq!(view.status_of("prescreen"), Some(StepStatus::Active));
    assert_eq!(view.status_of("pdfs"), Some(StepStatus::Pending));
    assert_eq!(view.status_of("screen"), Some(StepStatus::Pending));
    assert_eq!(view.total_records, 5);
    // Manual work is still work: prep comes first.
    assert_eq!(view.next_operation, Some(Operation::Prep));
}

#[test]
fn without_exemptions_manual_records_keep_prep_active() {
    let view = view_of(&mut manual_prep_engine(), Exemptions::none());

    assert_eq!(view.status_of("prep"), Some(StepStatus::Active));
    assert_eq!(view.status_of("metadata"), Some(StepStatus::Active));
    assert!(!view.import_complete);
}

#[test]
fn unconfigured_search_warns() {
    let mut engine = MemoryEngine::new().with_facts(
        Operation::Search,
        OperationFacts {
            can_run: false,
            reason: Some("No search sources configured".to_string()),
            ..OperationFacts::default()
        },
    );
    let view = view_of(&mut engine, Exemptions::standard());

    assert_eq!(view.status_of("search"), Some(StepStatus::Warning));
    assert_eq!(view.status_of("metadata"), Some(StepStatus::Pending));
    assert_eq!(view.next_operation, None);
    assert_eq!(view.total_records, 0);
}

#[test]
fn prescreen_decisions_advance_the_pipeline() {
    let mut engine = engine_with(3, RecordState::MdProcessed);
    let before = engine.get_status().expect("status before").snapshot();
    let mut queue = DecisionQueue::load(&mut engine, QueueKind::Prescreen, 10).expect("load");
    for decision in [Decision::Include, Decision::Exclude, Decision::Include] {
        queue.decide_current(&mut engine, decision).expect("decide");
    }

    let after = engine.get_status().expect("status after").snapshot();
    assert!(after.is_monotonic_successor(&before));
    assert!(!before.is_monotonic_successor(&after));

    let view = view_of(&mut engine, Exemptions::standard());
    assert_eq!(view.status_of("prescreen"), Some(StepStatus::Complete));
    assert_eq!(view.status_of("pdf_get"), Some(StepStatus::Active));
    assert_eq!(view.status_of("pdfs"), Some(StepStatus::Active));
    assert_eq!(view.next_operation, Some(Operation::PdfGet));
}

#[test]
fn view_serializes_nested_stages() {
    let view = view_of(&mut manual_prep_engine(), Exemptions::standard());
    let value = serde_json::to_value(&view).expect("json");

    assert_eq!(value["stages"][1]["id"], "metadata");
    assert_eq!(value["stages"][1]["sub_stages"][1]["status"], "complete");
    assert!(value["stages"][0].get("sub_stages").is_none());
    assert_eq!(value["next_operation"], "prep");
}
