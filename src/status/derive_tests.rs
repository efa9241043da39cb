use super::{fold_group_statuses, StepStatusDeriver};
use crate::status::{
    Exemptions, Operation, OperationFacts, OperationFactsMap, RecordCountSnapshot, RecordState,
    StageDefinition, StepStatus,
};

fn stage(operation: Operation) -> StageDefinition {
    StageDefinition::for_operation(operation)
}

fn no_facts() -> OperationFactsMap {
    OperationFactsMap::new()
}

fn manual_prep_snapshot() -> RecordCountSnapshot {
    RecordCountSnapshot::new()
        .with_current(RecordState::MdNeedsManualPreparation, 2)
        .with_current(RecordState::MdProcessed, 1)
        .with_overall(RecordState::MdRetrieved, 3)
        .with_overall(RecordState::MdImported, 3)
        .with_overall(RecordState::MdPrepared, 1)
        .with_overall(RecordState::MdProcessed, 1)
}

#[test]
fn missing_snapshot_is_pending() {
    let deriver = StepStatusDeriver::default();
    for operation in Operation::ALL {
        assert_eq!(
            deriver.derive(None, &stage(operation), &no_facts()),
            StepStatus::Pending,
            "{operation}"
        );
    }
}

#[test]
fn manual_preparation_does_not_block_import_stages() {
    let deriver = StepStatusDeriver::new(Exemptions::standard());
    let snapshot = manual_prep_snapshot();

    for operation in [Operation::Load, Operation::Prep, Operation::Dedupe] {
        assert_eq!(
            deriver.derive(Some(&snapshot), &stage(operation), &no_facts()),
            StepStatus::Complete,
            "{operation}"
        );
    }
}

#[test]
fn manual_preparation_blocks_without_exemption() {
    let deriver = StepStatusDeriver::new(Exemptions::none());
    let snapshot = manual_prep_snapshot();

    assert_eq!(
        deriver.derive(Some(&snapshot), &stage(Operation::Prep), &no_facts()),
        StepStatus::Active
    );
}

#[test]
fn derivation_is_repeatable() {
    let deriver = StepStatusDeriver::default();
    let snapshot = manual_prep_snapshot();
    let facts = no_facts();

    let first: Vec<StepStatus> = Operation::ALL
        .iter()
        .map(|op| deriver.derive(Some(&snapshot), &stage(*op), &facts))
        .collect();
    for _ in 0..3 {
        let again: Vec<StepStatus> = Operation::ALL
            .iter()
            .map(|op| deriver.derive(Some(&snapshot), &stage(*op), &facts))
            .collect();
        assert_eq!(first, again);
    }
}

#[test]
fn statuses_follow_the_newest_snapshot() {
    let deriver = StepStatusDeriver::default();
    let before = RecordCountSnapshot::new().with_current(RecordState::MdPrepared, 4);
    let after = RecordCountSnapshot::new()
        .with_current(RecordState::MdProcessed, 4)
        .with_overall(RecordState::MdProcessed, 4);

    let dedupe = stage(Operation::Dedupe);
    assert_eq!(
        deriver.derive(Some(&before), &dedupe, &no_facts()),
        StepStatus::Active
    );
    assert_eq!(
        deriver.derive(Some(&after), &dedupe, &no_facts()),
        StepStatus::Complete
    );
}

#[test]
fn non_exempt_input_wins_over_reached_output() {
    let deriver = StepStatusDeriver::default();
    let snapshot = RecordCountSnapshot::new()
        .with_current(RecordState::MdImported, 1)
        .with_overall(RecordState::MdPrepared, 5);

    assert_eq!(
        deriver.derive(Some(&snapshot), &stage(Operation::Prep), &no_facts()),
        StepStatus::Active
    );
}

#[test]
fn exempt_input_without_output_is_active() {
    let deriver = StepStatusDeriver::default();
    let snapshot =
        RecordCountSnapshot::new().with_current(RecordState::PdfNeedsManualRetrieval, 3);

    assert_eq!(
        deriver.derive(Some(&snapshot), &stage(Operation::PdfGet), &no_facts()),
        StepStatus::Active
    );
}

#[test]
fn search_with_stale_sources_warns() {
    let deriver = StepStatusDeriver::default();
    let snapshot = RecordCountSnapshot::new().with_overall(RecordState::MdRetrieved, 10);
    let mut facts = OperationFactsMap::new();
    facts.insert(
        "search".to_string(),
        OperationFacts {
            can_run: true,
            needs_rerun: true,
            needs_rerun_reason: Some("source pubmed was modified".to_string()),
            ..OperationFacts::default()
        },
    );

    assert_eq!(
        deriver.derive(Some(&snapshot), &stage(Operation::Search), &facts),
        StepStatus::Warning
    );

    facts.insert("search".to_string(), OperationFacts::runnable());
    assert_eq!(
        deriver.derive(Some(&snapshot), &stage(Operation::Search), &facts),
        StepStatus::Complete
    );
}

#[test]
fn idle_record_stage_is_not_a_warning() {
    let deriver = StepStatusDeriver::default();
    let snapshot = RecordCountSnapshot::new().with_overall(RecordState::MdImported, 2);
    let mut facts = OperationFactsMap::new();
    facts.insert(
        "load".to_string(),
        OperationFacts {
            can_run: false,
            reason: Some("No records to load (run search first)".to_string()),
            ..OperationFacts::default()
        },
    );

    assert_eq!(
        deriver.derive(Some(&snapshot), &stage(Operation::Load), &facts),
        StepStatus::Complete
    );
}

#[test]
fn group_folds_sub_stage_statuses() {
    use StepStatus::*;
    assert_eq!(fold_group_statuses(&[Complete, Complete]), Complete);
    assert_eq!(fold_group_statuses(&[Complete, Active]), Active);
    assert_eq!(fold_group_statuses(&[Warning, Pending]), Warning);
    assert_eq!(fold_group_statuses(&[Active, Warning]), Active);
    assert_eq!(fold_group_statuses(&[Pending, Pending]), Pending);
    assert_eq!(fold_group_statuses(&[Complete, Pending]), Active);
}

#[test]
fn grouped_stage_derives_from_sub_stages() {
    let deriver = StepStatusDeriver::default();
    let pdfs = StageDefinition::group(
        "pdfs",
        vec![stage(Operation::PdfGet), stage(Operation::PdfPrep)],
    );
    let snapshot = RecordCountSnapshot::new()
        .with_current(RecordState::PdfPrepared, 2)
        .with_current(RecordState::PdfNeedsManualPreparation, 1)
        .with_overall(RecordState::PdfImported, 3)
        .with_overall(RecordState::PdfPrepared, 2);

    assert_eq!(
        deriver.derive(Some(&snapshot), &pdfs, &no_facts()),
        StepStatus::Complete
    );
}
