use super::*;
use crate::criteria::{CriterionDefinition, CriterionKind};
use crate::engine::{BackingRecord, MemoryEngine};
use crate::queue::QueueKind;
use crate::status::RecordState;
use std::io::Cursor as InputCursor;

fn prescreen_engine(count: usize) -> MemoryEngine {
    (0..count).fold(MemoryEngine::new(), |engine, n| {
        let mut record = BackingRecord::new(format!("rec{n}"), RecordState::MdProcessed);
        record.content.title = format!("Title {n}");
        engine.with_record(record)
    })
}

fn run_script(
    engine: &mut MemoryEngine,
    kind: QueueKind,
    script: &str,
    options: SessionOptions,
) -> (QueueCounts, String) {
    let queue = DecisionQueue::load(engine, kind, 50).expect("load");
    let mut session = ReviewSession::new(engine, queue, options);
    let mut output = Vec::new();
    let counts = session
        .run(InputCursor::new(script.as_bytes()), &mut output)
        .expect("run");
    (counts, String::from_utf8(output).expect("utf8"))
}

#[test]
fn parses_commands() {
    assert_eq!(
        parse_command("i"),
        Ok(SessionCommand::Decide(Decision::Include))
    );
    assert_eq!(
        parse_command(" e "),
        Ok(SessionCommand::Decide(Decision::Exclude))
    );
    assert_eq!(parse_command("g 3"), Ok(SessionCommand::Goto(2)));
    assert_eq!(
        parse_command("c population"),
        Ok(SessionCommand::Criterion("population".to_string()))
    );
    assert!(parse_command("g 0").is_err());
    assert!(parse_command("g x").is_err());
    assert!(parse_command("i now").is_err());
    assert!(parse_command("zap").is_err());
}

#[test]
fn decisions_reach_the_engine() {
    let mut engine = prescreen_engine(3);
    let (counts, output) = run_script(
        &mut engine,
        QueueKind::Prescreen,
        "i\ne\nq\n",
        SessionOptions::default(),
    );

    assert_eq!(counts.included, 1);
    assert_eq!(counts.excluded, 1);
    assert_eq!(counts.undecided, 1);
    assert_eq!(
        engine.status_of("rec0"),
        Some(RecordState::RevPrescreenIncluded)
    );
    assert_eq!(
        engine.status_of("rec1"),
        Some(RecordState::RevPrescreenExcluded)
    );
    assert_eq!(engine.status_of("rec2"), Some(RecordState::MdProcessed));
    assert!(output.contains("[3/3] rec2"), "{output}");
    assert!(output.contains("included=1 excluded=1 undecided=1"), "{output}");
}

#[test]
fn errors_do_not_end_the_session() {
    let mut engine = prescreen_engine(2);
    let queue = DecisionQueue::load(&mut engine, QueueKind::Prescreen, 50).expect("load");
    // Another writer decides rec1 after the queue was loaded.
    engine.set_status("rec1", RecordState::RevPrescreenExcluded);
    let mut session = ReviewSession::new(&mut engine, queue, SessionOptions::default());
    let mut output = Vec::new();
    let counts = session
        .run(InputCursor::new(&b"i\ni\nzap\ng 9\nq\n"[..]), &mut output)
        .expect("run");
    let output = String::from_utf8(output).expect("utf8");

    assert_eq!(counts.included, 1);
    assert!(output.contains("error [stale]"), "{output}");
    assert!(output.contains("unknown command"), "{output}");
    assert!(output.contains("error [validation]"), "{output}");
}

#[test]
fn decided_record_is_shown_read_only() {
    let mut engine = prescreen_engine(2);
    let (_, output) = run_script(
        &mut engine,
        QueueKind::Prescreen,
        "i\np\ne\nq\n",
        SessionOptions::default(),
    );

    assert!(output.contains("decided: included (read-only"), "{output}");
    assert!(output.contains("already decided"), "{output}");
    assert_eq!(
        engine.status_of("rec0"),
        Some(RecordState::RevPrescreenIncluded)
    );
}

#[test]
fn completion_is_reported_and_input_end_stops() {
    let mut engine = prescreen_engine(1);
    let (counts, output) = run_script(
        &mut engine,
        QueueKind::Prescreen,
        "e\n",
        SessionOptions::default(),
    );

    assert_eq!(counts.excluded, 1);
    assert!(output.contains("queue complete"), "{output}");
    assert!(output.contains("prescreen session ended"), "{output}");
}

#[test]
fn deciding_the_last_record_returns_to_skipped_ones() {
    let mut engine = prescreen_engine(3);
    let (counts, output) = run_script(
        &mut engine,
        QueueKind::Prescreen,
        "g 3\ni\ns\nq\n",
        SessionOptions::default(),
    );

    assert_eq!(counts.included, 1);
    assert_eq!(counts.undecided, 2);
    assert!(!output.contains("queue complete"), "{output}");
    let after_decision = output
        .split("included=1")
        .nth(1)
        .expect("render after the decision");
    assert!(after_decision.contains("[1/3] rec0"), "{output}");
}

#[test]
fn screen_uses_criteria_marks() {
    let mut engine = MemoryEngine::new()
        .with_criteria(vec![
            CriterionDefinition::new("population", CriterionKind::Inclusion, "adults"),
            CriterionDefinition::new("retracted", CriterionKind::Exclusion, "retracted"),
        ])
        .with_record(BackingRecord::new("pdf1", RecordState::PdfPrepared));
    // Both marks go TODO -> in: population met, retraction does not apply.
    let script = "a\nc population\nc retracted\na\nq\n";
    let (counts, output) = run_script(
        &mut engine,
        QueueKind::Screen,
        script,
        SessionOptions::default(),
    );

    assert!(output.contains("criteria:"), "{output}");
    assert!(output.contains("error [validation]"), "{output}");
    assert_eq!(counts.included, 1);
    assert_eq!(engine.status_of("pdf1"), Some(RecordState::RevIncluded));
}

#[test]
fn enrich_ahead_calls_engine_and_reasserts() {
    let mut engine = prescreen_engine(4);
    let options = SessionOptions { enrich_ahead: 2 };
    let (_, _) = run_script(&mut engine, QueueKind::Prescreen, "i\nq\n", options);

    let calls = engine.calls();
    let enrich_at = calls
        .iter()
        .position(|call| call == "batch_enrich_records")
        .expect("enrichment ran");
    assert!(calls[enrich_at + 1..].iter().any(|call| call == "get_record"));
}

#[test]
fn preview_truncates_on_char_boundary() {
    assert_eq!(preview("a  b\nc", 10), "a b c");
    assert_eq!(preview("ééééé", 3), "ééé...");
}
