//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use screenflow::engine::{
    BackingRecord, DecisionChange, DecisionReceipt, DecisionSubmission, EnrichReport, QueuePage,
    StatusReport, UpdateDecisionsReport,
};
use screenflow::{
    EngineError, MemoryEngine, Operation, OperationFacts, QueueKind, RecordState, ReviewEngine,
    StdioEngine, StdioEngineConfig,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Record ids plus the status each one held when captured.
pub type StatusSnapshot = Vec<(String, RecordState)>;

/// Engine whose enrichment writes back stale record statuses.
///
/// Mirrors a background writer that read records before a decision landed
/// and saved them afterwards.
pub struct ScriptedEngine {
    pub inner: MemoryEngine,
    stale_on_enrich: Option<StatusSnapshot>,
    enrich_calls: usize,
}

impl ScriptedEngine {
    pub fn new(inner: MemoryEngine) -> Self {
        Self {
            inner,
            stale_on_enrich: None,
            enrich_calls: 0,
        }
    }

    pub fn capture(&self) -> StatusSnapshot {
        self.inner
            .records()
            .iter()
            .filter_map(|record| Some((record.id.clone(), record.status?)))
            .collect()
    }

    /// The next enrichment call restores `snapshot`.
    pub fn revert_on_next_enrich(&mut self, snapshot: StatusSnapshot) {
        self.stale_on_enrich = Some(snapshot);
    }

    pub fn enrich_calls(&self) -> usize {
        self.enrich_calls
    }

    pub fn status_of(&self, record_id: &str) -> Option<RecordState> {
        self.inner.status_of(record_id)
    }
}

impl ReviewEngine for ScriptedEngine {
    fn ping(&mut self) -> Result<(), EngineError> {
        self.inner.ping()
    }

    fn get_status(&mut self) -> Result<StatusReport, EngineError> {
        self.inner.get_status()
    }

    fn get_operation_info(&mut self, operation: Operation) -> Result<OperationFacts, EngineError> {
        self.inner.get_operation_info(operation)
    }

    fn get_queue(&mut self, kind: QueueKind, limit: usize) -> Result<QueuePage, EngineError> {
        self.inner.get_queue(kind, limit)
    }

    fn get_record(&mut self, record_id: &str) -> Result<BackingRecord, EngineError> {
        self.inner.get_record(record_id)
    }

    fn get_records(&mut self, states: &[RecordState]) -> Result<Vec<BackingRecord>, EngineError> {
        self.inner.get_records(states)
    }

    fn submit_decision(
        &mut self,
        kind: QueueKind,
        submission: &DecisionSubmission,
    ) -> Result<DecisionReceipt, EngineError> {
        self.inner.submit_decision(kind, submission)
    }

    fn update_screen_decisions(
        &mut self,
        changes: &[DecisionChange],
    ) -> Result<UpdateDecisionsReport, EngineError> {
        self.inner.update_screen_decisions(changes)
    }

    fn batch_enrich_records(&mut self, record_ids: &[String]) -> Result<EnrichReport, EngineError> {
        self.enrich_calls += 1;
        let report = self.inner.batch_enrich_records(record_ids)?;
        if let Some(snapshot) = self.stale_on_enrich.take() {
            for (record_id, status) in snapshot {
                self.inner.set_status(&record_id, status);
            }
        }
        Ok(report)
    }
}

/// Records `rec0..recN` waiting in `state`, titled after their index.
pub fn engine_with(count: usize, state: RecordState) -> MemoryEngine {
    (0..count).fold(MemoryEngine::new(), |engine, n| {
        let mut record = BackingRecord::new(format!("rec{n}"), state);
        record.content.title = format!("Record {n}");
        engine.with_record(record)
    })
}

/// A shell script standing in for the engine process.
pub struct FakeEngine {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl FakeEngine {
    /// `body` is the `case "$line" in ... esac` arms; `$id` holds the request id.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("engine.sh");
        let text = format!(
            r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
{body}
    *) printf '{{"jsonrpc":"2.0","error":{{"code":-32601,"message":"Method not found"}},"id":%s}}\n' "$id" ;;
  esac
done
"#
        );
        fs::write(&script, text).expect("write engine script");
        Self { dir, script }
    }

    pub fn command(&self) -> String {
        format!("sh {}", shell_words::quote(&self.script.display().to_string()))
    }

    pub fn spawn(&self, call_timeout: Option<Duration>) -> StdioEngine {
        let config = StdioEngineConfig::new(self.command(), "demo", self.dir.path())
            .with_call_timeout(call_timeout);
        StdioEngine::spawn(config).expect("spawn fake engine")
    }
}
