//! In-memory engine with the same acceptance rules as the real one.
//!
//! Used to exercise queues and edit sessions without a running engine.
use super::types::{
    BackingRecord, DecisionChange, DecisionReceipt, DecisionSubmission, EnrichReport,
    EnrichResult, QueueEntry, QueuePage, SkippedChange, StatusReport, UpdateDecisionsReport,
};
use super::{protocol, ReviewEngine};
use crate::criteria::{format_criteria_string, CriterionDefinition};
use crate::error::EngineError;
use crate::queue::{Decision, QueueKind};
use crate::status::{next_operation, Operation, OperationFacts, RecordState, StageDefinition};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct MemoryEngine {
    records: Vec<BackingRecord>,
    criteria: Vec<CriterionDefinition>,
    facts: BTreeMap<Operation, OperationFacts>,
    calls: Vec<String>,
    fail_next: Option<EngineError>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records keep insertion order, which is also queue order.
    pub fn with_record(mut self, record: BackingRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_criteria(mut self, criteria: Vec<CriterionDefinition>) -> Self {
        self.criteria = criteria;
        self
    }

    /// Override the computed facts for one operation.
    pub fn with_facts(mut self, operation: Operation, facts: OperationFacts) -> Self {
        self.facts.insert(operation, facts);
        self
    }

    pub fn records(&self) -> &[BackingRecord] {
        &self.records
    }

    pub fn status_of(&self, record_id: &str) -> Option<RecordState> {
        self.find(record_id).and_then(|record| record.status)
    }

    /// Overwrite a record's status, as another writer would.
    pub fn set_status(&mut self, record_id: &str, status: RecordState) {
        if let Some(index) = self.position(record_id) {
            self.records[index].status = Some(status);
        }
    }

    /// Method names in call order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&mut self, error: EngineError) {
        self.fail_next = Some(error);
    }

    fn enter(&mut self, method: &str) -> Result<(), EngineError> {
        self.calls.push(method.to_string());
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find(&self, record_id: &str) -> Option<&BackingRecord> {
        self.records.iter().find(|record| record.id == record_id)
    }

    fn position(&self, record_id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id == record_id)
    }

    fn count(&self, state: RecordState) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == Some(state))
            .count()
    }

    fn invalid_params(method: &str, message: String) -> EngineError {
        EngineError::Rpc {
            method: method.to_string(),
            code: protocol::INVALID_PARAMS,
            message,
            data: Some("ValueError".to_string()),
        }
    }
}

impl ReviewEngine for MemoryEngine {
    fn ping(&mut self) -> Result<(), EngineError> {
        self.enter("ping")
    }

    fn get_status(&mut self) -> Result<StatusReport, EngineError> {
        self.enter("get_status")?;
        let mut currently = BTreeMap::new();
        let mut overall = BTreeMap::new();
        for state in RecordState::ALL {
            currently.insert(state.as_str().to_string(), self.count(state) as i64);
            let passed = self
                .records
                .iter()
                .filter_map(|record| record.status)
                .filter(|status| passed_through(*status, state))
                .count();
            overall.insert(state.as_str().to_string(), passed as i64);
        }
        let report = StatusReport {
            overall,
            currently,
            total_records: self.records.len() as i64,
            ..StatusReport::default()
        };
        let next = next_operation(&report.snapshot());
        Ok(StatusReport {
            next_operation: next.map(|operation| operation.as_str().to_string()),
            ..report
        })
    }

    fn get_operation_info(&mut self, operation: Operation) -> Result<OperationFacts, EngineError> {
        self.enter("get_operation_info")?;
        if let Some(facts) = self.facts.get(&operation) {
            return Ok(facts.clone());
        }
        let stage = StageDefinition::for_operation(operation);
        let affected: usize = stage
            .input_states
            .iter()
            .map(|state| self.count(*state))
            .sum();
        let can_run = !stage.consumes_records() || affected > 0;
        Ok(OperationFacts {
            can_run,
            reason: (!can_run).then(|| format!("No records for {operation}")),
            affected_records: affected as u64,
            description: Some(operation.description().to_string()),
            ..OperationFacts::default()
        })
    }

    fn get_queue(&mut self, kind: QueueKind, limit: usize) -> Result<QueuePage, EngineError> {
        let method = match kind {
            QueueKind::Prescreen => "get_prescreen_queue",
            QueueKind::Screen => "get_screen_queue",
        };
        self.enter(method)?;
        let ready: Vec<&BackingRecord> = self
            .records
            .iter()
            .filter(|record| record.status == Some(kind.ready_state()))
            .collect();
        let records = ready
            .iter()
            .take(limit)
            .map(|record| {
                record.criteria().into_iter().fold(
                    QueueEntry::new(record.id.clone(), record.content.clone()),
                    |entry, (name, mark)| entry.with_criterion(&name, mark.as_str()),
                )
            })
            .collect();
        Ok(QueuePage {
            total_count: ready.len() as u64,
            records,
            criteria: if kind.uses_criteria() {
                self.criteria.clone()
            } else {
                Vec::new()
            },
        })
    }

    fn get_record(&mut self, record_id: &str) -> Result<BackingRecord, EngineError> {
        self.enter("get_record")?;
        self.find(record_id).cloned().ok_or_else(|| {
            Self::invalid_params("get_record", format!("Record '{record_id}' not found"))
        })
    }

    fn get_records(&mut self, states: &[RecordState]) -> Result<Vec<BackingRecord>, EngineError> {
        self.enter("get_records")?;
        Ok(self
            .records
            .iter()
            .filter(|record| record.status.is_some_and(|status| states.contains(&status)))
            .cloned()
            .collect())
    }

    fn submit_decision(
        &mut self,
        kind: QueueKind,
        submission: &DecisionSubmission,
    ) -> Result<DecisionReceipt, EngineError> {
        let method = match kind {
            QueueKind::Prescreen => "prescreen_record",
            QueueKind::Screen => "screen_record",
        };
        self.enter(method)?;
        let index = self.position(&submission.record_id).ok_or_else(|| {
            Self::invalid_params(method, format!("Record '{}' not found", submission.record_id))
        })?;
        let current = self.records[index].status;
        if current != Some(kind.ready_state()) {
            let current = current.map(|state| state.as_str()).unwrap_or("unknown");
            return Err(Self::invalid_params(
                method,
                format!(
                    "Record '{}' is not ready for {} (current status: {current})",
                    submission.record_id,
                    kind.as_str()
                ),
            ));
        }

        let new_status = kind.decided_state(submission.decision);
        let record = &mut self.records[index];
        record.status = Some(new_status);
        if !submission.criteria_decisions.is_empty() {
            record.screening_criteria = Some(format_criteria_string(&submission.criteria_decisions));
        }
        Ok(DecisionReceipt {
            record_id: submission.record_id.clone(),
            decision: submission.decision,
            new_status: Some(new_status),
            remaining_count: Some(self.count(kind.ready_state()) as u64),
        })
    }

    fn update_screen_decisions(
        &mut self,
        changes: &[DecisionChange],
    ) -> Result<UpdateDecisionsReport, EngineError> {
        self.enter("update_screen_decisions")?;
        if changes.is_empty() {
            return Err(Self::invalid_params(
                "update_screen_decisions",
                "changes parameter is required and must be a non-empty list".to_string(),
            ));
        }
        let mut report = UpdateDecisionsReport::default();
        for change in changes {
            let Some(index) = self.position(&change.record_id) else {
                report.skipped.push(SkippedChange {
                    record_id: change.record_id.clone(),
                    reason: "Record not found".to_string(),
                });
                continue;
            };
            let record = &mut self.records[index];
            let target = match change.decision {
                Decision::Include => RecordState::RevIncluded,
                Decision::Exclude => RecordState::RevExcluded,
            };
            match record.status {
                Some(RecordState::RevIncluded | RecordState::RevExcluded) => {}
                other => {
                    let shown = other.map(|state| state.as_str()).unwrap_or("unknown");
                    report.skipped.push(SkippedChange {
                        record_id: change.record_id.clone(),
                        reason: format!("Invalid state: {shown}"),
                    });
                    continue;
                }
            }
            if record.status == Some(target) {
                continue;
            }
            record.status = Some(target);
            report.updated_records.push(change.record_id.clone());
        }
        report.changes_count = report.updated_records.len() as u64;
        Ok(report)
    }

    fn batch_enrich_records(&mut self, record_ids: &[String]) -> Result<EnrichReport, EngineError> {
        self.enter("batch_enrich_records")?;
        let mut report = EnrichReport::default();
        for record_id in record_ids {
            let found = self.find(record_id).is_some();
            if found {
                report.enriched_count += 1;
            } else {
                report.failed_count += 1;
            }
            report.records.push(EnrichResult {
                record_id: record_id.clone(),
                success: found,
                error: (!found).then(|| "Record not found".to_string()),
            });
        }
        Ok(report)
    }
}

/// Whether a record now in `status` went through `state` to get there.
fn passed_through(status: RecordState, state: RecordState) -> bool {
    let mut frontier = vec![status];
    let mut seen = BTreeSet::new();
    while let Some(current) = frontier.pop() {
        if current == state {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        for operation in Operation::ALL {
            let stage = StageDefinition::for_operation(operation);
            if stage.output_states.contains(&current) {
                frontier.extend(stage.input_states.iter().copied());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_counts_upstream_states() {
        let mut engine = MemoryEngine::new()
            .with_record(BackingRecord::new("a", RecordState::PdfPrepared))
            .with_record(BackingRecord::new("b", RecordState::RevPrescreenExcluded));
        let report = engine.get_status().expect("status");

        assert_eq!(report.overall["md_retrieved"], 2);
        assert_eq!(report.overall["md_processed"], 2);
        assert_eq!(report.overall["rev_prescreen_included"], 1);
        assert_eq!(report.overall["pdf_prepared"], 1);
        assert_eq!(report.overall["rev_included"], 0);
        assert_eq!(report.currently["pdf_prepared"], 1);
        assert_eq!(report.next_operation.as_deref(), Some("screen"));
    }

    #[test]
    fn stale_submission_is_rejected_as_not_ready() {
        let mut engine = MemoryEngine::new()
            .with_record(BackingRecord::new("a", RecordState::RevPrescreenIncluded));
        let submission = DecisionSubmission {
            record_id: "a".to_string(),
            decision: Decision::Include,
            criteria_decisions: Default::default(),
        };
        let err = engine
            .submit_decision(QueueKind::Prescreen, &submission)
            .expect_err("not ready");
        assert!(err.is_not_ready_rejection(), "{err}");
    }
}
