use super::progress::{self, ProgressSegment, QueueCounts};
use super::{Decision, DecisionState, QueueKind, QueueRecord};
use crate::criteria::{resolve, CriteriaDecisions, CriteriaOutcome, CriterionDecision, CriterionDefinition};
use crate::engine::{DecisionReceipt, DecisionSubmission, QueueEntry, ReviewEngine};
use crate::error::QueueError;
use crate::status::RecordState;
use serde::Serialize;

/// Where the reviewer is in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    At(usize),
    /// No undecided record remains anywhere in the queue.
    Completion,
}

/// Ticket for a decision that has been started but not finished.
///
/// Deliberately not `Clone`: each ticket finishes exactly once.
#[derive(Debug)]
#[must_use = "a pending decision must be passed to finish_decision"]
pub struct PendingDecision {
    index: usize,
    record_id: String,
    decision: Decision,
}

impl PendingDecision {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }
}

/// Ordered, resumable review queue shared by prescreen and screen.
///
/// Local decision state is authoritative for the session. Counts and
/// progress are folds over the record array and never stored.
#[derive(Debug, Clone)]
pub struct DecisionQueue {
    kind: QueueKind,
    records: Vec<QueueRecord>,
    criteria: Vec<CriterionDefinition>,
    cursor: Cursor,
    in_flight: Option<usize>,
    total_count: u64,
    remaining_hint: Option<u64>,
}

impl DecisionQueue {
    pub fn new(
        kind: QueueKind,
        entries: Vec<QueueEntry>,
        criteria: Vec<CriterionDefinition>,
    ) -> Self {
        let records: Vec<QueueRecord> = entries
            .into_iter()
            .map(|entry| {
                let marks = entry.criteria();
                QueueRecord::new(entry.id, entry.content, marks)
            })
            .collect();
        let cursor = if records.is_empty() {
            Cursor::Completion
        } else {
            Cursor::At(0)
        };
        let total_count = records.len() as u64;
        Self {
            kind,
            records,
            criteria,
            cursor,
            in_flight: None,
            total_count,
            remaining_hint: None,
        }
    }

    /// Fetch up to `limit` ready records from the engine.
    pub fn load<E>(engine: &mut E, kind: QueueKind, limit: usize) -> Result<Self, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        let page = engine.get_queue(kind, limit)?;
        tracing::info!(
            queue = kind.as_str(),
            loaded = page.records.len(),
            total = page.total_count,
            criteria = page.criteria.len(),
            "loaded decision queue"
        );
        let criteria = if kind.uses_criteria() {
            page.criteria
        } else {
            Vec::new()
        };
        let mut queue = Self::new(kind, page.records, criteria);
        queue.total_count = page.total_count.max(queue.records.len() as u64);
        Ok(queue)
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn records(&self) -> &[QueueRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&QueueRecord> {
        self.records.get(index)
    }

    pub fn criteria(&self) -> &[CriterionDefinition] {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records the engine reported as ready, including ones past the load limit.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Ready records left according to the engine's last decision receipt.
    pub fn remaining_hint(&self) -> Option<u64> {
        self.remaining_hint
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.cursor {
            Cursor::At(index) => Some(index),
            Cursor::Completion => None,
        }
    }

    pub fn current(&self) -> Option<&QueueRecord> {
        self.current_index().and_then(|index| self.records.get(index))
    }

    /// A decision is in flight; controls stay disabled until it finishes.
    pub fn is_deciding(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_current_decided(&self) -> bool {
        self.current().is_some_and(QueueRecord::is_decided)
    }

    /// Move the cursor without touching any decision.
    pub fn navigate(&mut self, index: usize) -> Result<(), QueueError> {
        self.check_index(index)?;
        self.cursor = Cursor::At(index);
        Ok(())
    }

    /// First undecided position at or after the cursor, wrapping to the
    /// front of the queue, else completion.
    pub fn skip_to_next_undecided(&mut self) -> Cursor {
        let start = match self.cursor {
            Cursor::At(start) => start,
            Cursor::Completion => 0,
        };
        self.cursor = self.next_undecided_from(start);
        self.cursor
    }

    /// Cycle one criterion mark on an undecided record.
    pub fn toggle_criterion(
        &mut self,
        index: usize,
        name: &str,
    ) -> Result<CriterionDecision, QueueError> {
        self.check_index(index)?;
        if !self.criteria.iter().any(|criterion| criterion.name == name) {
            return Err(QueueError::UnknownCriterion {
                name: name.to_string(),
            });
        }
        self.check_editable(index)?;
        let marks = &mut self.records[index].criteria;
        let next = marks.get(name).copied().unwrap_or_default().toggled();
        marks.insert(name.to_string(), next);
        Ok(next)
    }

    pub fn criteria_outcome(&self, index: usize) -> Result<CriteriaOutcome, QueueError> {
        self.check_index(index)?;
        Ok(resolve(&self.criteria, &self.records[index].criteria))
    }

    /// Mark `index` as deciding.
    ///
    /// Legal only for an undecided position while nothing else is in flight.
    /// When the queue has criteria, `decision` must match their aggregate.
    pub fn begin_decision(
        &mut self,
        index: usize,
        decision: Decision,
    ) -> Result<PendingDecision, QueueError> {
        self.check_index(index)?;
        if let Some(busy) = self.in_flight {
            return Err(QueueError::DecisionInFlight {
                record_id: self.records[busy].id.clone(),
            });
        }
        let record = &self.records[index];
        if record.is_decided() {
            return Err(QueueError::AlreadyDecided {
                record_id: record.id.clone(),
            });
        }
        if !self.criteria.is_empty() {
            match resolve(&self.criteria, &record.criteria).decision() {
                None => {
                    return Err(QueueError::CriteriaUndetermined {
                        record_id: record.id.clone(),
                    })
                }
                Some(resolved) if resolved != decision => {
                    return Err(QueueError::CriteriaConflict {
                        record_id: record.id.clone(),
                        resolved: resolved.to_string(),
                        requested: decision.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        self.in_flight = Some(index);
        Ok(PendingDecision {
            index,
            record_id: record.id.clone(),
            decision,
        })
    }

    /// Settle a started decision with the engine's outcome.
    ///
    /// On success the position takes the decision and the cursor moves to
    /// the next undecided position after it, wrapping to earlier positions.
    /// It reaches completion only once every position is decided. On failure
    /// only the in-flight marker is cleared.
    pub fn finish_decision(
        &mut self,
        pending: PendingDecision,
        outcome: Result<DecisionReceipt, QueueError>,
    ) -> Result<DecisionReceipt, QueueError> {
        if self.in_flight != Some(pending.index) {
            return Err(QueueError::NoDecisionInFlight {
                index: pending.index,
            });
        }
        self.in_flight = None;

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(
                    queue = self.kind.as_str(),
                    record_id = %pending.record_id,
                    class = err.class().as_str(),
                    error = %err,
                    "decision failed"
                );
                return Err(err);
            }
        };

        self.records[pending.index].decision = DecisionState::from(pending.decision);
        if receipt.remaining_count.is_some() {
            self.remaining_hint = receipt.remaining_count;
        }
        self.cursor = self.next_undecided_from(pending.index + 1);
        tracing::info!(
            queue = self.kind.as_str(),
            record_id = %pending.record_id,
            decision = pending.decision.as_str(),
            remaining = ?receipt.remaining_count,
            "decision recorded"
        );
        Ok(receipt)
    }

    /// Re-validate, submit, and record one decision.
    pub fn decide<E>(
        &mut self,
        engine: &mut E,
        index: usize,
        decision: Decision,
    ) -> Result<DecisionReceipt, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        let pending = self.begin_decision(index, decision)?;
        let outcome = self.submit(engine, &pending);
        self.finish_decision(pending, outcome)
    }

    pub fn decide_current<E>(
        &mut self,
        engine: &mut E,
        decision: Decision,
    ) -> Result<DecisionReceipt, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        let index = self.current_index().ok_or(QueueError::QueueComplete)?;
        self.decide(engine, index, decision)
    }

    /// Submit whatever the record's criteria resolve to.
    pub fn decide_by_criteria<E>(
        &mut self,
        engine: &mut E,
        index: usize,
    ) -> Result<DecisionReceipt, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        let decision = self.criteria_outcome(index)?.decision().ok_or_else(|| {
            QueueError::CriteriaUndetermined {
                record_id: self.records[index].id.clone(),
            }
        })?;
        self.decide(engine, index, decision)
    }

    /// Reload a record's content and report its backing status.
    ///
    /// Local decision and criteria marks are kept.
    pub fn refresh_record<E>(
        &mut self,
        engine: &mut E,
        index: usize,
    ) -> Result<Option<RecordState>, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        self.check_index(index)?;
        let backing = engine.get_record(&self.records[index].id)?;
        self.records[index].content = backing.content;
        Ok(backing.status)
    }

    /// Re-submit decided records that a background writer reverted to the
    /// ready state. Local counts do not change. Returns the repaired ids.
    pub fn reassert_decisions<E>(&mut self, engine: &mut E) -> Result<Vec<String>, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        let ready = self.kind.ready_state();
        let mut repaired = Vec::new();
        for record in self.records.iter().filter(|record| record.is_decided()) {
            let Some(decision) = record.decision.decision() else {
                continue;
            };
            let backing = engine.get_record(&record.id)?;
            if backing.status != Some(ready) {
                continue;
            }
            tracing::warn!(
                queue = self.kind.as_str(),
                record_id = %record.id,
                decision = decision.as_str(),
                "decided record was reverted; re-submitting"
            );
            let submission = self.submission(record, decision);
            engine.submit_decision(self.kind, &submission)?;
            repaired.push(record.id.clone());
        }
        Ok(repaired)
    }

    pub fn counts(&self) -> QueueCounts {
        progress::counts(&self.records)
    }

    pub fn decided_count(&self) -> usize {
        self.counts().decided
    }

    pub fn included_count(&self) -> usize {
        self.counts().included
    }

    pub fn excluded_count(&self) -> usize {
        self.counts().excluded
    }

    pub fn undecided_count(&self) -> usize {
        self.counts().undecided
    }

    pub fn progress(&self) -> Vec<ProgressSegment> {
        progress::segments(&self.records)
    }

    fn submit<E>(
        &self,
        engine: &mut E,
        pending: &PendingDecision,
    ) -> Result<DecisionReceipt, QueueError>
    where
        E: ReviewEngine + ?Sized,
    {
        let expected = self.kind.ready_state();
        let backing = engine.get_record(&pending.record_id)?;
        if backing.status != Some(expected) {
            return Err(QueueError::StalePrecondition {
                record_id: pending.record_id.clone(),
                expected,
                found: backing.status,
            });
        }

        let submission = self.submission(&self.records[pending.index], pending.decision);
        engine
            .submit_decision(self.kind, &submission)
            .map_err(|err| {
                if err.is_not_ready_rejection() {
                    QueueError::StalePrecondition {
                        record_id: pending.record_id.clone(),
                        expected,
                        found: None,
                    }
                } else {
                    QueueError::Engine(err)
                }
            })
    }

    fn submission(&self, record: &QueueRecord, decision: Decision) -> DecisionSubmission {
        // The engine accepts only settled marks.
        let criteria_decisions: CriteriaDecisions = if self.kind.uses_criteria() {
            record
                .criteria
                .iter()
                .filter(|(_, mark)| **mark != CriterionDecision::Undetermined)
                .map(|(name, mark)| (name.clone(), *mark))
                .collect()
        } else {
            CriteriaDecisions::new()
        };
        DecisionSubmission {
            record_id: record.id.clone(),
            decision,
            criteria_decisions,
        }
    }

    // Scans `start..` then wraps to `..start`.
    fn next_undecided_from(&self, start: usize) -> Cursor {
        let len = self.records.len();
        (0..len)
            .map(|offset| (start + offset) % len)
            .find(|index| !self.records[*index].is_decided())
            .map(Cursor::At)
            .unwrap_or(Cursor::Completion)
    }

    fn check_index(&self, index: usize) -> Result<(), QueueError> {
        if index >= self.records.len() {
            return Err(QueueError::IndexOutOfRange {
                index,
                len: self.records.len(),
            });
        }
        Ok(())
    }

    fn check_editable(&self, index: usize) -> Result<(), QueueError> {
        let record = &self.records[index];
        if self.in_flight == Some(index) {
            return Err(QueueError::DecisionInFlight {
                record_id: record.id.clone(),
            });
        }
        if record.is_decided() {
            return Err(QueueError::ReadOnlyRecord {
                record_id: record.id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
