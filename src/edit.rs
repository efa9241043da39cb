//! Batch edit of finished full-text screen decisions.
//!
//! An [`EditSession`] snapshots every record in `rev_included`/`rev_excluded`
//! and tracks each record's `original` decision next to its `current` one.
//! Only records whose two values differ are submitted, in one
//! `update_screen_decisions` batch.
//!
//! The engine may skip individual entries (record gone, record moved out
//! of a screen state). Skipped entries stay changed so the reviewer can see
//! them and retry; applied entries take the new decision as their baseline.
use crate::engine::{DecisionChange, ReviewEngine, SkippedChange, UpdateDecisionsReport};
use crate::error::{EditError, ErrorClass};
use crate::queue::Decision;
use crate::status::RecordState;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRecord {
    pub id: String,
    pub title: String,
    /// Decision at load time or after the last successful save.
    pub original: Decision,
    pub current: Decision,
}

impl EditRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, decision: Decision) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            original: decision,
            current: decision,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.current != self.original
    }
}

/// Outcome of one save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Flipped by the engine.
    pub applied: Vec<String>,
    /// Accepted, but the engine already held the requested decision.
    pub unchanged: Vec<String>,
    /// Rejected per entry; these records stay changed.
    pub skipped: Vec<SkippedChange>,
}

impl SaveReport {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn class(&self) -> Option<ErrorClass> {
        self.is_partial().then_some(ErrorClass::PartialBatch)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditSession {
    records: Vec<EditRecord>,
    saving: bool,
}

impl EditSession {
    /// Snapshot all decided screen records.
    pub fn load<E>(engine: &mut E) -> Result<Self, EditError>
    where
        E: ReviewEngine + ?Sized,
    {
        let backing =
            engine.get_records(&[RecordState::RevIncluded, RecordState::RevExcluded])?;
        let records: Vec<EditRecord> = backing
            .into_iter()
            .filter_map(|record| {
                let decision = record.screen_decision()?;
                Some(EditRecord::new(record.id, record.content.title, decision))
            })
            .collect();
        tracing::info!(records = records.len(), "edit session loaded");
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<EditRecord>) -> Self {
        Self {
            records,
            saving: false,
        }
    }

    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    pub fn record(&self, record_id: &str) -> Option<&EditRecord> {
        self.records.iter().find(|record| record.id == record_id)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Flip a record's current decision; returns the new value.
    pub fn toggle(&mut self, record_id: &str) -> Result<Decision, EditError> {
        if self.saving {
            return Err(EditError::SaveInProgress);
        }
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == record_id)
            .ok_or_else(|| EditError::UnknownRecord {
                record_id: record_id.to_string(),
            })?;
        record.current = record.current.flipped();
        Ok(record.current)
    }

    pub fn changed_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_changed()).count()
    }

    pub fn can_save(&self) -> bool {
        !self.saving && self.changed_count() > 0
    }

    /// The minimal set of changes: changed records only.
    pub fn changeset(&self) -> Vec<DecisionChange> {
        self.records
            .iter()
            .filter(|record| record.is_changed())
            .map(|record| DecisionChange {
                record_id: record.id.clone(),
                decision: record.current,
            })
            .collect()
    }

    /// Mark the session as saving and hand out the batch to submit.
    pub fn begin_save(&mut self) -> Result<Vec<DecisionChange>, EditError> {
        if self.saving {
            return Err(EditError::SaveInProgress);
        }
        let changes = self.changeset();
        if changes.is_empty() {
            return Err(EditError::NothingToSave);
        }
        self.saving = true;
        Ok(changes)
    }

    /// Reconcile baselines with the engine's answer to `changes`.
    ///
    /// A failed call leaves every record as it was, and so does a call
    /// without a matching [`EditSession::begin_save`].
    pub fn finish_save(
        &mut self,
        changes: &[DecisionChange],
        outcome: Result<UpdateDecisionsReport, EditError>,
    ) -> Result<SaveReport, EditError> {
        if !self.saving {
            return Err(EditError::NoSaveInProgress);
        }
        self.saving = false;
        let engine_report = outcome?;

        let skipped_ids: BTreeSet<&str> = engine_report
            .skipped
            .iter()
            .map(|skip| skip.record_id.as_str())
            .collect();
        let applied_ids: BTreeSet<&str> = engine_report
            .updated_records
            .iter()
            .map(String::as_str)
            .collect();

        let mut report = SaveReport {
            skipped: engine_report.skipped.clone(),
            ..SaveReport::default()
        };
        for change in changes {
            let id = change.record_id.as_str();
            if skipped_ids.contains(id) {
                continue;
            }
            if let Some(record) = self.records.iter_mut().find(|record| record.id == id) {
                record.original = change.decision;
            }
            if applied_ids.contains(id) {
                report.applied.push(change.record_id.clone());
            } else {
                report.unchanged.push(change.record_id.clone());
            }
        }

        tracing::info!(
            applied = report.applied.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "screen decisions saved"
        );
        for skip in &report.skipped {
            tracing::warn!(record_id = %skip.record_id, reason = %skip.reason, "edit skipped");
        }
        Ok(report)
    }

    pub fn save<E>(&mut self, engine: &mut E) -> Result<SaveReport, EditError>
    where
        E: ReviewEngine + ?Sized,
    {
        let changes = self.begin_save()?;
        let outcome = engine
            .update_screen_decisions(&changes)
            .map_err(EditError::from);
        self.finish_save(&changes, outcome)
    }

    /// Discard the session. Returns how many unsaved changes were dropped.
    pub fn close(self) -> usize {
        let unsaved = self.changed_count();
        if unsaved > 0 {
            tracing::debug!(unsaved, "edit session closed with unsaved changes");
        }
        unsaved
    }
}

#[cfg(test)]
#[path = "edit_tests.rs"]
mod tests;
