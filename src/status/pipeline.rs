use super::derive::StepStatusDeriver;
use super::snapshot::RecordCountSnapshot;
use super::stage::{Exemptions, StageDefinition};
use super::types::{Operation, OperationFactsMap, StepStatus};
use serde::Serialize;

/// Statuses of the three import sub-stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStatuses {
    pub load: StepStatus,
    pub prep: StepStatus,
    pub dedupe: StepStatus,
}

impl ImportStatuses {
    pub fn all_complete(&self) -> bool {
        [self.load, self.prep, self.dedupe]
            .iter()
            .all(|status| *status == StepStatus::Complete)
    }
}

/// Tracks load -> prep -> dedupe against one shared snapshot.
#[derive(Debug, Clone)]
pub struct PipelineCompletionTracker {
    deriver: StepStatusDeriver,
    load: StageDefinition,
    prep: StageDefinition,
    dedupe: StageDefinition,
}

impl PipelineCompletionTracker {
    pub fn new(exemptions: Exemptions) -> Self {
        Self {
            deriver: StepStatusDeriver::new(exemptions),
            load: StageDefinition::for_operation(Operation::Load),
            prep: StageDefinition::for_operation(Operation::Prep),
            dedupe: StageDefinition::for_operation(Operation::Dedupe),
        }
    }

    pub fn statuses(
        &self,
        snapshot: Option<&RecordCountSnapshot>,
        facts: &OperationFactsMap,
    ) -> ImportStatuses {
        ImportStatuses {
            load: self.deriver.derive(snapshot, &self.load, facts),
            prep: self.deriver.derive(snapshot, &self.prep, facts),
            dedupe: self.deriver.derive(snapshot, &self.dedupe, facts),
        }
    }

    /// Gate for everything downstream of import.
    pub fn all_complete(
        &self,
        snapshot: Option<&RecordCountSnapshot>,
        facts: &OperationFactsMap,
    ) -> bool {
        self.statuses(snapshot, facts).all_complete()
    }
}

impl Default for PipelineCompletionTracker {
    fn default() -> Self {
        Self::new(Exemptions::standard())
    }
}

/// Status of one displayed stage, with its sub-stages when grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub id: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_stages: Vec<StageView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineView {
    pub stages: Vec<StageView>,
    pub import_complete: bool,
    pub next_operation: Option<Operation>,
    pub total_records: u64,
}

impl PipelineView {
    /// Status of a top-level stage or any nested sub-stage.
    pub fn status_of(&self, id: &str) -> Option<StepStatus> {
        fn find(stages: &[StageView], id: &str) -> Option<StepStatus> {
            stages.iter().find_map(|stage| {
                if stage.id == id {
                    Some(stage.status)
                } else {
                    find(&stage.sub_stages, id)
                }
            })
        }
        find(&self.stages, id)
    }
}

/// The whole review pipeline as displayed: six top-level stages, two of them
/// grouped.
#[derive(Debug, Clone)]
pub struct ReviewPipeline {
    deriver: StepStatusDeriver,
    import: PipelineCompletionTracker,
    stages: Vec<StageDefinition>,
}

impl ReviewPipeline {
    pub fn new(exemptions: Exemptions) -> Self {
        let leaf = StageDefinition::for_operation;
        let stages = vec![
            leaf(Operation::Search),
            StageDefinition::group(
                "metadata",
                vec![
                    leaf(Operation::Load),
                    leaf(Operation::Prep),
                    leaf(Operation::Dedupe),
                ],
            ),
            leaf(Operation::Prescreen),
            StageDefinition::group(
                "pdfs",
                vec![leaf(Operation::PdfGet), leaf(Operation::PdfPrep)],
            ),
            leaf(Operation::Screen),
            leaf(Operation::Data),
        ];
        Self {
            deriver: StepStatusDeriver::new(exemptions.clone()),
            import: PipelineCompletionTracker::new(exemptions),
            stages,
        }
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn view(
        &self,
        snapshot: Option<&RecordCountSnapshot>,
        facts: &OperationFactsMap,
    ) -> PipelineView {
        let stages = self
            .stages
            .iter()
            .map(|stage| self.stage_view(snapshot, stage, facts))
            .collect();
        PipelineView {
            stages,
            import_complete: self.import.all_complete(snapshot, facts),
            next_operation: snapshot.and_then(next_operation),
            total_records: snapshot.map(RecordCountSnapshot::total_records).unwrap_or(0),
        }
    }

    fn stage_view(
        &self,
        snapshot: Option<&RecordCountSnapshot>,
        stage: &StageDefinition,
        facts: &OperationFactsMap,
    ) -> StageView {
        StageView {
            id: stage.id.clone(),
            status: self.deriver.derive(snapshot, stage, facts),
            sub_stages: stage
                .sub_stages
                .iter()
                .map(|sub| self.stage_view(snapshot, sub, facts))
                .collect(),
        }
    }
}

impl Default for ReviewPipeline {
    fn default() -> Self {
        Self::new(Exemptions::standard())
    }
}

/// First operation, in pipeline order, with records waiting in any input state.
///
/// Manual-attention states count as waiting here.
pub fn next_operation(snapshot: &RecordCountSnapshot) -> Option<Operation> {
    Operation::ALL.into_iter().find(|operation| {
        StageDefinition::for_operation(*operation)
            .input_states
            .iter()
            .any(|state| snapshot.current(*state) > 0)
    })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
