use super::types::{Operation, RecordState};
use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pipeline stage and the record states it consumes and produces.
///
/// Grouped stages carry their sub-stages in pipeline order; their own state
/// sets are the union of the sub-stages' sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub id: String,
    pub input_states: Vec<RecordState>,
    pub output_states: Vec<RecordState>,
    pub sub_stages: Vec<StageDefinition>,
}

impl StageDefinition {
    pub fn leaf(
        id: impl Into<String>,
        input_states: &[RecordState],
        output_states: &[RecordState],
    ) -> Self {
        Self {
            id: id.into(),
            input_states: input_states.to_vec(),
            output_states: output_states.to_vec(),
            sub_stages: Vec::new(),
        }
    }

    pub fn group(id: impl Into<String>, sub_stages: Vec<StageDefinition>) -> Self {
        let mut input_states = Vec::new();
        let mut output_states = Vec::new();
        for sub in &sub_stages {
            push_unique(&mut input_states, &sub.input_states);
            push_unique(&mut output_states, &sub.output_states);
        }
        Self {
            id: id.into(),
            input_states,
            output_states,
            sub_stages,
        }
    }

    /// The leaf stage operated on by `operation`.
    pub fn for_operation(operation: Operation) -> Self {
        use RecordState::*;
        let (inputs, outputs): (&[RecordState], &[RecordState]) = match operation {
            Operation::Search => (&[], &[MdRetrieved]),
            Operation::Load => (&[MdRetrieved], &[MdImported]),
            Operation::Prep => (&[MdImported, MdNeedsManualPreparation], &[MdPrepared]),
            Operation::Dedupe => (&[MdPrepared], &[MdProcessed]),
            Operation::Prescreen => (
                &[MdProcessed],
                &[RevPrescreenIncluded, RevPrescreenExcluded],
            ),
            Operation::PdfGet => (
                &[RevPrescreenIncluded, PdfNeedsManualRetrieval],
                &[PdfImported, PdfNotAvailable],
            ),
            Operation::PdfPrep => (&[PdfImported, PdfNeedsManualPreparation], &[PdfPrepared]),
            Operation::Screen => (&[PdfPrepared], &[RevIncluded, RevExcluded]),
            Operation::Data => (&[RevIncluded], &[RevSynthesized]),
        };
        Self::leaf(operation.as_str(), inputs, outputs)
    }

    pub fn is_grouped(&self) -> bool {
        !self.sub_stages.is_empty()
    }

    /// Source-driven stages (search) consume no records.
    pub fn consumes_records(&self) -> bool {
        !self.input_states.is_empty()
    }

    pub fn validate(&self) -> Result<(), StageError> {
        if !self.is_grouped() {
            if let Some(state) = self
                .input_states
                .iter()
                .find(|state| self.output_states.contains(state))
            {
                return Err(StageError::Overlap {
                    stage: self.id.clone(),
                    state: *state,
                });
            }
            return Ok(());
        }
        for sub in &self.sub_stages {
            sub.validate()?;
        }
        let union = StageDefinition::group(self.id.clone(), self.sub_stages.clone());
        if !same_set(&union.input_states, &self.input_states)
            || !same_set(&union.output_states, &self.output_states)
        {
            return Err(StageError::GroupMismatch {
                stage: self.id.clone(),
            });
        }
        Ok(())
    }
}

fn push_unique(target: &mut Vec<RecordState>, states: &[RecordState]) {
    for state in states {
        if !target.contains(state) {
            target.push(*state);
        }
    }
}

fn same_set(left: &[RecordState], right: &[RecordState]) -> bool {
    left.iter().all(|state| right.contains(state)) && right.iter().all(|state| left.contains(state))
}

/// Input states that must not keep a stage from completing, by stage id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exemptions(BTreeMap<String, Vec<RecordState>>);

impl Exemptions {
    pub fn none() -> Self {
        Self(BTreeMap::new())
    }

    /// The engine's manual-attention states, each exempt for the stage it feeds.
    pub fn standard() -> Self {
        Self::none()
            .with(Operation::Prep, RecordState::MdNeedsManualPreparation)
            .with(Operation::PdfGet, RecordState::PdfNeedsManualRetrieval)
            .with(Operation::PdfPrep, RecordState::PdfNeedsManualPreparation)
    }

    pub fn with(mut self, operation: Operation, state: RecordState) -> Self {
        let states = self.0.entry(operation.as_str().to_string()).or_default();
        if !states.contains(&state) {
            states.push(state);
        }
        self
    }

    pub fn for_stage(&self, stage_id: &str) -> &[RecordState] {
        self.0.get(stage_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_exempt(&self, stage_id: &str, state: RecordState) -> bool {
        self.for_stage(stage_id).contains(&state)
    }

    /// Every key must name an operation and every state must be one of its inputs.
    pub fn validate(&self) -> Result<(), StageError> {
        for (stage_id, states) in &self.0 {
            let operation =
                Operation::parse(stage_id).ok_or_else(|| StageError::UnknownStage {
                    stage: stage_id.clone(),
                })?;
            let stage = StageDefinition::for_operation(operation);
            if let Some(state) = states
                .iter()
                .find(|state| !stage.input_states.contains(state))
            {
                return Err(StageError::NotAnInput {
                    stage: stage_id.clone(),
                    state: *state,
                });
            }
        }
        Ok(())
    }
}

impl Default for Exemptions {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_leaves_are_disjoint() {
        for operation in Operation::ALL {
            assert_eq!(StageDefinition::for_operation(operation).validate(), Ok(()));
        }
    }

    #[test]
    fn group_takes_union_of_sub_stages() {
        let metadata = StageDefinition::group(
            "metadata",
            vec![
                StageDefinition::for_operation(Operation::Load),
                StageDefinition::for_operation(Operation::Prep),
                StageDefinition::for_operation(Operation::Dedupe),
            ],
        );
        assert!(metadata.is_grouped());
        assert!(metadata.input_states.contains(&RecordState::MdNeedsManualPreparation));
        assert!(metadata.output_states.contains(&RecordState::MdProcessed));
        assert_eq!(metadata.validate(), Ok(()));

        let mut broken = metadata;
        broken.output_states.pop();
        assert_eq!(
            broken.validate(),
            Err(StageError::GroupMismatch {
                stage: "metadata".to_string()
            })
        );
    }

    #[test]
    fn overlapping_leaf_is_rejected() {
        let stage = StageDefinition::leaf(
            "loop",
            &[RecordState::MdImported],
            &[RecordState::MdImported],
        );
        assert!(matches!(stage.validate(), Err(StageError::Overlap { .. })));
    }

    #[test]
    fn exemptions_must_name_input_states() {
        assert_eq!(Exemptions::standard().validate(), Ok(()));

        let bad = Exemptions::none().with(Operation::Dedupe, RecordState::MdNeedsManualPreparation);
        assert!(matches!(bad.validate(), Err(StageError::NotAnInput { .. })));

        let unknown: Exemptions =
            serde_json::from_str(r#"{"triage": ["md_imported"]}"#).expect("parse exemptions");
        assert!(matches!(unknown.validate(), Err(StageError::UnknownStage { .. })));
    }
}
