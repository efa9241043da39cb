use super::snapshot::RecordCountSnapshot;
use super::stage::{Exemptions, StageDefinition};
use super::types::{OperationFacts, OperationFactsMap, RecordState, StepStatus};

/// Maps a snapshot onto one status per stage.
///
/// Holds only the exemption table. Every call recomputes from its arguments.
#[derive(Debug, Clone, Default)]
pub struct StepStatusDeriver {
    exemptions: Exemptions,
}

impl StepStatusDeriver {
    pub fn new(exemptions: Exemptions) -> Self {
        Self { exemptions }
    }

    pub fn exemptions(&self) -> &Exemptions {
        &self.exemptions
    }

    /// Status of `stage` for `snapshot`.
    ///
    /// Leaf rules, first match wins:
    /// 1. no snapshot: `pending`
    /// 2. a non-exempt input state holds records: `active`
    /// 3. the engine reports a configuration block: `warning`
    /// 4. an output state was reached: `complete`
    /// 5. only exempt input states hold records: `active`
    /// 6. otherwise `pending`
    ///
    /// Grouped stages fold their sub-stage statuses with [`fold_group_statuses`].
    pub fn derive(
        &self,
        snapshot: Option<&RecordCountSnapshot>,
        stage: &StageDefinition,
        facts: &OperationFactsMap,
    ) -> StepStatus {
        if stage.is_grouped() {
            let statuses: Vec<StepStatus> = stage
                .sub_stages
                .iter()
                .map(|sub| self.derive(snapshot, sub, facts))
                .collect();
            return fold_group_statuses(&statuses);
        }

        let Some(snapshot) = snapshot else {
            return StepStatus::Pending;
        };

        let (exempt, blocking): (Vec<RecordState>, Vec<RecordState>) = stage
            .input_states
            .iter()
            .copied()
            .partition(|state| self.exemptions.is_exempt(&stage.id, *state));

        if blocking.iter().any(|state| snapshot.current(*state) > 0) {
            return StepStatus::Active;
        }
        if is_configuration_blocked(stage, facts.get(&stage.id)) {
            return StepStatus::Warning;
        }
        if stage
            .output_states
            .iter()
            .any(|state| snapshot.reached(*state) > 0)
        {
            return StepStatus::Complete;
        }
        if exempt.iter().any(|state| snapshot.current(*state) > 0) {
            return StepStatus::Active;
        }
        StepStatus::Pending
    }
}

// Record-consuming stages report can_run=false whenever they have no input,
// which is not a problem. Only source-driven stages can be misconfigured.
fn is_configuration_blocked(stage: &StageDefinition, facts: Option<&OperationFacts>) -> bool {
    if stage.consumes_records() {
        return false;
    }
    facts.is_some_and(|facts| facts.needs_rerun || !facts.can_run)
}

/// Combine sub-stage statuses into the status of their group.
pub fn fold_group_statuses(statuses: &[StepStatus]) -> StepStatus {
    if statuses.is_empty() {
        return StepStatus::Pending;
    }
    if statuses.iter().all(|status| *status == StepStatus::Complete) {
        return StepStatus::Complete;
    }
    if statuses.contains(&StepStatus::Active) {
        return StepStatus::Active;
    }
    if statuses.contains(&StepStatus::Warning) {
        return StepStatus::Warning;
    }
    if statuses.iter().all(|status| *status == StepStatus::Pending) {
        return StepStatus::Pending;
    }
    // Some sub-stages finished, others have not started.
    StepStatus::Active
}

#[cfg(test)]
#[path = "derive_tests.rs"]
mod tests;
