use super::types::RecordState;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate record counts at one point in time.
///
/// `currently` holds the records sitting in each state right now; `overall`
/// is cumulative and counts every record that ever reached a state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordCountSnapshot {
    currently: BTreeMap<RecordState, u64>,
    overall: BTreeMap<RecordState, u64>,
}

impl RecordCountSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the engine's `currently`/`overall` maps.
    ///
    /// Negative counts are clamped to zero and unknown state names skipped.
    pub fn from_state_counts(
        currently: &BTreeMap<String, i64>,
        overall: &BTreeMap<String, i64>,
    ) -> Self {
        Self {
            currently: decode_counts("currently", currently),
            overall: decode_counts("overall", overall),
        }
    }

    pub fn with_current(mut self, state: RecordState, count: u64) -> Self {
        self.currently.insert(state, count);
        self
    }

    pub fn with_overall(mut self, state: RecordState, count: u64) -> Self {
        self.overall.insert(state, count);
        self
    }

    pub fn current(&self, state: RecordState) -> u64 {
        self.currently.get(&state).copied().unwrap_or(0)
    }

    pub fn overall(&self, state: RecordState) -> u64 {
        self.overall.get(&state).copied().unwrap_or(0)
    }

    /// Whether any record has reached `state`.
    ///
    /// The engine does not report cumulative counts for every state, so the
    /// current count is taken when it is larger.
    pub fn reached(&self, state: RecordState) -> u64 {
        self.overall(state).max(self.current(state))
    }

    pub fn total_records(&self) -> u64 {
        self.currently.values().sum()
    }

    /// True when no cumulative count went down relative to `previous`.
    ///
    /// Callers that poll the engine use this to check two successive reads.
    /// Derivation itself never compares snapshots, so nothing here enforces it.
    pub fn is_monotonic_successor(&self, previous: &RecordCountSnapshot) -> bool {
        RecordState::ALL
            .into_iter()
            .all(|state| self.overall(state) >= previous.overall(state))
    }
}

fn decode_counts(label: &str, raw: &BTreeMap<String, i64>) -> BTreeMap<RecordState, u64> {
    let mut counts = BTreeMap::new();
    for (name, count) in raw {
        let Some(state) = RecordState::parse(name) else {
            tracing::debug!(map = label, state = %name, "ignoring unknown record state");
            continue;
        };
        counts.insert(state, u64::try_from(*count).unwrap_or(0));
    }
    counts
}
