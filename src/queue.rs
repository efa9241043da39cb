//! Sequential decision queues for prescreen and full-text screen.
//!
//! Both stages share one controller ([`DecisionQueue`]); they differ only in
//! the record state that marks a record as ready and in whether criteria
//! gate the decision.
//!
//! # Decision Lifecycle
//!
//! ```text
//! undecided --begin_decision--> deciding --finish(ok)--> included | excluded
//!                                   |
//!                                   +--finish(err)--> undecided
//! ```
//!
//! Decided positions never return to undecided within a session.
use crate::criteria::CriteriaDecisions;
use crate::engine::RecordContent;
use crate::status::RecordState;
use serde::{Deserialize, Serialize};
use std::fmt;

mod controller;
mod progress;

pub use controller::{Cursor, DecisionQueue, PendingDecision};
pub use progress::{render_bar, ProgressSegment, QueueCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Prescreen,
    Screen,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Prescreen => "prescreen",
            QueueKind::Screen => "screen",
        }
    }

    /// Backing status a record must hold to be decided in this queue.
    pub fn ready_state(&self) -> RecordState {
        match self {
            QueueKind::Prescreen => RecordState::MdProcessed,
            QueueKind::Screen => RecordState::PdfPrepared,
        }
    }

    pub fn decided_state(&self, decision: Decision) -> RecordState {
        match (self, decision) {
            (QueueKind::Prescreen, Decision::Include) => RecordState::RevPrescreenIncluded,
            (QueueKind::Prescreen, Decision::Exclude) => RecordState::RevPrescreenExcluded,
            (QueueKind::Screen, Decision::Include) => RecordState::RevIncluded,
            (QueueKind::Screen, Decision::Exclude) => RecordState::RevExcluded,
        }
    }

    /// Full-text screening is gated on the configured criteria.
    pub fn uses_criteria(&self) -> bool {
        matches!(self, QueueKind::Screen)
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Include,
    Exclude,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Include => "include",
            Decision::Exclude => "exclude",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Decision::Include => Decision::Exclude,
            Decision::Exclude => Decision::Include,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    #[default]
    Undecided,
    Included,
    Excluded,
}

impl DecisionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionState::Undecided => "undecided",
            DecisionState::Included => "included",
            DecisionState::Excluded => "excluded",
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            DecisionState::Undecided => None,
            DecisionState::Included => Some(Decision::Include),
            DecisionState::Excluded => Some(Decision::Exclude),
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, DecisionState::Undecided)
    }
}

impl From<Decision> for DecisionState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Include => DecisionState::Included,
            Decision::Exclude => DecisionState::Excluded,
        }
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queue position. Only the owning [`DecisionQueue`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueRecord {
    id: String,
    content: RecordContent,
    decision: DecisionState,
    criteria: CriteriaDecisions,
}

impl QueueRecord {
    pub fn new(id: impl Into<String>, content: RecordContent, criteria: CriteriaDecisions) -> Self {
        Self {
            id: id.into(),
            content,
            decision: DecisionState::Undecided,
            criteria,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &RecordContent {
        &self.content
    }

    pub fn decision(&self) -> DecisionState {
        self.decision
    }

    pub fn criteria(&self) -> &CriteriaDecisions {
        &self.criteria
    }

    pub fn is_decided(&self) -> bool {
        self.decision.is_decided()
    }
}
