//! Error taxonomy shared by the engine client, queues, and edit sessions.
//!
//! Every failure maps onto an [`ErrorClass`] so callers can decide between
//! refreshing a record, reporting skipped items, or showing a blocking
//! banner without matching on individual variants.
use crate::engine::protocol;
use crate::status::RecordState;
use serde::Serialize;
use std::fmt;

/// Coarse recovery class for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The record's backing status moved; refresh and re-prompt.
    Stale,
    /// Some entries of a batch were skipped; the rest were applied.
    PartialBatch,
    /// The engine could not be reached or answered garbage; retry later.
    Transport,
    /// The request itself was rejected; retrying unchanged will not help.
    Validation,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Stale => "stale",
            ErrorClass::PartialBatch => "partial_batch",
            ErrorClass::Transport => "transport",
            ErrorClass::Validation => "validation",
        }
    }

    /// Whether the same action may succeed if the user tries again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Validation)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures talking to the external review engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Spawn, pipe, or read failure.
    #[error("engine transport failure: {0}")]
    Transport(String),

    #[error("engine call {method} timed out after {timeout_ms} ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The engine answered with a JSON-RPC error object.
    #[error("engine rejected {method} (code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// The response could not be decoded into the expected shape.
    #[error("malformed engine response for {method}: {detail}")]
    Protocol { method: String, detail: String },
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Rpc { code, .. } if protocol::is_validation_code(*code) => {
                ErrorClass::Validation
            }
            EngineError::Transport(_)
            | EngineError::Timeout { .. }
            | EngineError::Rpc { .. }
            | EngineError::Protocol { .. } => ErrorClass::Transport,
        }
    }

    /// The engine refused a decision because the record left its ready state.
    pub fn is_not_ready_rejection(&self) -> bool {
        match self {
            EngineError::Rpc { code, message, .. } => {
                *code == protocol::INVALID_PARAMS && message.contains("is not ready")
            }
            _ => false,
        }
    }
}

/// Failures of decision queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue position {index} out of range (queue has {len} records)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("record {record_id} is already decided")]
    AlreadyDecided { record_id: String },

    #[error("a decision for record {record_id} is still in flight")]
    DecisionInFlight { record_id: String },

    #[error("no decision is in flight for queue position {index}")]
    NoDecisionInFlight { index: usize },

    #[error("record {record_id} is decided and read-only")]
    ReadOnlyRecord { record_id: String },

    #[error("criteria for record {record_id} are not fully decided")]
    CriteriaUndetermined { record_id: String },

    #[error("criteria for record {record_id} resolve to {resolved}, not {requested}")]
    CriteriaConflict {
        record_id: String,
        resolved: String,
        requested: String,
    },

    #[error("unknown criterion {name:?}")]
    UnknownCriterion { name: String },

    #[error("queue is complete; no undecided record under the cursor")]
    QueueComplete,

    /// Backing status no longer matches the queue's ready state.
    #[error(
        "record {record_id} is no longer awaiting a decision (expected {expected}, found {})",
        .found.map(|state| state.as_str()).unwrap_or("unknown")
    )]
    StalePrecondition {
        record_id: String,
        expected: RecordState,
        found: Option<RecordState>,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl QueueError {
    pub fn class(&self) -> ErrorClass {
        match self {
            QueueError::StalePrecondition { .. } => ErrorClass::Stale,
            QueueError::Engine(err) => err.class(),
            _ => ErrorClass::Validation,
        }
    }
}

/// Failures of the batch edit session.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("no decisions changed; nothing to save")]
    NothingToSave,

    #[error("a save is already pending")]
    SaveInProgress,

    #[error("no save was started")]
    NoSaveInProgress,

    #[error("record {record_id} is not part of this edit session")]
    UnknownRecord { record_id: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl EditError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EditError::Engine(err) => err.class(),
            _ => ErrorClass::Validation,
        }
    }
}

/// Inconsistent stage or exemption definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("stage {stage} lists {state} as both input and output")]
    Overlap { stage: String, state: RecordState },

    #[error("grouped stage {stage} does not match the union of its sub-stages")]
    GroupMismatch { stage: String },

    #[error("unknown stage {stage:?}")]
    UnknownStage { stage: String },

    #[error("exempt state {state} is not an input state of stage {stage}")]
    NotAnInput { stage: String, state: RecordState },
}
