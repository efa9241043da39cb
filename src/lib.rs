//! Pipeline status derivation and screening decision queues.
//!
//! The review engine that actually searches, prepares, and deduplicates
//! records runs in a separate process; this crate only talks to it through
//! [`engine::ReviewEngine`]. Everything else here is local state: stage
//! statuses derived from record counts, the prescreen/screen decision queues,
//! criteria aggregation, and the batch edit of finished screen decisions.
pub mod config;
pub mod criteria;
pub mod edit;
pub mod engine;
pub mod error;
pub mod queue;
pub mod session;
pub mod status;

pub use criteria::{
    resolve, CriteriaDecisions, CriteriaOutcome, CriterionDecision, CriterionDefinition,
    CriterionKind,
};
pub use edit::{EditRecord, EditSession, SaveReport};
pub use engine::{MemoryEngine, ReviewEngine, StdioEngine, StdioEngineConfig};
pub use error::{EditError, EngineError, ErrorClass, QueueError, StageError};
pub use queue::{Cursor, Decision, DecisionQueue, DecisionState, QueueKind, QueueRecord};
pub use session::{ReviewSession, SessionOptions};
pub use status::{
    Exemptions, Operation, OperationFacts, OperationFactsMap, PipelineCompletionTracker,
    PipelineView, RecordCountSnapshot, RecordState, ReviewPipeline, StageDefinition,
    StepStatus, StepStatusDeriver,
};
