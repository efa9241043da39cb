//! Pipeline stage statuses derived from record-state counts.
//!
//! Every status here is recomputed from a [`RecordCountSnapshot`] on each call;
//! nothing is cached between snapshots. The deriver is a pure function of
//! `(snapshot, stage, facts)`, so the same inputs always yield the same status.
//!
//! # Status Structure
//!
//! ```text
//! PipelineView
//! ├── stages: [StageView, ...]
//! │   ├── search:    pending | active | warning | complete
//! │   ├── metadata:  folded from load, prep, dedupe
//! │   ├── prescreen
//! │   ├── pdfs:      folded from pdf_get, pdf_prep
//! │   ├── screen
//! │   └── data
//! ├── import_complete: load AND prep AND dedupe complete
//! └── next_operation: first stage with records waiting in an input state
//! ```
//!
//! # Submodules
//!
//! - `snapshot`: count snapshots decoded from the engine's status report
//! - `stage`: stage catalog and manual-attention exemptions
//! - `derive`: the per-stage derivation rules
//! - `pipeline`: import tracker and the full review pipeline view
//!
//! # Manual Attention
//!
//! Records parked in a "needs manual" state still count as input for their
//! stage, but they must not keep the stage from reporting `complete` once
//! it has produced output. Which states are exempt is configuration, see
//! [`Exemptions`].
mod derive;
mod pipeline;
mod snapshot;
mod stage;
mod types;

pub use derive::{fold_group_statuses, StepStatusDeriver};
pub use pipeline::{
    next_operation, ImportStatuses, PipelineCompletionTracker, PipelineView, ReviewPipeline,
    StageView,
};
pub use snapshot::RecordCountSnapshot;
pub use stage::{Exemptions, StageDefinition};
pub use types::{Operation, OperationFacts, OperationFactsMap, RecordState, StepStatus};
