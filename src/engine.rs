//! Access to the external review engine.
//!
//! The engine owns the records and runs every substantive operation; this
//! crate only reads counts and records from it and submits decisions. All
//! access goes through [`ReviewEngine`], so the queue and edit logic can be
//! driven by the JSON-RPC process client ([`StdioEngine`]) or by the
//! in-memory [`MemoryEngine`].
//!
//! # Single Writer
//!
//! Every method takes `&mut self`. Decisions, enrichment, and batch edits
//! for one project therefore pass through one channel in call order.
use crate::error::EngineError;
use crate::queue::QueueKind;
use crate::status::{Operation, OperationFacts, OperationFactsMap, RecordState};

mod client;
mod memory;
pub mod protocol;
mod types;

pub use client::{StdioEngine, StdioEngineConfig};
pub use memory::MemoryEngine;
pub use types::{
    BackingRecord, DecisionChange, DecisionReceipt, DecisionSubmission, EnrichReport,
    EnrichResult, QueueEntry, QueuePage, RecordContent, SkippedChange, StatusReport,
    UpdateDecisionsReport,
};

/// Call contract of the review engine.
pub trait ReviewEngine {
    /// Health check; the engine answers `pong`.
    fn ping(&mut self) -> Result<(), EngineError>;

    fn get_status(&mut self) -> Result<StatusReport, EngineError>;

    fn get_operation_info(&mut self, operation: Operation) -> Result<OperationFacts, EngineError>;

    /// Up to `limit` records waiting in the queue's ready state.
    fn get_queue(&mut self, kind: QueueKind, limit: usize) -> Result<QueuePage, EngineError>;

    fn get_record(&mut self, record_id: &str) -> Result<BackingRecord, EngineError>;

    /// Every record currently in one of `states`.
    fn get_records(&mut self, states: &[RecordState]) -> Result<Vec<BackingRecord>, EngineError>;

    /// `prescreen_record` or `screen_record`, depending on `kind`.
    fn submit_decision(
        &mut self,
        kind: QueueKind,
        submission: &DecisionSubmission,
    ) -> Result<DecisionReceipt, EngineError>;

    /// Flip already-screened records between included and excluded.
    fn update_screen_decisions(
        &mut self,
        changes: &[DecisionChange],
    ) -> Result<UpdateDecisionsReport, EngineError>;

    /// Fetch external metadata for records; runs as a background writer.
    fn batch_enrich_records(&mut self, record_ids: &[String]) -> Result<EnrichReport, EngineError>;

    /// Facts for every operation. Operations the engine cannot describe are
    /// left out, which derives as "no configuration block".
    fn operation_facts(&mut self) -> OperationFactsMap {
        let mut facts = OperationFactsMap::new();
        for operation in Operation::ALL {
            match self.get_operation_info(operation) {
                Ok(info) => {
                    facts.insert(operation.as_str().to_string(), info);
                }
                Err(err) => {
                    tracing::warn!(
                        operation = operation.as_str(),
                        error = %err,
                        "operation info unavailable"
                    );
                }
            }
        }
        facts
    }
}
