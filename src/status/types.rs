use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Record states reported by the review engine, in pipeline order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    MdRetrieved,
    MdImported,
    MdNeedsManualPreparation,
    MdPrepared,
    MdProcessed,
    RevPrescreenExcluded,
    RevPrescreenIncluded,
    PdfNeedsManualRetrieval,
    PdfNotAvailable,
    PdfImported,
    PdfNeedsManualPreparation,
    PdfPrepared,
    RevExcluded,
    RevIncluded,
    RevSynthesized,
}

impl RecordState {
    pub const ALL: [RecordState; 15] = [
        RecordState::MdRetrieved,
        RecordState::MdImported,
        RecordState::MdNeedsManualPreparation,
        RecordState::MdPrepared,
        RecordState::MdProcessed,
        RecordState::RevPrescreenExcluded,
        RecordState::RevPrescreenIncluded,
        RecordState::PdfNeedsManualRetrieval,
        RecordState::PdfNotAvailable,
        RecordState::PdfImported,
        RecordState::PdfNeedsManualPreparation,
        RecordState::PdfPrepared,
        RecordState::RevExcluded,
        RecordState::RevIncluded,
        RecordState::RevSynthesized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::MdRetrieved => "md_retrieved",
            RecordState::MdImported => "md_imported",
            RecordState::MdNeedsManualPreparation => "md_needs_manual_preparation",
            RecordState::MdPrepared => "md_prepared",
            RecordState::MdProcessed => "md_processed",
            RecordState::RevPrescreenExcluded => "rev_prescreen_excluded",
            RecordState::RevPrescreenIncluded => "rev_prescreen_included",
            RecordState::PdfNeedsManualRetrieval => "pdf_needs_manual_retrieval",
            RecordState::PdfNotAvailable => "pdf_not_available",
            RecordState::PdfImported => "pdf_imported",
            RecordState::PdfNeedsManualPreparation => "pdf_needs_manual_preparation",
            RecordState::PdfPrepared => "pdf_prepared",
            RecordState::RevExcluded => "rev_excluded",
            RecordState::RevIncluded => "rev_included",
            RecordState::RevSynthesized => "rev_synthesized",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        RecordState::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
    }

    /// States where a record waits for a person rather than for an operation.
    pub fn is_manual_attention(&self) -> bool {
        matches!(
            self,
            RecordState::MdNeedsManualPreparation
                | RecordState::PdfNeedsManualRetrieval
                | RecordState::PdfNeedsManualPreparation
        )
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review operations, one per pipeline stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Search,
    Load,
    Prep,
    Dedupe,
    Prescreen,
    PdfGet,
    PdfPrep,
    Screen,
    Data,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Search,
        Operation::Load,
        Operation::Prep,
        Operation::Dedupe,
        Operation::Prescreen,
        Operation::PdfGet,
        Operation::PdfPrep,
        Operation::Screen,
        Operation::Data,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::Load => "load",
            Operation::Prep => "prep",
            Operation::Dedupe => "dedupe",
            Operation::Prescreen => "prescreen",
            Operation::PdfGet => "pdf_get",
            Operation::PdfPrep => "pdf_prep",
            Operation::Screen => "screen",
            Operation::Data => "data",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Operation::ALL.into_iter().find(|op| op.as_str() == value)
    }

    /// Human-readable summary, used when the engine omits one.
    pub fn description(&self) -> &'static str {
        match self {
            Operation::Search => "Search configured sources for records",
            Operation::Load => "Import search results into main records file",
            Operation::Prep => "Prepare and clean metadata for imported records",
            Operation::Dedupe => "Identify and merge duplicate records",
            Operation::Prescreen => "Screen records based on titles and abstracts",
            Operation::PdfGet => "Retrieve PDF documents for included records",
            Operation::PdfPrep => "Prepare and validate retrieved PDFs",
            Operation::Screen => "Full-text screening of records",
            Operation::Data => "Data extraction and synthesis",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete status of one stage for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Warning,
    Complete,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Warning => "warning",
            StepStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine answer to `get_operation_info` for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFacts {
    #[serde(default)]
    pub can_run: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub needs_rerun: bool,
    #[serde(default)]
    pub needs_rerun_reason: Option<String>,
    #[serde(default)]
    pub affected_records: u64,
    #[serde(default)]
    pub description: Option<String>,
}

impl OperationFacts {
    /// Facts for a stage whose operation is ready with nothing to flag.
    pub fn runnable() -> Self {
        Self {
            can_run: true,
            ..Self::default()
        }
    }

    /// Human-readable reason for a configuration block, if any.
    pub fn block_reason(&self) -> Option<&str> {
        if self.needs_rerun {
            return Some(
                self.needs_rerun_reason
                    .as_deref()
                    .unwrap_or("operation needs to be re-run"),
            );
        }
        if !self.can_run {
            return Some(self.reason.as_deref().unwrap_or("operation cannot run"));
        }
        None
    }
}

/// Operation facts keyed by stage id (`search`, `load`, ...).
pub type OperationFactsMap = BTreeMap<String, OperationFacts>;
