//! Typed payloads exchanged with the review engine.
use crate::criteria::{
    parse_criteria_string, CriteriaDecisions, CriterionDecision, CriterionDefinition,
};
use crate::queue::Decision;
use crate::status::{RecordCountSnapshot, RecordState};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The `status` object of a `get_status` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub overall: BTreeMap<String, i64>,
    #[serde(default)]
    pub currently: BTreeMap<String, i64>,
    #[serde(default)]
    pub total_records: i64,
    #[serde(default)]
    pub next_operation: Option<String>,
    #[serde(default)]
    pub completeness_condition: bool,
    #[serde(default)]
    pub has_changes: bool,
}

impl StatusReport {
    pub fn snapshot(&self) -> RecordCountSnapshot {
        RecordCountSnapshot::from_state_counts(&self.currently, &self.overall)
    }
}

/// Bibliographic fields shown to the reviewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContent {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booktitle: Option<String>,
    #[serde(alias = "file", default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
}

impl RecordContent {
    /// Journal or proceedings title, whichever the record has.
    pub fn venue(&self) -> Option<&str> {
        self.journal.as_deref().or(self.booktitle.as_deref())
    }
}

/// One entry of a prescreen or screen queue.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    #[serde(flatten)]
    pub content: RecordContent,
    #[serde(default)]
    current_criteria: BTreeMap<String, String>,
}

impl QueueEntry {
    pub fn new(id: impl Into<String>, content: RecordContent) -> Self {
        Self {
            id: id.into(),
            content,
            current_criteria: BTreeMap::new(),
        }
    }

    pub fn with_criterion(mut self, name: &str, value: &str) -> Self {
        self.current_criteria
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Previously stored criteria marks; unknown values read as `TODO`.
    pub fn criteria(&self) -> CriteriaDecisions {
        self.current_criteria
            .iter()
            .map(|(name, value)| (name.clone(), CriterionDecision::parse(value)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueuePage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub records: Vec<QueueEntry>,
    #[serde(default, deserialize_with = "criteria_definitions")]
    pub criteria: Vec<CriterionDefinition>,
}

/// A record as stored by the engine, from `get_record`/`get_records`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackingRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "colrev_status", default, deserialize_with = "lenient_state")]
    pub status: Option<RecordState>,
    #[serde(default)]
    pub screening_criteria: Option<String>,
    #[serde(flatten)]
    pub content: RecordContent,
}

impl BackingRecord {
    pub fn new(id: impl Into<String>, status: RecordState) -> Self {
        Self {
            id: id.into(),
            status: Some(status),
            screening_criteria: None,
            content: RecordContent::default(),
        }
    }

    pub fn criteria(&self) -> CriteriaDecisions {
        self.screening_criteria
            .as_deref()
            .map(parse_criteria_string)
            .unwrap_or_default()
    }

    /// Screen decision implied by a decided full-text status.
    pub fn screen_decision(&self) -> Option<Decision> {
        match self.status? {
            RecordState::RevIncluded => Some(Decision::Include),
            RecordState::RevExcluded => Some(Decision::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionSubmission {
    pub record_id: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub criteria_decisions: CriteriaDecisions,
}

/// Engine acknowledgement of a single decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionReceipt {
    pub record_id: String,
    pub decision: Decision,
    pub new_status: Option<RecordState>,
    pub remaining_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionChange {
    pub record_id: String,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedChange {
    pub record_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDecisionsReport {
    #[serde(default)]
    pub changes_count: u64,
    #[serde(default)]
    pub skipped: Vec<SkippedChange>,
    #[serde(default)]
    pub updated_records: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichResult {
    #[serde(alias = "id", default)]
    pub record_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichReport {
    #[serde(default)]
    pub enriched_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub records: Vec<EnrichResult>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) if !text.is_empty() => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

pub(super) fn lenient_state<'de, D>(deserializer: D) -> Result<Option<RecordState>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(RecordState::parse))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CriteriaWire {
    Map(BTreeMap<String, CriterionDefinition>),
    List(Vec<CriterionDefinition>),
}

// The engine keys criteria by name; older builds send a list with names inline.
fn criteria_definitions<'de, D>(deserializer: D) -> Result<Vec<CriterionDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    let wire = Option::<CriteriaWire>::deserialize(deserializer)?;
    Ok(match wire {
        None => Vec::new(),
        Some(CriteriaWire::List(list)) => list,
        Some(CriteriaWire::Map(map)) => map
            .into_iter()
            .map(|(name, mut definition)| {
                definition.name = name;
                definition
            })
            .collect(),
    })
}
