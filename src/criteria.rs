//! Aggregate screening decisions from named inclusion/exclusion criteria.
//!
//! Each criterion is marked `in`, `out`, or `TODO` per record. The wire values
//! read differently per kind:
//!
//! | kind      | `in`            | `out`                  |
//! |-----------|-----------------|------------------------|
//! | inclusion | met             | not met (record out)   |
//! | exclusion | does not apply  | applies (record out)   |
//!
//! so in both cases `out` means "this criterion takes the record out".
use crate::queue::Decision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-record decisions keyed by criterion name.
pub type CriteriaDecisions = BTreeMap<String, CriterionDecision>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriterionKind {
    #[serde(rename = "inclusion_criterion")]
    Inclusion,
    #[serde(rename = "exclusion_criterion")]
    Exclusion,
}

impl CriterionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionKind::Inclusion => "inclusion_criterion",
            CriterionKind::Exclusion => "exclusion_criterion",
        }
    }
}

/// A configured screening criterion. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "criterion_type")]
    pub kind: CriterionKind,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl CriterionDefinition {
    pub fn new(name: impl Into<String>, kind: CriterionKind, explanation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            explanation: explanation.into(),
            comment: None,
        }
    }

    /// Whether `decision` takes the record out; `None` while undetermined.
    pub fn excludes(&self, decision: CriterionDecision) -> Option<bool> {
        match (self.kind, decision) {
            (_, CriterionDecision::Undetermined) => None,
            (CriterionKind::Inclusion, CriterionDecision::In) => Some(false),
            (CriterionKind::Inclusion, CriterionDecision::Out) => Some(true),
            (CriterionKind::Exclusion, CriterionDecision::In) => Some(false),
            (CriterionKind::Exclusion, CriterionDecision::Out) => Some(true),
        }
    }

    /// Reading of `decision` for this criterion's kind.
    pub fn label(&self, decision: CriterionDecision) -> &'static str {
        match (self.kind, decision) {
            (_, CriterionDecision::Undetermined) => "undecided",
            (CriterionKind::Inclusion, CriterionDecision::In) => "met",
            (CriterionKind::Inclusion, CriterionDecision::Out) => "not met",
            (CriterionKind::Exclusion, CriterionDecision::In) => "does not apply",
            (CriterionKind::Exclusion, CriterionDecision::Out) => "applies",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriterionDecision {
    #[serde(rename = "in")]
    In,
    #[serde(rename = "out")]
    Out,
    #[default]
    #[serde(rename = "TODO", alias = "todo")]
    Undetermined,
}

impl CriterionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionDecision::In => "in",
            CriterionDecision::Out => "out",
            CriterionDecision::Undetermined => "TODO",
        }
    }

    /// Unrecognized values read as undetermined.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "in" => CriterionDecision::In,
            "out" => CriterionDecision::Out,
            _ => CriterionDecision::Undetermined,
        }
    }

    /// `TODO -> in -> out -> TODO`.
    pub fn toggled(self) -> Self {
        match self {
            CriterionDecision::Undetermined => CriterionDecision::In,
            CriterionDecision::In => CriterionDecision::Out,
            CriterionDecision::Out => CriterionDecision::Undetermined,
        }
    }
}

impl fmt::Display for CriterionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaOutcome {
    Include,
    Exclude,
    Undetermined,
}

impl CriteriaOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaOutcome::Include => "include",
            CriteriaOutcome::Exclude => "exclude",
            CriteriaOutcome::Undetermined => "undetermined",
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            CriteriaOutcome::Include => Some(Decision::Include),
            CriteriaOutcome::Exclude => Some(Decision::Exclude),
            CriteriaOutcome::Undetermined => None,
        }
    }
}

impl fmt::Display for CriteriaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate decision for one record.
///
/// Undetermined while any configured criterion is `TODO` or unmarked; then
/// exclude if any criterion takes the record out; include otherwise. An
/// empty criteria set resolves to include.
pub fn resolve(criteria: &[CriterionDefinition], decisions: &CriteriaDecisions) -> CriteriaOutcome {
    let mut excluded = false;
    for criterion in criteria {
        let decision = decisions
            .get(&criterion.name)
            .copied()
            .unwrap_or_default();
        match criterion.excludes(decision) {
            None => return CriteriaOutcome::Undetermined,
            Some(true) => excluded = true,
            Some(false) => {}
        }
    }
    if excluded {
        CriteriaOutcome::Exclude
    } else {
        CriteriaOutcome::Include
    }
}

/// Parse the engine's `name=in;name=out;name=TODO` record field.
pub fn parse_criteria_string(value: &str) -> CriteriaDecisions {
    value
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(name, decision)| (name.trim().to_string(), CriterionDecision::parse(decision)))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

pub fn format_criteria_string(decisions: &CriteriaDecisions) -> String {
    decisions
        .iter()
        .map(|(name, decision)| format!("{name}={decision}"))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
#[path = "criteria_tests.rs"]
mod tests;
