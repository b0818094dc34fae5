pub mod fallback;
pub mod orchestrator;
pub mod prompt;
pub mod validate;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recommendation id used when no scenario satisfies the active constraints.
pub const NO_RECOMMENDATION: &str = "none";

/// Marker the executive summary must carry when nothing is feasible.
pub const RISK_FLAG: &str = "[RISK]";

/// Suffix tagging a tradeoff dimension as a computed difference between two
/// scenarios, e.g. `cost_annual_delta` with comparison `vs balanced`.
pub const DELTA_SUFFIX: &str = "_delta";

/// Structured reply of the reasoning layer. Serialized field-for-field as the
/// public JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiResponse {
    pub recommendation: Recommendation,
    pub tradeoffs: Vec<Tradeoff>,
    pub executive_summary: String,
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub qa_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recommendation {
    pub scenario_id: String,
    pub confidence: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tradeoff {
    pub scenario_id: String,
    pub dimension: String,
    pub value: f64,
    pub comparison: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Citation {
    pub scenario_id: String,
    pub metric: String,
}

impl AiResponse {
    pub fn recommends_nothing(&self) -> bool {
        self.recommendation.scenario_id == NO_RECOMMENDATION
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Parse,
    Schema,
    UnknownScenario,
    Citation,
    Fidelity,
    Feasibility,
    Mode,
    RiskFlag,
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Parse => "parse",
            Self::Schema => "schema",
            Self::UnknownScenario => "unknown_scenario",
            Self::Citation => "citation",
            Self::Fidelity => "fidelity",
            Self::Feasibility => "feasibility",
            Self::Mode => "mode",
            Self::RiskFlag => "risk_flag",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A provider reply that broke the response contract.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("response failed validation with {} issue(s)", .0.len())]
pub struct ValidationError(pub Vec<ValidationIssue>);
