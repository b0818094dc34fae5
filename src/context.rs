use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::InputError;
use crate::forecast::validate::{check_fraction, check_non_negative};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Balanced,
    MinCost,
    MaxSla,
    RiskAverse,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    #[default]
    Recommend,
    Compare,
    Qa,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Exec,
    #[default]
    OpsManager,
    Analyst,
}

impl Objective {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::MinCost => "min_cost",
            Self::MaxSla => "max_sla",
            Self::RiskAverse => "risk_averse",
        }
    }
}

impl DecisionMode {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Recommend => "recommend",
            Self::Compare => "compare",
            Self::Qa => "qa",
        }
    }
}

impl Audience {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::OpsManager => "ops_manager",
            Self::Analyst => "analyst",
        }
    }
}

impl Display for Objective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

impl Display for DecisionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

impl Display for Audience {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ContextParseError {
    pub kind: &'static str,
    pub value: String,
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('-', "_")
}

impl FromStr for Objective {
    type Err = ContextParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "balanced" => Ok(Self::Balanced),
            "min_cost" | "cost" => Ok(Self::MinCost),
            "max_sla" | "sla" => Ok(Self::MaxSla),
            "risk_averse" | "risk" => Ok(Self::RiskAverse),
            _ => Err(ContextParseError {
                kind: "objective",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for DecisionMode {
    type Err = ContextParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "recommend" => Ok(Self::Recommend),
            "compare" => Ok(Self::Compare),
            "qa" | "question" => Ok(Self::Qa),
            _ => Err(ContextParseError {
                kind: "decision mode",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Audience {
    type Err = ContextParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "exec" | "executive" => Ok(Self::Exec),
            "ops_manager" | "ops" => Ok(Self::OpsManager),
            "analyst" => Ok(Self::Analyst),
            _ => Err(ContextParseError {
                kind: "audience",
                value: s.to_string(),
            }),
        }
    }
}

/// Wire shape of [`DecisionContext`] before its bounds are checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ContextRecord {
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub decision_mode: DecisionMode,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub min_sla_target: Option<f64>,
    #[serde(default)]
    pub max_budget_annual: Option<f64>,
    #[serde(default)]
    pub max_breach_risk: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// How the reasoning layer should frame a decision over the scenario set.
/// Constraints are bounds; `None` means unconstrained. `notes` is narrative
/// context only and never influences a number.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ContextRecord", into = "ContextRecord")]
pub struct DecisionContext {
    objective: Objective,
    decision_mode: DecisionMode,
    audience: Audience,
    min_sla_target: Option<f64>,
    max_budget_annual: Option<f64>,
    max_breach_risk: Option<f64>,
    notes: Option<String>,
}

impl DecisionContext {
    /// Unconstrained context.
    pub fn new(objective: Objective, decision_mode: DecisionMode, audience: Audience) -> Self {
        Self {
            objective,
            decision_mode,
            audience,
            ..Self::default()
        }
    }

    pub fn with_min_sla_target(mut self, value: f64) -> Result<Self, InputError> {
        self.min_sla_target = Some(check_fraction("min_sla_target", value)?);
        Ok(self)
    }

    pub fn with_max_budget_annual(mut self, value: f64) -> Result<Self, InputError> {
        self.max_budget_annual = Some(check_non_negative("max_budget_annual", value)?);
        Ok(self)
    }

    pub fn with_max_breach_risk(mut self, value: f64) -> Result<Self, InputError> {
        self.max_breach_risk = Some(check_fraction("max_breach_risk", value)?);
        Ok(self)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn decision_mode(&self) -> DecisionMode {
        self.decision_mode
    }

    pub fn audience(&self) -> Audience {
        self.audience
    }

    pub fn min_sla_target(&self) -> Option<f64> {
        self.min_sla_target
    }

    pub fn max_budget_annual(&self) -> Option<f64> {
        self.max_budget_annual
    }

    pub fn max_breach_risk(&self) -> Option<f64> {
        self.max_breach_risk
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn has_constraints(&self) -> bool {
        self.min_sla_target.is_some()
            || self.max_budget_annual.is_some()
            || self.max_breach_risk.is_some()
    }
}

impl TryFrom<ContextRecord> for DecisionContext {
    type Error = InputError;

    fn try_from(record: ContextRecord) -> Result<Self, Self::Error> {
        let mut context = Self::new(record.objective, record.decision_mode, record.audience);
        if let Some(v) = record.min_sla_target {
            context = context.with_min_sla_target(v)?;
        }
        if let Some(v) = record.max_budget_annual {
            context = context.with_max_budget_annual(v)?;
        }
        if let Some(v) = record.max_breach_risk {
            context = context.with_max_breach_risk(v)?;
        }
        context.notes = record.notes;
        Ok(context)
    }
}

impl From<DecisionContext> for ContextRecord {
    fn from(c: DecisionContext) -> Self {
        Self {
            objective: c.objective,
            decision_mode: c.decision_mode,
            audience: c.audience,
            min_sla_target: c.min_sla_target,
            max_budget_annual: c.max_budget_annual,
            max_breach_risk: c.max_breach_risk,
            notes: c.notes,
        }
    }
}
