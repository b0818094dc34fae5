pub mod feasibility;
pub mod generator;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{ensure_range, InputError};
use crate::forecast::validate::{check_fraction, check_non_negative};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioVariant {
    CostMinimized,
    SlaProtected,
    Balanced,
    RiskAverse,
}

impl ScenarioVariant {
    pub const ALL: [ScenarioVariant; 4] = [
        ScenarioVariant::CostMinimized,
        ScenarioVariant::SlaProtected,
        ScenarioVariant::Balanced,
        ScenarioVariant::RiskAverse,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::CostMinimized => "cost_minimized",
            Self::SlaProtected => "sla_protected",
            Self::Balanced => "balanced",
            Self::RiskAverse => "risk_averse",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CostMinimized => "Cost-Minimized",
            Self::SlaProtected => "SLA-Protected",
            Self::Balanced => "Balanced",
            Self::RiskAverse => "Risk-Averse",
        }
    }
}

impl Display for ScenarioVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Fields of a [`Scenario`] that a response may cite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioField {
    ScenarioId,
    Name,
    FteRequired,
    CostAnnual,
    ExpectedSla,
    BreachRisk,
    OccupancyPeak,
    Feasible,
}

impl ScenarioField {
    pub const NUMERIC: [ScenarioField; 5] = [
        ScenarioField::FteRequired,
        ScenarioField::CostAnnual,
        ScenarioField::ExpectedSla,
        ScenarioField::BreachRisk,
        ScenarioField::OccupancyPeak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScenarioId => "scenario_id",
            Self::Name => "name",
            Self::FteRequired => "fte_required",
            Self::CostAnnual => "cost_annual",
            Self::ExpectedSla => "expected_sla",
            Self::BreachRisk => "breach_risk",
            Self::OccupancyPeak => "occupancy_peak",
            Self::Feasible => "feasible",
        }
    }

    pub fn is_numeric(&self) -> bool {
        Self::NUMERIC.contains(self)
    }
}

impl Display for ScenarioField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown scenario field: {0}")]
pub struct ScenarioFieldParseError(pub String);

impl FromStr for ScenarioField {
    type Err = ScenarioFieldParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scenario_id" => Ok(Self::ScenarioId),
            "name" => Ok(Self::Name),
            "fte_required" => Ok(Self::FteRequired),
            "cost_annual" => Ok(Self::CostAnnual),
            "expected_sla" => Ok(Self::ExpectedSla),
            "breach_risk" => Ok(Self::BreachRisk),
            "occupancy_peak" => Ok(Self::OccupancyPeak),
            "feasible" => Ok(Self::Feasible),
            _ => Err(ScenarioFieldParseError(s.to_string())),
        }
    }
}

/// One staffing option with its engine-computed metrics. Every instance has
/// passed the range checks in [`Scenario::new`]; JSON input goes through the
/// same constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScenarioRecord", into = "ScenarioRecord")]
pub struct Scenario {
    scenario_id: String,
    name: String,
    fte_required: f64,
    cost_annual: f64,
    expected_sla: f64,
    breach_risk: f64,
    occupancy_peak: Option<f64>,
    feasible: bool,
    agents_on_queue: Option<u32>,
    target_sla: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioRecord {
    pub scenario_id: String,
    pub name: String,
    pub fte_required: f64,
    pub cost_annual: f64,
    pub expected_sla: f64,
    pub breach_risk: f64,
    #[serde(default)]
    pub occupancy_peak: Option<f64>,
    #[serde(default)]
    pub feasible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_on_queue: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sla: Option<f64>,
}

impl Scenario {
    pub fn new(
        scenario_id: impl Into<String>,
        name: impl Into<String>,
        fte_required: f64,
        cost_annual: f64,
        expected_sla: f64,
        breach_risk: f64,
        occupancy_peak: Option<f64>,
    ) -> Result<Self, InputError> {
        let scenario_id = scenario_id.into();
        if scenario_id.trim().is_empty() {
            return Err(InputError::new("scenario_id", "must not be empty"));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InputError::new("name", "must not be empty"));
        }
        Ok(Self {
            scenario_id,
            name,
            fte_required: check_non_negative("fte_required", fte_required)?,
            cost_annual: check_non_negative("cost_annual", cost_annual)?,
            expected_sla: check_fraction("expected_sla", expected_sla)?,
            breach_risk: check_fraction("breach_risk", breach_risk)?,
            occupancy_peak: occupancy_peak
                .map(|v| check_fraction("occupancy_peak", v))
                .transpose()?,
            feasible: false,
            agents_on_queue: None,
            target_sla: None,
        })
    }

    /// Record how the engine sized this scenario.
    pub fn with_sizing(mut self, agents_on_queue: u32, target_sla: f64) -> Result<Self, InputError> {
        self.target_sla = Some(ensure_range("target_sla", target_sla, 0.0, 1.0)?);
        self.agents_on_queue = Some(agents_on_queue);
        Ok(self)
    }

    /// Copy limited to the citable fields; drops the engine's sizing detail.
    pub fn citable(&self) -> Self {
        Self {
            agents_on_queue: None,
            target_sla: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_feasible(mut self, feasible: bool) -> Self {
        self.feasible = feasible;
        self
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fte_required(&self) -> f64 {
        self.fte_required
    }

    pub fn cost_annual(&self) -> f64 {
        self.cost_annual
    }

    pub fn expected_sla(&self) -> f64 {
        self.expected_sla
    }

    pub fn breach_risk(&self) -> f64 {
        self.breach_risk
    }

    pub fn occupancy_peak(&self) -> Option<f64> {
        self.occupancy_peak
    }

    pub fn feasible(&self) -> bool {
        self.feasible
    }

    pub fn agents_on_queue(&self) -> Option<u32> {
        self.agents_on_queue
    }

    pub fn target_sla(&self) -> Option<f64> {
        self.target_sla
    }

    /// Value of a numeric field, `None` for text fields or an absent
    /// occupancy.
    pub fn metric(&self, field: ScenarioField) -> Option<f64> {
        match field {
            ScenarioField::FteRequired => Some(self.fte_required),
            ScenarioField::CostAnnual => Some(self.cost_annual),
            ScenarioField::ExpectedSla => Some(self.expected_sla),
            ScenarioField::BreachRisk => Some(self.breach_risk),
            ScenarioField::OccupancyPeak => self.occupancy_peak,
            ScenarioField::ScenarioId | ScenarioField::Name | ScenarioField::Feasible => None,
        }
    }
}

impl TryFrom<ScenarioRecord> for Scenario {
    type Error = InputError;

    fn try_from(record: ScenarioRecord) -> Result<Self, Self::Error> {
        let mut scenario = Scenario::new(
            record.scenario_id,
            record.name,
            record.fte_required,
            record.cost_annual,
            record.expected_sla,
            record.breach_risk,
            record.occupancy_peak,
        )?
        .with_feasible(record.feasible);
        if let Some(target) = record.target_sla {
            scenario.target_sla = Some(ensure_range("target_sla", target, 0.0, 1.0)?);
        }
        scenario.agents_on_queue = record.agents_on_queue;
        Ok(scenario)
    }
}

impl From<Scenario> for ScenarioRecord {
    fn from(s: Scenario) -> Self {
        Self {
            scenario_id: s.scenario_id,
            name: s.name,
            fte_required: s.fte_required,
            cost_annual: s.cost_annual,
            expected_sla: s.expected_sla,
            breach_risk: s.breach_risk,
            occupancy_peak: s.occupancy_peak,
            feasible: s.feasible,
            agents_on_queue: s.agents_on_queue,
            target_sla: s.target_sla,
        }
    }
}

pub const DEFAULT_COST_PER_AGENT_ANNUAL: f64 = 55_000.0;

/// Loaded once per process and shared read-only between runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingTable {
    cost_per_agent_annual: f64,
}

impl PricingTable {
    pub fn new(cost_per_agent_annual: f64) -> Result<Self, InputError> {
        Ok(Self {
            cost_per_agent_annual: check_non_negative("cost_per_agent_annual", cost_per_agent_annual)?,
        })
    }

    pub fn cost_per_agent_annual(&self) -> f64 {
        self.cost_per_agent_annual
    }

    pub fn annual_cost(&self, fte: f64) -> f64 {
        fte * self.cost_per_agent_annual
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            cost_per_agent_annual: DEFAULT_COST_PER_AGENT_ANNUAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmittedVariant {
    pub variant: ScenarioVariant,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub omitted: Vec<OmittedVariant>,
}

impl ScenarioSet {
    pub fn by_id(&self, scenario_id: &str) -> Option<&Scenario> {
        find_scenario(&self.scenarios, scenario_id)
    }

    /// SHA-256 over the canonical JSON of the scenarios, for audit trails and
    /// determinism checks.
    pub fn digest(&self) -> String {
        scenario_digest(&self.scenarios)
    }
}

pub fn find_scenario<'a>(scenarios: &'a [Scenario], scenario_id: &str) -> Option<&'a Scenario> {
    scenarios.iter().find(|s| s.scenario_id() == scenario_id)
}

pub fn scenario_digest(scenarios: &[Scenario]) -> String {
    let canonical = serde_json::to_string(scenarios).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
