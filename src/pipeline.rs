use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinSet};
use tracing::{info, warn};

use crate::context::DecisionContext;
use crate::error::{InputError, PipelineError};
use crate::forecast::{ForecastInputs, RawForecast, RawServiceTarget, ServiceTarget};
use crate::provider::ReasoningProvider;
use crate::reasoning::orchestrator::{ReasoningOrchestrator, ReasoningSettings, Resolution};
use crate::reasoning::{AiResponse, ValidationIssue};
use crate::scenario::feasibility::{all_infeasible, mark_feasible};
use crate::scenario::generator::generate;
use crate::scenario::{scenario_digest, OmittedVariant, PricingTable, Scenario};
use crate::staffing::{required_agents, StaffingResult};

/// Read-only settings shared by every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub base_target: ServiceTarget,
    pub pricing: PricingTable,
    pub reasoning: ReasoningSettings,
}

/// One decision run as it arrives from the CLI, a batch file or HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    pub forecast: RawForecast,
    /// Overrides the configured base target when present.
    #[serde(default)]
    pub target: Option<RawServiceTarget>,
    #[serde(default)]
    pub context: DecisionContext,
    #[serde(default)]
    pub question: Option<String>,
}

impl DecisionRequest {
    /// Parse a request body. Malformed JSON and out-of-range fields are both
    /// input errors.
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        serde_json::from_str(text).map_err(|e| InputError::new("request", e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, InputError> {
        serde_json::from_value(value).map_err(|e| InputError::new("request", e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub offered_load: f64,
    pub target: ServiceTarget,
    pub scenarios: Vec<Scenario>,
    pub omitted: Vec<OmittedVariant>,
    pub all_infeasible: bool,
    pub scenario_digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub scenarios: Vec<Scenario>,
    pub omitted: Vec<OmittedVariant>,
    pub all_infeasible: bool,
    pub scenario_digest: String,
    pub response: AiResponse,
    pub resolution: Resolution,
    pub fallback_used: bool,
    pub issues: Vec<ValidationIssue>,
}

/// One entry of a batch run; exactly one of `report` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<DecisionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct DecisionPipeline {
    config: Arc<PipelineConfig>,
    orchestrator: ReasoningOrchestrator,
}

impl DecisionPipeline {
    pub fn new(config: PipelineConfig, provider: Arc<dyn ReasoningProvider>) -> Self {
        let orchestrator = ReasoningOrchestrator::new(provider, config.reasoning);
        Self {
            config: Arc::new(config),
            orchestrator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.orchestrator.provider_name()
    }

    fn resolve_target(&self, target: Option<RawServiceTarget>) -> Result<ServiceTarget, PipelineError> {
        match target {
            Some(raw) => Ok(ServiceTarget::try_from(raw)?),
            None => Ok(self.config.base_target),
        }
    }

    /// Single Erlang C sizing, without scenarios or reasoning.
    pub fn staffing(
        &self,
        forecast: RawForecast,
        target: Option<RawServiceTarget>,
    ) -> Result<StaffingResult, PipelineError> {
        let forecast = ForecastInputs::try_from(forecast)?;
        let target = self.resolve_target(target)?;
        Ok(required_agents(&forecast, &target)?)
    }

    /// Validate, size every variant and mark feasibility. Everything a run
    /// does before the reasoning layer.
    pub fn scenarios(&self, request: &DecisionRequest) -> Result<ScenarioReport, PipelineError> {
        let forecast = ForecastInputs::try_from(request.forecast)?;
        let target = self.resolve_target(request.target)?;

        let set = generate(&forecast, &target, &self.config.pricing)?;
        let scenarios = mark_feasible(set.scenarios, &request.context);
        let nothing_feasible = all_infeasible(&scenarios);
        info!(
            scenarios = scenarios.len(),
            omitted = set.omitted.len(),
            all_infeasible = nothing_feasible,
            "scenario set ready"
        );
        Ok(ScenarioReport {
            offered_load: forecast.offered_load(),
            target,
            scenario_digest: scenario_digest(&scenarios),
            scenarios,
            omitted: set.omitted,
            all_infeasible: nothing_feasible,
        })
    }

    /// [`Self::scenarios`] on the blocking pool. The agent search grows with
    /// the offered load and must not stall the async workers.
    pub async fn evaluate(&self, request: &DecisionRequest) -> Result<ScenarioReport, PipelineError> {
        let pipeline = self.clone();
        let request = request.clone();
        task::spawn_blocking(move || pipeline.scenarios(&request))
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))?
    }

    /// Full run: scenarios, then exactly one validated or fallback response.
    pub async fn run(&self, request: &DecisionRequest) -> Result<DecisionReport, PipelineError> {
        let evaluated = self.evaluate(request).await?;
        let outcome = self
            .orchestrator
            .orchestrate(
                &request.context,
                &evaluated.scenarios,
                request.question.as_deref(),
            )
            .await?;
        let fallback_used = outcome.fallback_used();
        info!(
            provider = %outcome.provider,
            recommendation = %outcome.response.recommendation.scenario_id,
            fallback_used,
            "decision complete"
        );
        Ok(DecisionReport {
            generated_at: Utc::now(),
            provider: outcome.provider,
            scenarios: evaluated.scenarios,
            omitted: evaluated.omitted,
            all_infeasible: evaluated.all_infeasible,
            scenario_digest: evaluated.scenario_digest,
            response: outcome.response,
            resolution: outcome.resolution,
            fallback_used,
            issues: outcome.issues,
        })
    }

    /// Run every request on its own task. A request that fails to parse or
    /// run is reported in place; the others are unaffected.
    pub async fn run_batch(&self, requests: Vec<serde_json::Value>) -> Vec<BatchItem> {
        let total = requests.len();
        let mut tasks = JoinSet::new();
        for (index, raw) in requests.into_iter().enumerate() {
            let pipeline = self.clone();
            tasks.spawn(async move {
                let result = match DecisionRequest::from_value(raw) {
                    Ok(request) => pipeline.run(&request).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                (index, result)
            });
        }

        let mut items = Vec::with_capacity(total);
        let mut aborted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(report))) => items.push(BatchItem {
                    index,
                    report: Some(report),
                    error: None,
                }),
                Ok((index, Err(error))) => {
                    warn!(index, "batch request failed: {error}");
                    items.push(BatchItem {
                        index,
                        report: None,
                        error: Some(error),
                    });
                }
                Err(join_error) => {
                    warn!("batch task aborted: {join_error}");
                    aborted.push(join_error.to_string());
                }
            }
        }

        // An aborted task takes its index with it; report every gap.
        if !aborted.is_empty() {
            let reported: HashSet<usize> = items.iter().map(|item| item.index).collect();
            let reason = format!("request task failed: {}", aborted.join("; "));
            for index in (0..total).filter(|i| !reported.contains(i)) {
                items.push(BatchItem {
                    index,
                    report: None,
                    error: Some(reason.clone()),
                });
            }
        }
        items.sort_by_key(|item| item.index);
        items
    }
}
