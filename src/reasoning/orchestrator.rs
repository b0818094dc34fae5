use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::context::DecisionContext;
use crate::error::InputError;
use crate::provider::ReasoningProvider;
use crate::reasoning::fallback::synthesize;
use crate::reasoning::prompt::{build_correction_prompt, build_prompt, Prompt};
use crate::reasoning::validate::validate_reply;
use crate::reasoning::{AiResponse, ValidationError, ValidationIssue};
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasoningSettings {
    pub timeout: Duration,
    /// Correction rounds after the first call; total calls are `1 + max_retries`.
    pub max_retries: u32,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    ProviderError { message: String },
    Timeout { secs: u64 },
    RetriesExhausted,
}

impl Display for FallbackReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProviderError { message } => write!(f, "provider error: {message}"),
            Self::Timeout { secs } => write!(f, "provider timed out after {secs}s"),
            Self::RetriesExhausted => write!(f, "replies kept failing validation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Accepted { attempts: u32 },
    Fallback { reason: FallbackReason, attempts: u32 },
}

impl Resolution {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Accepted { attempts } | Self::Fallback { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOutcome {
    pub response: AiResponse,
    pub resolution: Resolution,
    /// Every validation issue seen across attempts, oldest first.
    pub issues: Vec<ValidationIssue>,
    pub provider: String,
}

impl ReasoningOutcome {
    pub fn fallback_used(&self) -> bool {
        matches!(self.resolution, Resolution::Fallback { .. })
    }
}

enum Stage {
    BuildPrompt,
    CallProvider(Prompt),
    Validate { prompt: Prompt, reply: String },
    Retry { prompt: Prompt, reply: String, issues: Vec<ValidationIssue> },
    Accept(AiResponse),
    Fallback(FallbackReason),
}

#[derive(Clone)]
pub struct ReasoningOrchestrator {
    provider: Arc<dyn ReasoningProvider>,
    settings: ReasoningSettings,
}

impl ReasoningOrchestrator {
    pub fn new(provider: Arc<dyn ReasoningProvider>, settings: ReasoningSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Produce exactly one contract-valid response for the scenario set.
    /// Provider failures never escape; only malformed input does.
    pub async fn orchestrate(
        &self,
        context: &DecisionContext,
        scenarios: &[Scenario],
        question: Option<&str>,
    ) -> Result<ReasoningOutcome, InputError> {
        check_scenarios(scenarios)?;

        let mut stage = Stage::BuildPrompt;
        let mut attempts = 0u32;
        let mut issues_seen = Vec::new();

        loop {
            stage = match stage {
                Stage::BuildPrompt => Stage::CallProvider(build_prompt(context, scenarios, question)),
                Stage::CallProvider(prompt) => {
                    attempts += 1;
                    debug!(provider = self.provider.name(), attempt = attempts, "calling provider");
                    match timeout(self.settings.timeout, self.provider.generate(&prompt, context))
                        .await
                    {
                        Ok(Ok(reply)) => Stage::Validate { prompt, reply },
                        Ok(Err(err)) => {
                            warn!(provider = self.provider.name(), "provider failed: {err}");
                            Stage::Fallback(FallbackReason::ProviderError {
                                message: err.to_string(),
                            })
                        }
                        Err(_) => {
                            warn!(provider = self.provider.name(), "provider call timed out");
                            Stage::Fallback(FallbackReason::Timeout {
                                secs: self.settings.timeout.as_secs(),
                            })
                        }
                    }
                }
                Stage::Validate { prompt, reply } => {
                    match validate_reply(&reply, scenarios, context) {
                        Ok(response) => Stage::Accept(response),
                        Err(ValidationError(issues)) => {
                            warn!(
                                attempt = attempts,
                                issues = issues.len(),
                                "provider reply failed validation"
                            );
                            issues_seen.extend(issues.iter().cloned());
                            if attempts <= self.settings.max_retries {
                                Stage::Retry {
                                    prompt,
                                    reply,
                                    issues,
                                }
                            } else {
                                Stage::Fallback(FallbackReason::RetriesExhausted)
                            }
                        }
                    }
                }
                Stage::Retry {
                    prompt,
                    reply,
                    issues,
                } => Stage::CallProvider(build_correction_prompt(&prompt.payload, &reply, &issues)),
                Stage::Accept(response) => {
                    info!(provider = self.provider.name(), attempts, "provider reply accepted");
                    return Ok(ReasoningOutcome {
                        response,
                        resolution: Resolution::Accepted { attempts },
                        issues: issues_seen,
                        provider: self.provider.name().to_string(),
                    });
                }
                Stage::Fallback(reason) => {
                    info!(provider = self.provider.name(), attempts, "using fallback: {reason}");
                    return Ok(ReasoningOutcome {
                        response: synthesize(context, scenarios, question),
                        resolution: Resolution::Fallback { reason, attempts },
                        issues: issues_seen,
                        provider: self.provider.name().to_string(),
                    });
                }
            };
        }
    }
}

fn check_scenarios(scenarios: &[Scenario]) -> Result<(), InputError> {
    if scenarios.is_empty() {
        return Err(InputError::new("scenarios", "must not be empty"));
    }
    let mut seen = HashSet::new();
    for scenario in scenarios {
        if !seen.insert(scenario.scenario_id()) {
            return Err(InputError::new(
                "scenario_id",
                format!("duplicate id '{}'", scenario.scenario_id()),
            ));
        }
    }
    Ok(())
}
