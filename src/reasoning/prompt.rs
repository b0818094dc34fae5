use serde::{Deserialize, Serialize};

use crate::context::{Audience, DecisionContext, DecisionMode};
use crate::reasoning::{ValidationIssue, DELTA_SUFFIX, NO_RECOMMENDATION, RISK_FLAG};
use crate::scenario::feasibility::all_infeasible;
use crate::scenario::Scenario;

pub const SYSTEM_PROMPT: &str = "You are a workforce-planning decision support assistant.

RULES:
- Use ONLY the scenario data and decision context in the PAYLOAD.
- Do NOT compute new staffing, SLA, cost, savings or probability figures.
- Every number you state must be copied from a scenario field. A difference between two \
scenarios is allowed only as a tradeoff whose dimension ends in \"_delta\" and whose \
comparison reads \"vs <scenario_id>\".
- Do NOT invent scenarios, constraints or metrics.
- Cite the scenario_id and field behind every claim.

OUTPUT:
Return ONLY one JSON object matching the output_contract. No markdown. No extra text.";

/// Description of the reply shape, embedded in every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputContract {
    pub shape: String,
    pub citation_metrics: Vec<String>,
    pub tradeoff_rule: String,
    pub feasibility_rule: String,
    pub qa_rule: String,
}

impl OutputContract {
    pub fn describe() -> Self {
        Self {
            shape: "{\"recommendation\": {\"scenario_id\", \"confidence\" (0..1), \"rationale\"}, \
                    \"tradeoffs\": [{\"scenario_id\", \"dimension\", \"value\", \"comparison\"}], \
                    \"executive_summary\", \"citations\": [{\"scenario_id\", \"metric\"}], \
                    \"qa_answer\": string or null}"
                .to_string(),
            citation_metrics: [
                "scenario_id",
                "name",
                "fte_required",
                "cost_annual",
                "expected_sla",
                "breach_risk",
                "occupancy_peak",
                "feasible",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            tradeoff_rule: format!(
                "dimension is a numeric scenario field and value equals that field exactly, \
                 or dimension is <field>{DELTA_SUFFIX} with comparison \"vs <scenario_id>\" and \
                 value equals this scenario's field minus that scenario's field"
            ),
            feasibility_rule: format!(
                "recommend a feasible scenario; when all_infeasible is true set \
                 recommendation.scenario_id to \"{NO_RECOMMENDATION}\" and start \
                 executive_summary with {RISK_FLAG}"
            ),
            qa_rule: "qa_answer is a non-empty string in qa mode and null otherwise".to_string(),
        }
    }
}

/// The only facts a provider may reason over. Raw forecast inputs and
/// sizing detail the provider may not cite are never included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPayload {
    pub decision_context: DecisionContext,
    pub scenarios: Vec<Scenario>,
    pub all_infeasible: bool,
    pub user_question: Option<String>,
    pub output_contract: OutputContract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub payload: PromptPayload,
}

pub fn mode_instruction(context: &DecisionContext) -> String {
    let task = match context.decision_mode() {
        DecisionMode::Recommend => {
            "TASK: Recommend the best scenario for the objective. Discard infeasible scenarios \
             first, then rank the rest."
        }
        DecisionMode::Compare => {
            "TASK: Compare the scenarios and pick the top two contenders. Cover the cost, SLA \
             and risk tradeoffs between them."
        }
        DecisionMode::Qa => {
            "TASK: Answer the user_question from the scenario table only. If it needs the \
             engine to be rerun with different inputs, say so in qa_answer."
        }
    };
    let audience = match context.audience() {
        Audience::Exec => "Write the executive_summary for an executive: outcome first, brief.",
        Audience::OpsManager => {
            "Write the executive_summary for an operations manager: staffing impact and risk."
        }
        Audience::Analyst => {
            "Write the executive_summary for an analyst: name the metrics behind the ranking."
        }
    };
    format!(
        "{task}\nObjective: {}.\n{audience}",
        context.objective().as_slug()
    )
}

pub fn build_payload(
    context: &DecisionContext,
    scenarios: &[Scenario],
    question: Option<&str>,
) -> PromptPayload {
    PromptPayload {
        decision_context: context.clone(),
        scenarios: scenarios.iter().map(Scenario::citable).collect(),
        all_infeasible: all_infeasible(scenarios),
        user_question: question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        output_contract: OutputContract::describe(),
    }
}

fn render_payload(payload: &PromptPayload) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_default()
}

pub fn build_prompt(
    context: &DecisionContext,
    scenarios: &[Scenario],
    question: Option<&str>,
) -> Prompt {
    let payload = build_payload(context, scenarios, question);
    let user = format!(
        "{}\n\nPAYLOAD:\n{}",
        mode_instruction(context),
        render_payload(&payload)
    );
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        payload,
    }
}

/// Follow-up prompt after a rejected reply: every issue, the unchanged
/// payload, and the reply that was rejected.
pub fn build_correction_prompt(
    payload: &PromptPayload,
    prior_output: &str,
    issues: &[ValidationIssue],
) -> Prompt {
    let listed: Vec<String> = issues.iter().map(|issue| format!("- {issue}")).collect();
    let user = format!(
        "{}\n\nYour previous output failed validation:\n{}\n\nReturn a corrected JSON object. \
         Use only the PAYLOAD below.\n\nPAYLOAD:\n{}\n\nPREVIOUS OUTPUT:\n{}",
        mode_instruction(&payload.decision_context),
        listed.join("\n"),
        render_payload(payload),
        prior_output
    );
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
        payload: payload.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_correction_prompt, build_prompt};
    use crate::context::{Audience, DecisionContext, DecisionMode, Objective};
    use crate::reasoning::{IssueKind, ValidationIssue};
    use crate::scenario::feasibility::mark_feasible;
    use crate::scenario::Scenario;

    fn scenarios(ctx: &DecisionContext) -> Vec<Scenario> {
        mark_feasible(
            vec![Scenario::new("balanced", "Balanced", 29.0, 1_450_000.0, 0.8264, 0.1736, None)
                .expect("valid")],
            ctx,
        )
    }

    #[test]
    fn payload_carries_context_scenarios_and_question_only() {
        let ctx = DecisionContext::new(Objective::Balanced, DecisionMode::Qa, Audience::OpsManager)
            .with_max_budget_annual(1_000_000.0)
            .expect("budget");
        let prompt = build_prompt(&ctx, &scenarios(&ctx), Some("  what if we cut cost? "));
        assert!(prompt.payload.all_infeasible);
        assert_eq!(
            prompt.payload.user_question.as_deref(),
            Some("what if we cut cost?")
        );
        assert!(prompt.user.contains("\"scenario_id\": \"balanced\""));
        assert!(prompt.user.contains("user_question"));
        assert!(!prompt.user.contains("\"volume\""));
        assert!(prompt.user.starts_with("TASK: Answer"));
    }

    #[test]
    fn payload_only_shows_citable_fields() {
        let ctx = DecisionContext::default();
        let sized = Scenario::new("balanced", "Balanced", 29.0, 1_450_000.0, 0.8264, 0.1736, None)
            .expect("valid")
            .with_sizing(20, 0.8)
            .expect("sizing");
        let prompt = build_prompt(&ctx, &mark_feasible(vec![sized], &ctx), None);
        assert!(!prompt.user.contains("agents_on_queue"));
        assert!(!prompt.user.contains("target_sla"));
        assert_eq!(prompt.payload.scenarios[0].agents_on_queue(), None);
        assert_eq!(prompt.payload.scenarios[0].cost_annual(), 1_450_000.0);
    }

    #[test]
    fn blank_question_is_dropped() {
        let ctx = DecisionContext::default();
        let prompt = build_prompt(&ctx, &scenarios(&ctx), Some("   "));
        assert_eq!(prompt.payload.user_question, None);
        assert!(!prompt.payload.all_infeasible);
    }

    #[test]
    fn correction_prompt_lists_each_issue_and_the_prior_reply() {
        let ctx = DecisionContext::default();
        let first = build_prompt(&ctx, &scenarios(&ctx), None);
        let issues = vec![
            ValidationIssue::new(IssueKind::Fidelity, "tradeoffs[0] drifted"),
            ValidationIssue::new(IssueKind::Citation, "at least one citation is required"),
        ];
        let retry = build_correction_prompt(&first.payload, "{\"bad\": true}", &issues);
        assert!(retry.user.contains("- fidelity: tradeoffs[0] drifted"));
        assert!(retry.user.contains("- citation: at least one citation is required"));
        assert!(retry.user.contains("{\"bad\": true}"));
        assert!(retry.user.contains("\"scenario_id\": \"balanced\""));
        assert_eq!(retry.payload, first.payload);
        assert_eq!(retry.system, first.system);
    }
}
