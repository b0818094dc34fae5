use std::str::FromStr;

use serde_json::error::Category;

use crate::context::{DecisionContext, DecisionMode};
use crate::reasoning::{
    AiResponse, IssueKind, Tradeoff, ValidationError, ValidationIssue, DELTA_SUFFIX,
    NO_RECOMMENDATION, RISK_FLAG,
};
use crate::scenario::feasibility::all_infeasible;
use crate::scenario::{find_scenario, Scenario, ScenarioField};

/// Relative tolerance for numbers quoted from a scenario.
pub const FIDELITY_TOLERANCE: f64 = 1e-6;

pub fn values_match(claimed: f64, actual: f64) -> bool {
    claimed.is_finite() && (claimed - actual).abs() <= FIDELITY_TOLERANCE * actual.abs().max(1.0)
}

/// What a tradeoff entry claims to quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeoffDimension {
    Metric(ScenarioField),
    Delta(ScenarioField),
}

impl TradeoffDimension {
    pub fn parse(dimension: &str) -> Option<Self> {
        let dimension = dimension.trim();
        let (field, delta) = match dimension.strip_suffix(DELTA_SUFFIX) {
            Some(base) => (base, true),
            None => (dimension, false),
        };
        let field = ScenarioField::from_str(field).ok().filter(ScenarioField::is_numeric)?;
        Some(if delta {
            Self::Delta(field)
        } else {
            Self::Metric(field)
        })
    }
}

/// Scenario id a delta tradeoff is measured against: `vs <scenario_id>`.
pub fn delta_reference(comparison: &str) -> Option<&str> {
    comparison
        .trim()
        .strip_prefix("vs ")
        .and_then(|rest| rest.split_whitespace().next())
}

/// Providers must return a bare JSON object; prose or markdown fences around
/// it are a contract violation, not something to repair.
pub fn parse_strict(text: &str) -> Result<AiResponse, ValidationIssue> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return Err(ValidationIssue::new(
            IssueKind::Parse,
            "reply is not a pure JSON object",
        ));
    }
    serde_json::from_str(trimmed).map_err(|err| {
        let kind = match err.classify() {
            Category::Data => IssueKind::Schema,
            Category::Syntax | Category::Eof | Category::Io => IssueKind::Parse,
        };
        ValidationIssue::new(kind, err.to_string())
    })
}

/// Parse and check a raw provider reply against the contract for this run.
pub fn validate_reply(
    text: &str,
    scenarios: &[Scenario],
    context: &DecisionContext,
) -> Result<AiResponse, ValidationError> {
    let response = parse_strict(text).map_err(|issue| ValidationError(vec![issue]))?;
    let issues = check_response(&response, scenarios, context);
    if issues.is_empty() {
        Ok(response)
    } else {
        Err(ValidationError(issues))
    }
}

/// Every contract violation in an already-parsed response.
pub fn check_response(
    response: &AiResponse,
    scenarios: &[Scenario],
    context: &DecisionContext,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_structure(response, &mut issues);
    check_recommendation(response, scenarios, &mut issues);
    check_citations(response, scenarios, &mut issues);
    for (idx, tradeoff) in response.tradeoffs.iter().enumerate() {
        check_tradeoff(idx, tradeoff, scenarios, &mut issues);
    }
    check_mode(response, context, &mut issues);
    issues
}

fn check_structure(response: &AiResponse, issues: &mut Vec<ValidationIssue>) {
    let confidence = response.recommendation.confidence;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        issues.push(ValidationIssue::new(
            IssueKind::Schema,
            format!("recommendation.confidence must be within [0, 1], got {confidence}"),
        ));
    }
    if response.recommendation.rationale.trim().is_empty() {
        issues.push(ValidationIssue::new(
            IssueKind::Schema,
            "recommendation.rationale must not be empty",
        ));
    }
    if response.executive_summary.trim().is_empty() {
        issues.push(ValidationIssue::new(
            IssueKind::Schema,
            "executive_summary must not be empty",
        ));
    }
}

fn check_recommendation(
    response: &AiResponse,
    scenarios: &[Scenario],
    issues: &mut Vec<ValidationIssue>,
) {
    let nothing_feasible = all_infeasible(scenarios);
    let recommended = response.recommendation.scenario_id.as_str();

    if nothing_feasible {
        if recommended != NO_RECOMMENDATION {
            issues.push(ValidationIssue::new(
                IssueKind::Feasibility,
                format!(
                    "no scenario satisfies the constraints; recommendation.scenario_id must be \
                     \"{NO_RECOMMENDATION}\", got '{recommended}'"
                ),
            ));
        }
        if !response.executive_summary.contains(RISK_FLAG) {
            issues.push(ValidationIssue::new(
                IssueKind::RiskFlag,
                format!("executive_summary must contain {RISK_FLAG} when no scenario is feasible"),
            ));
        }
        if !cites_engine_numbers(response, scenarios) {
            issues.push(ValidationIssue::new(
                IssueKind::Citation,
                "no scenario is feasible; at least one citation must name a numeric metric the \
                 scenario reports",
            ));
        }
        return;
    }

    if recommended == NO_RECOMMENDATION {
        issues.push(ValidationIssue::new(
            IssueKind::Feasibility,
            "feasible scenarios exist; recommendation must name one of them",
        ));
        return;
    }
    match find_scenario(scenarios, recommended) {
        None => issues.push(ValidationIssue::new(
            IssueKind::UnknownScenario,
            format!("recommendation.scenario_id '{recommended}' not found in scenarios"),
        )),
        Some(s) if !s.feasible() => issues.push(ValidationIssue::new(
            IssueKind::Feasibility,
            format!("recommendation.scenario_id '{recommended}' is infeasible"),
        )),
        Some(_) => {}
    }
}

/// True when some citation points at a number the engine produced, so an
/// all-infeasible narrative stays anchored to real figures.
fn cites_engine_numbers(response: &AiResponse, scenarios: &[Scenario]) -> bool {
    response.citations.iter().any(|citation| {
        let Some(scenario) = find_scenario(scenarios, &citation.scenario_id) else {
            return false;
        };
        ScenarioField::from_str(&citation.metric)
            .ok()
            .filter(ScenarioField::is_numeric)
            .and_then(|field| scenario.metric(field))
            .is_some()
    })
}

fn check_citations(response: &AiResponse, scenarios: &[Scenario], issues: &mut Vec<ValidationIssue>) {
    if response.citations.is_empty() {
        issues.push(ValidationIssue::new(
            IssueKind::Citation,
            "at least one citation is required",
        ));
    }
    for (idx, citation) in response.citations.iter().enumerate() {
        if find_scenario(scenarios, &citation.scenario_id).is_none() {
            issues.push(ValidationIssue::new(
                IssueKind::UnknownScenario,
                format!(
                    "citations[{idx}].scenario_id '{}' not found in scenarios",
                    citation.scenario_id
                ),
            ));
        }
        if ScenarioField::from_str(&citation.metric).is_err() {
            issues.push(ValidationIssue::new(
                IssueKind::Citation,
                format!("citations[{idx}].metric '{}' is not a scenario field", citation.metric),
            ));
        }
    }
}

fn check_tradeoff(
    idx: usize,
    tradeoff: &Tradeoff,
    scenarios: &[Scenario],
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(scenario) = find_scenario(scenarios, &tradeoff.scenario_id) else {
        issues.push(ValidationIssue::new(
            IssueKind::UnknownScenario,
            format!(
                "tradeoffs[{idx}].scenario_id '{}' not found in scenarios",
                tradeoff.scenario_id
            ),
        ));
        return;
    };
    let Some(dimension) = TradeoffDimension::parse(&tradeoff.dimension) else {
        issues.push(ValidationIssue::new(
            IssueKind::Fidelity,
            format!(
                "tradeoffs[{idx}].dimension '{}' is not a numeric scenario field",
                tradeoff.dimension
            ),
        ));
        return;
    };

    let expected = match dimension {
        TradeoffDimension::Metric(field) => scenario.metric(field),
        TradeoffDimension::Delta(field) => {
            let Some(other_id) = delta_reference(&tradeoff.comparison) else {
                issues.push(ValidationIssue::new(
                    IssueKind::Fidelity,
                    format!(
                        "tradeoffs[{idx}] is a delta; comparison must read 'vs <scenario_id>'"
                    ),
                ));
                return;
            };
            let Some(other) = find_scenario(scenarios, other_id) else {
                issues.push(ValidationIssue::new(
                    IssueKind::UnknownScenario,
                    format!("tradeoffs[{idx}] compares against unknown scenario '{other_id}'"),
                ));
                return;
            };
            scenario
                .metric(field)
                .zip(other.metric(field))
                .map(|(a, b)| a - b)
        }
    };

    match expected {
        None => issues.push(ValidationIssue::new(
            IssueKind::Fidelity,
            format!(
                "tradeoffs[{idx}] cites {} which scenario '{}' does not report",
                tradeoff.dimension, tradeoff.scenario_id
            ),
        )),
        Some(actual) if !values_match(tradeoff.value, actual) => {
            issues.push(ValidationIssue::new(
                IssueKind::Fidelity,
                format!(
                    "tradeoffs[{idx}] states {} = {} for '{}', engine value is {actual}",
                    tradeoff.dimension, tradeoff.value, tradeoff.scenario_id
                ),
            ))
        }
        Some(_) => {}
    }
}

fn check_mode(response: &AiResponse, context: &DecisionContext, issues: &mut Vec<ValidationIssue>) {
    let answered = response
        .qa_answer
        .as_deref()
        .is_some_and(|answer| !answer.trim().is_empty());
    match context.decision_mode() {
        DecisionMode::Qa if !answered => issues.push(ValidationIssue::new(
            IssueKind::Mode,
            "decision_mode is qa; qa_answer must be a non-empty string",
        )),
        DecisionMode::Recommend | DecisionMode::Compare if response.qa_answer.is_some() => {
            issues.push(ValidationIssue::new(
                IssueKind::Mode,
                format!("qa_answer must be null in {} mode", context.decision_mode()),
            ))
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{check_response, delta_reference, parse_strict, validate_reply, TradeoffDimension};
    use crate::context::{Audience, DecisionContext, DecisionMode, Objective};
    use crate::reasoning::{
        AiResponse, Citation, IssueKind, Recommendation, Tradeoff, NO_RECOMMENDATION, RISK_FLAG,
    };
    use crate::scenario::feasibility::mark_feasible;
    use crate::scenario::{Scenario, ScenarioField};

    fn scenarios(ctx: &DecisionContext) -> Vec<Scenario> {
        mark_feasible(
            vec![
                Scenario::new("cheap", "Cheap", 29.0, 1_450_000.0, 0.8264, 0.1736, Some(0.83))
                    .expect("valid"),
                Scenario::new("safe", "Safe", 32.0, 1_600_000.0, 0.9467, 0.0533, Some(0.76))
                    .expect("valid"),
            ],
            ctx,
        )
    }

    fn response(id: &str, tradeoffs: Vec<Tradeoff>) -> AiResponse {
        AiResponse {
            recommendation: Recommendation {
                scenario_id: id.to_string(),
                confidence: 0.8,
                rationale: "cheapest compliant plan".to_string(),
            },
            tradeoffs,
            executive_summary: "Go with the cheap plan.".to_string(),
            citations: vec![Citation {
                scenario_id: id.to_string(),
                metric: "cost_annual".to_string(),
            }],
            qa_answer: None,
        }
    }

    fn tradeoff(id: &str, dimension: &str, value: f64, comparison: &str) -> Tradeoff {
        Tradeoff {
            scenario_id: id.to_string(),
            dimension: dimension.to_string(),
            value,
            comparison: comparison.to_string(),
        }
    }

    #[test]
    fn accepts_exact_quotes_and_tagged_deltas() {
        let ctx = DecisionContext::default();
        let reply = response(
            "cheap",
            vec![
                tradeoff("cheap", "cost_annual", 1_450_000.0, "lowest"),
                tradeoff("safe", "cost_annual_delta", 150_000.0, "vs cheap"),
            ],
        );
        assert!(check_response(&reply, &scenarios(&ctx), &ctx).is_empty());
    }

    #[test]
    fn rejects_numbers_that_drift_from_the_engine() {
        let ctx = DecisionContext::default();
        let reply = response(
            "cheap",
            vec![tradeoff("cheap", "expected_sla", 0.83, "rounded up")],
        );
        let issues = check_response(&reply, &scenarios(&ctx), &ctx);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Fidelity);
    }

    #[test]
    fn rejects_unknown_scenario_ids_everywhere() {
        let ctx = DecisionContext::default();
        let mut reply = response("ghost", vec![tradeoff("ghost", "cost_annual", 1.0, "x")]);
        reply.citations[0].scenario_id = "ghost".to_string();
        let issues = check_response(&reply, &scenarios(&ctx), &ctx);
        let unknown = issues
            .iter()
            .filter(|i| i.kind == IssueKind::UnknownScenario)
            .count();
        assert_eq!(unknown, 3);
    }

    #[test]
    fn rejects_derived_dimensions_and_unknown_citation_fields() {
        let ctx = DecisionContext::default();
        let mut reply = response("cheap", vec![tradeoff("cheap", "savings", 5.0, "x")]);
        reply.citations.push(Citation {
            scenario_id: "cheap".to_string(),
            metric: "savings".to_string(),
        });
        let kinds: Vec<IssueKind> = check_response(&reply, &scenarios(&ctx), &ctx)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(kinds, [IssueKind::Citation, IssueKind::Fidelity]);
    }

    #[test]
    fn infeasible_pick_is_rejected_when_alternatives_exist() {
        let ctx = DecisionContext::default().with_min_sla_target(0.9).expect("sla");
        let issues = check_response(&response("cheap", vec![]), &scenarios(&ctx), &ctx);
        assert_eq!(issues[0].kind, IssueKind::Feasibility);
    }

    #[test]
    fn all_infeasible_requires_none_and_risk_flag() {
        let ctx = DecisionContext::default()
            .with_max_budget_annual(1_000_000.0)
            .expect("budget");
        let set = scenarios(&ctx);
        let kinds: Vec<IssueKind> = check_response(&response("cheap", vec![]), &set, &ctx)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(kinds, [IssueKind::Feasibility, IssueKind::RiskFlag]);

        let mut flagged = response(NO_RECOMMENDATION, vec![]);
        flagged.citations[0].scenario_id = "cheap".to_string();
        flagged.executive_summary = format!("{RISK_FLAG} nothing fits the budget");
        assert!(check_response(&flagged, &set, &ctx).is_empty());
    }

    #[test]
    fn all_infeasible_reply_must_cite_a_number() {
        let ctx = DecisionContext::default()
            .with_max_budget_annual(1_000_000.0)
            .expect("budget");
        let set = scenarios(&ctx);
        let text = r#"{
            "recommendation": {"scenario_id": "none", "confidence": 0.2, "rationale": "over budget"},
            "tradeoffs": [],
            "executive_summary": "[RISK] nothing fits",
            "citations": [{"scenario_id": "cheap", "metric": "name"}],
            "qa_answer": null
        }"#;
        let err = validate_reply(text, &set, &ctx).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].kind, IssueKind::Citation);

        let anchored = text.replace(r#""metric": "name""#, r#""metric": "breach_risk""#);
        assert!(validate_reply(&anchored, &set, &ctx).is_ok());
    }

    #[test]
    fn qa_answer_follows_the_mode() {
        let qa = DecisionContext::new(Objective::Balanced, DecisionMode::Qa, Audience::OpsManager);
        let issues = check_response(&response("cheap", vec![]), &scenarios(&qa), &qa);
        assert_eq!(issues[0].kind, IssueKind::Mode);

        let ctx = DecisionContext::default();
        let mut reply = response("cheap", vec![]);
        reply.qa_answer = Some("unrequested".to_string());
        assert_eq!(
            check_response(&reply, &scenarios(&ctx), &ctx)[0].kind,
            IssueKind::Mode
        );
    }

    #[test]
    fn strict_parse_refuses_wrapped_json() {
        let err = parse_strict("Sure! ```{\"a\": 1}```").unwrap_err();
        assert_eq!(err.kind, IssueKind::Parse);
        let err = parse_strict("{\"executive_summary\": \"x\"}").unwrap_err();
        assert_eq!(err.kind, IssueKind::Schema);
        let err = parse_strict("{\"executive_summary\": ").unwrap_err();
        assert_eq!(err.kind, IssueKind::Parse);
    }

    #[test]
    fn validate_reply_runs_both_layers() {
        let ctx = DecisionContext::default();
        let text = serde_json::to_string(&response("cheap", vec![])).expect("json");
        assert!(validate_reply(&text, &scenarios(&ctx), &ctx).is_ok());
        let err = validate_reply("[]", &scenarios(&ctx), &ctx).unwrap_err();
        assert_eq!(err.0.len(), 1);
    }

    #[test]
    fn dimension_and_reference_parsing() {
        assert_eq!(
            TradeoffDimension::parse("breach_risk_delta"),
            Some(TradeoffDimension::Delta(ScenarioField::BreachRisk))
        );
        assert_eq!(TradeoffDimension::parse("name"), None);
        assert_eq!(delta_reference("vs balanced (cheaper)"), Some("balanced"));
        assert_eq!(delta_reference("balanced"), None);
    }
}
