//! Deterministic stand-in for the reasoning provider.
//!
//! Every number it emits is copied from a scenario, so its replies pass the
//! same contract checks a provider reply must pass.

use std::cmp::Ordering;

use crate::context::{Audience, DecisionContext, DecisionMode, Objective};
use crate::reasoning::{
    AiResponse, Citation, Recommendation, Tradeoff, NO_RECOMMENDATION, RISK_FLAG,
};
use crate::scenario::feasibility::violations;
use crate::scenario::{Scenario, ScenarioField};

pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const QUOTED_FIELDS: [ScenarioField; 3] = [
    ScenarioField::CostAnnual,
    ScenarioField::ExpectedSla,
    ScenarioField::BreachRisk,
];

/// Build a contract-valid response from the scenarios alone. The caller
/// guarantees `scenarios` is non-empty.
pub fn synthesize(
    context: &DecisionContext,
    scenarios: &[Scenario],
    question: Option<&str>,
) -> AiResponse {
    let feasible: Vec<&Scenario> = scenarios.iter().filter(|s| s.feasible()).collect();
    let nothing_feasible = feasible.is_empty();

    let ranked = if nothing_feasible {
        rank_by_compliance(scenarios, context)
    } else {
        rank_by_objective(&feasible, context.objective())
    };
    let focus = ranked.first().copied();
    let runner_up = match context.decision_mode() {
        DecisionMode::Compare => ranked.get(1).copied(),
        _ => None,
    };

    let recommendation = match focus {
        Some(pick) if !nothing_feasible => Recommendation {
            scenario_id: pick.scenario_id().to_string(),
            confidence: FALLBACK_CONFIDENCE,
            rationale: format!(
                "Deterministic fallback: {} ranks first among the feasible scenarios for the {} \
                 objective.",
                pick.name(),
                context.objective()
            ),
        },
        _ => Recommendation {
            scenario_id: NO_RECOMMENDATION.to_string(),
            confidence: 0.0,
            rationale: "Deterministic fallback: no scenario satisfies the active constraints."
                .to_string(),
        },
    };

    let mut tradeoffs = Vec::new();
    for scenario in focus.into_iter().chain(runner_up) {
        for field in QUOTED_FIELDS {
            if let Some(value) = scenario.metric(field) {
                tradeoffs.push(Tradeoff {
                    scenario_id: scenario.scenario_id().to_string(),
                    dimension: field.as_str().to_string(),
                    value,
                    comparison: rank_text(field, value, scenarios),
                });
            }
        }
    }
    let citations = tradeoffs
        .iter()
        .map(|t| Citation {
            scenario_id: t.scenario_id.clone(),
            metric: t.dimension.clone(),
        })
        .collect();

    let executive_summary = summary(context, focus, runner_up, nothing_feasible);
    let qa_answer = match context.decision_mode() {
        DecisionMode::Qa => Some(qa_answer(question, &recommendation.scenario_id)),
        _ => None,
    };

    AiResponse {
        recommendation,
        tradeoffs,
        executive_summary,
        citations,
        qa_answer,
    }
}

fn rank_by_objective<'a>(candidates: &[&'a Scenario], objective: Objective) -> Vec<&'a Scenario> {
    let cost_span = span(candidates, Scenario::cost_annual);
    let risk_span = span(candidates, Scenario::breach_risk);
    let score = |s: &Scenario| match objective {
        Objective::MinCost => s.cost_annual(),
        Objective::MaxSla => -s.expected_sla(),
        Objective::RiskAverse => s.breach_risk(),
        Objective::Balanced => {
            normalize(s.cost_annual(), cost_span) + normalize(s.breach_risk(), risk_span)
        }
    };
    let mut ranked = candidates.to_vec();
    // stable: ties keep scenario order
    ranked.sort_by(|a, b| score(*a).partial_cmp(&score(*b)).unwrap_or(Ordering::Equal));
    ranked
}

/// Fewest broken constraints first, then lowest breach risk.
fn rank_by_compliance<'a>(scenarios: &'a [Scenario], context: &DecisionContext) -> Vec<&'a Scenario> {
    let mut ranked: Vec<(&Scenario, usize)> = scenarios
        .iter()
        .map(|s| (s, violations(s, context).len()))
        .collect();
    ranked.sort_by(|(a, va), (b, vb)| {
        va.cmp(vb).then(
            a.breach_risk()
                .partial_cmp(&b.breach_risk())
                .unwrap_or(Ordering::Equal),
        )
    });
    ranked.into_iter().map(|(s, _)| s).collect()
}

fn span(candidates: &[&Scenario], metric: fn(&Scenario) -> f64) -> (f64, f64) {
    candidates
        .iter()
        .map(|&s| metric(s))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

fn normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        0.0
    }
}

fn rank_text(field: ScenarioField, value: f64, scenarios: &[Scenario]) -> String {
    let higher_is_better = field == ScenarioField::ExpectedSla;
    let better = scenarios
        .iter()
        .filter_map(|s| s.metric(field))
        .filter(|other| {
            if higher_is_better {
                *other > value
            } else {
                *other < value
            }
        })
        .count();
    let order = if higher_is_better { "highest" } else { "lowest" };
    format!(
        "rank {} of {} by {field} ({order} first)",
        better + 1,
        scenarios.len()
    )
}

fn summary(
    context: &DecisionContext,
    focus: Option<&Scenario>,
    runner_up: Option<&Scenario>,
    nothing_feasible: bool,
) -> String {
    let Some(focus) = focus else {
        return format!("{RISK_FLAG} No scenarios were available to evaluate.");
    };
    let name = focus.name();
    let objective = context.objective();

    if nothing_feasible {
        let advice = match context.audience() {
            Audience::Exec => "A constraint must be relaxed before a plan can be approved.",
            Audience::OpsManager => {
                "Relax a constraint or rerun the engine with revised inputs before scheduling."
            }
            Audience::Analyst => {
                "Review the cited fields against the active constraints to see which bound to relax."
            }
        };
        return format!(
            "{RISK_FLAG} No scenario satisfies the active constraints. The {name} plan comes \
             closest. {advice}"
        );
    }

    let mut text = match context.audience() {
        Audience::Exec => format!("Adopt the {name} plan; it best fits the {objective} objective."),
        Audience::OpsManager => format!(
            "Staff to the {name} plan. It is the strongest feasible option for the {objective} \
             objective; check breach risk before publishing the schedule."
        ),
        Audience::Analyst => format!(
            "{name} ranks first among feasible scenarios on the {objective} objective. The cited \
             fields carry the supporting values."
        ),
    };
    if let Some(other) = runner_up {
        text.push_str(&format!(" {} is the closest alternative.", other.name()));
    }
    text
}

fn qa_answer(question: Option<&str>, recommendation: &str) -> String {
    let asked = match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => format!("The question \"{q}\" cannot be answered"),
        None => "No question was provided, and nothing can be answered".to_string(),
    };
    format!(
        "{asked} beyond the scenario table by the deterministic responder. Current \
         recommendation: {recommendation}."
    )
}

#[cfg(test)]
mod tests {
    use super::synthesize;
    use crate::context::{Audience, DecisionContext, DecisionMode, Objective};
    use crate::forecast::{ForecastInputs, ServiceTarget};
    use crate::reasoning::validate::check_response;
    use crate::reasoning::{NO_RECOMMENDATION, RISK_FLAG};
    use crate::scenario::feasibility::mark_feasible;
    use crate::scenario::generator::generate;
    use crate::scenario::{PricingTable, Scenario};

    fn reference(ctx: &DecisionContext) -> Vec<Scenario> {
        let set = generate(
            &ForecastInputs::new(100.0, 300.0, 0.3, 30.0).expect("forecast"),
            &ServiceTarget::new(0.8, 60.0).expect("target"),
            &PricingTable::new(50_000.0).expect("pricing"),
        )
        .expect("scenarios");
        mark_feasible(set.scenarios, ctx)
    }

    fn pick(objective: Objective) -> String {
        let ctx = DecisionContext::new(objective, DecisionMode::Recommend, Audience::OpsManager);
        synthesize(&ctx, &reference(&ctx), None).recommendation.scenario_id
    }

    #[test]
    fn objective_drives_the_pick() {
        assert_eq!(pick(Objective::MinCost), "cost_minimized");
        assert_eq!(pick(Objective::MaxSla), "risk_averse");
        assert_eq!(pick(Objective::RiskAverse), "risk_averse");
        assert_eq!(pick(Objective::Balanced), "sla_protected");
    }

    #[test]
    fn every_combination_passes_validation() {
        let objectives = [
            Objective::Balanced,
            Objective::MinCost,
            Objective::MaxSla,
            Objective::RiskAverse,
        ];
        let modes = [DecisionMode::Recommend, DecisionMode::Compare, DecisionMode::Qa];
        let audiences = [Audience::Exec, Audience::OpsManager, Audience::Analyst];
        for objective in objectives {
            for mode in modes {
                for audience in audiences {
                    for budget in [None, Some(1_000_000.0), Some(1_460_000.0)] {
                        let mut ctx = DecisionContext::new(objective, mode, audience);
                        if let Some(budget) = budget {
                            ctx = ctx.with_max_budget_annual(budget).expect("budget");
                        }
                        let scenarios = reference(&ctx);
                        let reply = synthesize(&ctx, &scenarios, Some("why?"));
                        let issues = check_response(&reply, &scenarios, &ctx);
                        assert!(issues.is_empty(), "{ctx:?}: {issues:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn all_infeasible_flags_risk_and_cites_closest_scenario() {
        let ctx = DecisionContext::default()
            .with_max_budget_annual(1_000_000.0)
            .and_then(|c| c.with_min_sla_target(0.9))
            .expect("constraints");
        let reply = synthesize(&ctx, &reference(&ctx), None);
        assert_eq!(reply.recommendation.scenario_id, NO_RECOMMENDATION);
        assert_eq!(reply.recommendation.confidence, 0.0);
        assert!(reply.executive_summary.starts_with(RISK_FLAG));
        // sla_protected and risk_averse break only the budget; risk_averse is safer
        assert_eq!(reply.citations[0].scenario_id, "risk_averse");
        assert_eq!(reply.tradeoffs[0].value, 1_600_000.0);
    }

    #[test]
    fn compare_mode_quotes_the_runner_up() {
        let ctx = DecisionContext::new(Objective::MinCost, DecisionMode::Compare, Audience::OpsManager);
        let reply = synthesize(&ctx, &reference(&ctx), None);
        let ids: Vec<&str> = reply.tradeoffs.iter().map(|t| t.scenario_id.as_str()).collect();
        assert_eq!(
            ids,
            ["cost_minimized", "cost_minimized", "cost_minimized", "balanced", "balanced", "balanced"]
        );
        assert_eq!(reply.tradeoffs.len(), reply.citations.len());
        assert_eq!(reply.tradeoffs[0].comparison, "rank 1 of 4 by cost_annual (lowest first)");
        assert!(reply.qa_answer.is_none());
    }

    #[test]
    fn summary_states_no_numbers() {
        for audience in [Audience::Exec, Audience::OpsManager, Audience::Analyst] {
            let ctx = DecisionContext::new(Objective::Balanced, DecisionMode::Recommend, audience);
            let reply = synthesize(&ctx, &reference(&ctx), None);
            assert!(!reply.executive_summary.chars().any(|c| c.is_ascii_digit()));
            assert_eq!(reply.recommendation.confidence, 0.5);
        }
    }

    #[test]
    fn qa_mode_names_the_recommendation() {
        let ctx = DecisionContext::new(Objective::Balanced, DecisionMode::Qa, Audience::OpsManager);
        let reply = synthesize(&ctx, &reference(&ctx), Some("Can we drop to 25 FTE?"));
        let answer = reply.qa_answer.expect("qa answer");
        assert!(answer.contains("Can we drop to 25 FTE?"));
        assert!(answer.ends_with("Current recommendation: sla_protected."));
    }
}
