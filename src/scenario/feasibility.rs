use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::context::DecisionContext;
use crate::scenario::{Scenario, ScenarioField};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Min(f64),
    Max(f64),
}

impl Bound {
    pub fn holds(&self, value: f64) -> bool {
        match self {
            Bound::Min(min) => value >= *min,
            Bound::Max(max) => value <= *max,
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Min(v) => write!(f, ">= {v}"),
            Bound::Max(v) => write!(f, "<= {v}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConstraintViolation {
    pub field: ScenarioField,
    pub value: f64,
    pub required: Bound,
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} violates {}", self.field, self.value, self.required)
    }
}

/// The active constraints of a context, as bounds on scenario fields.
pub fn active_bounds(context: &DecisionContext) -> Vec<(ScenarioField, Bound)> {
    let mut bounds = Vec::new();
    if let Some(min) = context.min_sla_target() {
        bounds.push((ScenarioField::ExpectedSla, Bound::Min(min)));
    }
    if let Some(max) = context.max_budget_annual() {
        bounds.push((ScenarioField::CostAnnual, Bound::Max(max)));
    }
    if let Some(max) = context.max_breach_risk() {
        bounds.push((ScenarioField::BreachRisk, Bound::Max(max)));
    }
    bounds
}

pub fn violations(scenario: &Scenario, context: &DecisionContext) -> Vec<ConstraintViolation> {
    active_bounds(context)
        .into_iter()
        .filter_map(|(field, bound)| {
            let value = scenario.metric(field)?;
            (!bound.holds(value)).then_some(ConstraintViolation {
                field,
                value,
                required: bound,
            })
        })
        .collect()
}

pub fn is_feasible(scenario: &Scenario, context: &DecisionContext) -> bool {
    violations(scenario, context).is_empty()
}

/// Set every scenario's feasibility flag. Never fails: when nothing is
/// feasible, all come back flagged infeasible and the caller decides.
pub fn mark_feasible(scenarios: Vec<Scenario>, context: &DecisionContext) -> Vec<Scenario> {
    scenarios
        .into_iter()
        .map(|scenario| {
            let feasible = is_feasible(&scenario, context);
            scenario.with_feasible(feasible)
        })
        .collect()
}

pub fn all_infeasible(scenarios: &[Scenario]) -> bool {
    !scenarios.iter().any(Scenario::feasible)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{all_infeasible, is_feasible, mark_feasible, violations, Bound};
    use crate::context::DecisionContext;
    use crate::scenario::{Scenario, ScenarioField};

    fn scenario(id: &str, cost: f64, sla: f64) -> Scenario {
        Scenario::new(id, id, 10.0, cost, sla, 1.0 - sla, Some(0.8)).expect("valid scenario")
    }

    #[test]
    fn unconstrained_context_keeps_everything() {
        let marked = mark_feasible(
            vec![scenario("a", 1.0, 0.1), scenario("b", 9e9, 0.99)],
            &DecisionContext::default(),
        );
        assert!(marked.iter().all(Scenario::feasible));
    }

    #[test]
    fn each_bound_is_enforced() {
        let s = scenario("a", 1_000.0, 0.8);
        let ctx = DecisionContext::default()
            .with_min_sla_target(0.85)
            .and_then(|c| c.with_max_budget_annual(500.0))
            .and_then(|c| c.with_max_breach_risk(0.1))
            .expect("constraints");
        let found = violations(&s, &ctx);
        let fields: Vec<ScenarioField> = found.iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            [
                ScenarioField::ExpectedSla,
                ScenarioField::CostAnnual,
                ScenarioField::BreachRisk
            ]
        );
        assert_eq!(found[1].required, Bound::Max(500.0));
    }

    #[test]
    fn bounds_are_inclusive() {
        let s = scenario("a", 1_000.0, 0.8);
        let ctx = DecisionContext::default()
            .with_min_sla_target(0.8)
            .and_then(|c| c.with_max_budget_annual(1_000.0))
            .expect("constraints");
        assert!(is_feasible(&s, &ctx));
    }

    #[test]
    fn budget_below_everything_marks_all_infeasible() {
        let ctx = DecisionContext::default()
            .with_max_budget_annual(10.0)
            .expect("budget");
        let marked = mark_feasible(vec![scenario("a", 100.0, 0.8), scenario("b", 50.0, 0.7)], &ctx);
        assert_eq!(marked.len(), 2);
        assert!(all_infeasible(&marked));
    }

    proptest! {
        #[test]
        fn tightening_a_bound_never_makes_a_scenario_feasible(
            cost in 0.0f64..1e7,
            sla in 0.0f64..1.0,
            budget in 0.0f64..1e7,
            cut in 0.0f64..1e7,
            min_sla in 0.0f64..1.0,
            raise in 0.0f64..1.0,
            max_risk in 0.0f64..1.0,
            lower in 0.0f64..1.0,
        ) {
            let s = scenario("a", cost, sla);
            let bounded = |budget: f64, min_sla: f64, max_risk: f64| {
                DecisionContext::default()
                    .with_max_budget_annual(budget)
                    .and_then(|c| c.with_min_sla_target(min_sla))
                    .and_then(|c| c.with_max_breach_risk(max_risk))
                    .expect("constraints")
            };
            let loose = bounded(budget, min_sla, max_risk);
            let tightened = [
                bounded((budget - cut).max(0.0), min_sla, max_risk),
                bounded(budget, (min_sla + raise).min(1.0), max_risk),
                bounded(budget, min_sla, (max_risk - lower).max(0.0)),
            ];
            for tight in &tightened {
                if !is_feasible(&s, &loose) {
                    prop_assert!(!is_feasible(&s, tight));
                }
                if is_feasible(&s, tight) {
                    prop_assert!(is_feasible(&s, &loose));
                }
            }
        }
    }
}
