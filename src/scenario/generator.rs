use tracing::{debug, warn};

use crate::error::{CapacityError, PipelineError};
use crate::forecast::{ForecastInputs, ServiceTarget};
use crate::scenario::{OmittedVariant, PricingTable, Scenario, ScenarioSet, ScenarioVariant};
use crate::staffing::{required_agents, staff_with_agents, StaffingResult};

pub const RELAXED_SLA_OFFSET: f64 = 0.05;
pub const MIN_ACCEPTABLE_SLA: f64 = 0.50;
pub const ELEVATED_SLA_OFFSET: f64 = 0.05;
pub const MAX_TARGET_SLA: f64 = 0.99;
pub const RISK_BUFFER_AGENTS: u32 = 1;

/// SLA goal each variant is sized for, given the base target.
pub fn variant_target_sla(variant: ScenarioVariant, base: f64) -> f64 {
    match variant {
        ScenarioVariant::CostMinimized => (base - RELAXED_SLA_OFFSET).max(MIN_ACCEPTABLE_SLA).min(base),
        ScenarioVariant::SlaProtected | ScenarioVariant::RiskAverse => {
            (base + ELEVATED_SLA_OFFSET).min(MAX_TARGET_SLA).max(base)
        }
        ScenarioVariant::Balanced => base,
    }
}

/// Derive the fixed scenario set for one forecast interval.
///
/// A variant whose target cannot be staffed is omitted and recorded in
/// [`ScenarioSet::omitted`]; only when every variant fails is the run fatal.
/// Breach risk is approximated as `1 - achieved_sla`.
pub fn generate(
    forecast: &ForecastInputs,
    base_target: &ServiceTarget,
    pricing: &PricingTable,
) -> Result<ScenarioSet, PipelineError> {
    let mut scenarios = Vec::with_capacity(ScenarioVariant::ALL.len());
    let mut omitted = Vec::new();
    let mut first_failure: Option<CapacityError> = None;

    for variant in ScenarioVariant::ALL {
        let target = base_target.with_sla(variant_target_sla(variant, base_target.target_sla()))?;
        match size_variant(variant, forecast, &target) {
            Ok(staffing) => {
                debug!(
                    scenario = variant.as_slug(),
                    agents = staffing.agents,
                    fte = staffing.fte,
                    achieved_sla = staffing.achieved_sla,
                    "scenario sized"
                );
                scenarios.push(build_scenario(variant, &staffing, &target, pricing)?);
            }
            Err(err) => {
                warn!(scenario = variant.as_slug(), "omitting scenario: {err}");
                omitted.push(OmittedVariant {
                    variant,
                    reason: err.to_string(),
                });
                first_failure.get_or_insert(err);
            }
        }
    }

    if scenarios.is_empty() {
        if let Some(err) = first_failure {
            return Err(err.into());
        }
    }

    Ok(ScenarioSet { scenarios, omitted })
}

fn size_variant(
    variant: ScenarioVariant,
    forecast: &ForecastInputs,
    target: &ServiceTarget,
) -> Result<StaffingResult, CapacityError> {
    let sized = required_agents(forecast, target)?;
    match variant {
        ScenarioVariant::RiskAverse => {
            staff_with_agents(forecast, target, sized.agents + RISK_BUFFER_AGENTS)
        }
        _ => Ok(sized),
    }
}

fn build_scenario(
    variant: ScenarioVariant,
    staffing: &StaffingResult,
    target: &ServiceTarget,
    pricing: &PricingTable,
) -> Result<Scenario, PipelineError> {
    let fte = f64::from(staffing.fte);
    let scenario = Scenario::new(
        variant.as_slug(),
        variant.display_name(),
        fte,
        pricing.annual_cost(fte),
        staffing.achieved_sla,
        1.0 - staffing.achieved_sla,
        Some(staffing.occupancy),
    )?
    .with_sizing(staffing.agents, target.target_sla())?;
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::{generate, variant_target_sla};
    use crate::forecast::{ForecastInputs, ServiceTarget};
    use crate::scenario::{PricingTable, ScenarioVariant};

    fn reference() -> (ForecastInputs, ServiceTarget, PricingTable) {
        (
            ForecastInputs::new(100.0, 300.0, 0.3, 30.0).expect("valid forecast"),
            ServiceTarget::new(0.8, 60.0).expect("valid target"),
            PricingTable::new(50_000.0).expect("valid pricing"),
        )
    }

    #[test]
    fn produces_the_four_variants_in_order() {
        let (forecast, target, pricing) = reference();
        let set = generate(&forecast, &target, &pricing).expect("scenarios");
        let ids: Vec<&str> = set.scenarios.iter().map(|s| s.scenario_id()).collect();
        assert_eq!(ids, ["cost_minimized", "sla_protected", "balanced", "risk_averse"]);
        assert!(set.omitted.is_empty());
        assert!(set.scenarios.iter().all(|s| !s.feasible()));
    }

    #[test]
    fn reference_metrics() {
        let (forecast, target, pricing) = reference();
        let set = generate(&forecast, &target, &pricing).expect("scenarios");

        let balanced = set.by_id("balanced").expect("balanced");
        assert_eq!(balanced.agents_on_queue(), Some(20));
        assert_eq!(balanced.fte_required(), 29.0);
        assert_eq!(balanced.cost_annual(), 1_450_000.0);
        assert!((balanced.breach_risk() - (1.0 - balanced.expected_sla())).abs() < 1e-15);
        let occupancy = balanced.occupancy_peak().expect("occupancy");
        assert!((occupancy - forecast.offered_load() / 20.0).abs() < 1e-12);

        let protected = set.by_id("sla_protected").expect("sla_protected");
        assert_eq!(protected.agents_on_queue(), Some(21));
        assert_eq!(protected.fte_required(), 30.0);

        let risk_averse = set.by_id("risk_averse").expect("risk_averse");
        assert_eq!(risk_averse.agents_on_queue(), Some(22));
        assert_eq!(risk_averse.fte_required(), 32.0);
        assert!(risk_averse.breach_risk() < protected.breach_risk());

        let cheapest = set.by_id("cost_minimized").expect("cost_minimized");
        assert!(cheapest.cost_annual() <= balanced.cost_annual());
    }

    #[test]
    fn generation_is_deterministic() {
        let (forecast, target, pricing) = reference();
        let a = generate(&forecast, &target, &pricing).expect("scenarios");
        let b = generate(&forecast, &target, &pricing).expect("scenarios");
        assert_eq!(
            serde_json::to_string(&a).expect("json"),
            serde_json::to_string(&b).expect("json")
        );
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn variant_targets_are_clamped() {
        assert!((variant_target_sla(ScenarioVariant::CostMinimized, 0.8) - 0.75).abs() < 1e-12);
        assert_eq!(variant_target_sla(ScenarioVariant::CostMinimized, 0.52), 0.5);
        assert_eq!(variant_target_sla(ScenarioVariant::CostMinimized, 0.4), 0.4);
        assert_eq!(variant_target_sla(ScenarioVariant::SlaProtected, 0.97), 0.99);
        assert_eq!(variant_target_sla(ScenarioVariant::SlaProtected, 0.995), 0.995);
        assert_eq!(variant_target_sla(ScenarioVariant::Balanced, 0.8), 0.8);
    }

    #[test]
    fn pricing_cannot_be_negative() {
        let err = PricingTable::new(-5.0).unwrap_err();
        assert_eq!(err.field, "cost_per_agent_annual");
        assert!(PricingTable::new(f64::INFINITY).is_err());
        let free = PricingTable::new(0.0).expect("zero cost is allowed");
        let (forecast, target, _) = reference();
        let set = generate(&forecast, &target, &free).expect("scenarios");
        assert!(set.scenarios.iter().all(|s| s.cost_annual() == 0.0));
    }
}
