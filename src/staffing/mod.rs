pub mod erlang;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CapacityError;
use crate::forecast::{ForecastInputs, ServiceTarget};
use crate::staffing::erlang::service_level;

/// Guards the shrinkage division against representation noise such as
/// `21.0 / 0.7 == 30.000000000000004`.
const FTE_ROUNDING_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaffingResult {
    pub offered_load: f64,
    /// Agents needed on the queue, before shrinkage.
    pub agents: u32,
    /// Paid headcount after shrinkage.
    pub fte: u32,
    pub achieved_sla: f64,
    pub occupancy: f64,
}

/// Smallest agent count whose Erlang C service level meets `target`.
pub fn required_agents(
    forecast: &ForecastInputs,
    target: &ServiceTarget,
) -> Result<StaffingResult, CapacityError> {
    let ceiling = iteration_ceiling(forecast.offered_load())?;
    search_agents(forecast, target, ceiling)
}

pub(crate) fn search_agents(
    forecast: &ForecastInputs,
    target: &ServiceTarget,
    ceiling: u32,
) -> Result<StaffingResult, CapacityError> {
    let load = forecast.offered_load();
    let mut agents = first_stable_agent_count(load);
    while agents <= ceiling {
        let achieved = service_level(load, agents, forecast.aht_secs(), target.answer_secs());
        if achieved >= target.target_sla() {
            debug!(
                offered_load = load,
                agents,
                achieved_sla = achieved,
                target_sla = target.target_sla(),
                "staffing target met"
            );
            return build_result(forecast, load, agents, achieved);
        }
        agents += 1;
    }

    Err(CapacityError::TargetUnreachable {
        target_sla: target.target_sla(),
        offered_load: load,
        ceiling,
    })
}

/// Evaluate a fixed agent count, e.g. a buffered plan on top of a sized one.
pub fn staff_with_agents(
    forecast: &ForecastInputs,
    target: &ServiceTarget,
    agents: u32,
) -> Result<StaffingResult, CapacityError> {
    let load = forecast.offered_load();
    iteration_ceiling(load)?;
    if agents < first_stable_agent_count(load) {
        return Err(CapacityError::UnstableQueue { offered_load: load });
    }
    let achieved = service_level(load, agents, forecast.aht_secs(), target.answer_secs());
    build_result(forecast, load, agents, achieved)
}

/// Headcount needed so that `agents` remain available after shrinkage.
/// Shrinkage close to 1 can push the headcount past `u32::MAX`, which is
/// reported instead of saturating.
pub fn fte_for(agents: u32, shrinkage: f64) -> Result<u32, CapacityError> {
    let raw = f64::from(agents) / (1.0 - shrinkage);
    let fte = (raw - FTE_ROUNDING_EPSILON).ceil().max(0.0);
    if !fte.is_finite() || fte > f64::from(u32::MAX) {
        return Err(CapacityError::HeadcountOverflow { agents, shrinkage });
    }
    Ok(fte as u32)
}

fn build_result(
    forecast: &ForecastInputs,
    load: f64,
    agents: u32,
    achieved_sla: f64,
) -> Result<StaffingResult, CapacityError> {
    Ok(StaffingResult {
        offered_load: load,
        agents,
        fte: fte_for(agents, forecast.shrinkage())?,
        achieved_sla,
        occupancy: load / f64::from(agents),
    })
}

/// Stability requires strictly more agents than offered load.
fn first_stable_agent_count(load: f64) -> u32 {
    load.floor() as u32 + 1
}

fn iteration_ceiling(load: f64) -> Result<u32, CapacityError> {
    let ceiling = (load * 10.0 + 50.0).ceil();
    if !load.is_finite() || ceiling >= f64::from(u32::MAX) {
        return Err(CapacityError::UnstableQueue { offered_load: load });
    }
    Ok(ceiling as u32)
}
