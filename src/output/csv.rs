use anyhow::Result;

use crate::pipeline::BatchItem;
use crate::reasoning::AiResponse;
use crate::scenario::Scenario;
use crate::staffing::StaffingResult;

pub fn staffing_to_csv(result: &StaffingResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["offered_load", "agents", "fte", "achieved_sla", "occupancy"])?;
    writer.write_record([
        format!("{:.6}", result.offered_load),
        result.agents.to_string(),
        result.fte.to_string(),
        format!("{:.6}", result.achieved_sla),
        format!("{:.6}", result.occupancy),
    ])?;
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn scenarios_to_csv(scenarios: &[Scenario]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "scenario_id",
        "name",
        "agents_on_queue",
        "fte_required",
        "cost_annual",
        "expected_sla",
        "breach_risk",
        "occupancy_peak",
        "feasible",
    ])?;
    for s in scenarios {
        writer.write_record([
            s.scenario_id().to_string(),
            s.name().to_string(),
            s.agents_on_queue().map(|a| a.to_string()).unwrap_or_default(),
            s.fte_required().to_string(),
            format!("{:.2}", s.cost_annual()),
            format!("{:.6}", s.expected_sla()),
            format!("{:.6}", s.breach_risk()),
            s.occupancy_peak()
                .map(|o| format!("{o:.6}"))
                .unwrap_or_default(),
            s.feasible().to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn tradeoffs_to_csv(response: &AiResponse) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["scenario_id", "dimension", "value", "comparison"])?;
    for t in &response.tradeoffs {
        writer.write_record([
            t.scenario_id.clone(),
            t.dimension.clone(),
            t.value.to_string(),
            t.comparison.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn batch_to_csv(items: &[BatchItem]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "index",
        "recommendation",
        "all_infeasible",
        "fallback_used",
        "provider",
        "error",
    ])?;
    for item in items {
        let report = item.report.as_ref();
        writer.write_record([
            item.index.to_string(),
            report
                .map(|r| r.response.recommendation.scenario_id.clone())
                .unwrap_or_default(),
            report.map(|r| r.all_infeasible.to_string()).unwrap_or_default(),
            report.map(|r| r.fallback_used.to_string()).unwrap_or_default(),
            report.map(|r| r.provider.clone()).unwrap_or_default(),
            item.error.clone().unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
