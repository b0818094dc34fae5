use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::pipeline::{BatchItem, DecisionReport, ScenarioReport};
use crate::reasoning::orchestrator::Resolution;
use crate::reasoning::AiResponse;
use crate::scenario::{OmittedVariant, Scenario};
use crate::staffing::StaffingResult;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn render_staffing_table(result: &StaffingResult) -> String {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        "Offered load (Erlangs)".to_string(),
        format!("{:.3}", result.offered_load),
    ]);
    table.add_row(vec!["Agents on queue".to_string(), result.agents.to_string()]);
    table.add_row(vec!["FTE required".to_string(), result.fte.to_string()]);
    table.add_row(vec!["Achieved SLA".to_string(), pct(result.achieved_sla)]);
    table.add_row(vec!["Occupancy".to_string(), pct(result.occupancy)]);
    table.to_string()
}

pub fn render_scenarios_table(scenarios: &[Scenario]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Scenario",
        "Agents",
        "FTE",
        "Annual Cost",
        "Expected SLA",
        "Breach Risk",
        "Occupancy",
        "Feasible",
    ]);
    for s in scenarios {
        let feasible = if s.feasible() {
            Cell::new("YES").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(s.scenario_id()),
            Cell::new(
                s.agents_on_queue()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format!("{:.0}", s.fte_required())),
            Cell::new(format!("{:.0}", s.cost_annual())),
            Cell::new(pct(s.expected_sla())),
            Cell::new(pct(s.breach_risk())),
            Cell::new(
                s.occupancy_peak()
                    .map(pct)
                    .unwrap_or_else(|| "-".to_string()),
            ),
            feasible,
        ]));
    }
    table.to_string()
}

fn render_omitted(omitted: &[OmittedVariant]) -> Option<String> {
    if omitted.is_empty() {
        return None;
    }
    let mut table = new_table();
    table.set_header(vec!["Omitted Scenario", "Reason"]);
    for o in omitted {
        table.add_row(vec![o.variant.as_slug().to_string(), o.reason.clone()]);
    }
    Some(table.to_string())
}

pub fn render_scenario_report(report: &ScenarioReport) -> String {
    let mut out = format!(
        "Offered load {:.3} Erlangs, target {} in {:.0}s\n{}",
        report.offered_load,
        pct(report.target.target_sla()),
        report.target.answer_secs(),
        render_scenarios_table(&report.scenarios)
    );
    if let Some(omitted) = render_omitted(&report.omitted) {
        out.push('\n');
        out.push_str(&omitted);
    }
    if report.all_infeasible {
        out.push_str("\nNo scenario satisfies the active constraints.");
    }
    out
}

pub fn render_response_table(response: &AiResponse) -> String {
    let mut table = new_table();
    table.set_header(vec!["Scenario", "Dimension", "Value", "Comparison"]);
    for t in &response.tradeoffs {
        table.add_row(vec![
            t.scenario_id.clone(),
            t.dimension.clone(),
            t.value.to_string(),
            t.comparison.clone(),
        ]);
    }

    let citations = response
        .citations
        .iter()
        .map(|c| format!("{}.{}", c.scenario_id, c.metric))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!(
        "Recommendation: {} (confidence {:.2})\n{}\n\n{}\n\n{}\nCitations: {}",
        response.recommendation.scenario_id,
        response.recommendation.confidence,
        response.recommendation.rationale,
        response.executive_summary,
        table,
        citations
    );
    if let Some(answer) = &response.qa_answer {
        out.push_str(&format!("\n\nAnswer: {answer}"));
    }
    out
}

pub fn render_decision_report(report: &DecisionReport) -> String {
    let resolution = match &report.resolution {
        Resolution::Accepted { attempts } => {
            format!("accepted from {} after {attempts} attempt(s)", report.provider)
        }
        Resolution::Fallback { reason, attempts } => format!(
            "deterministic fallback after {attempts} attempt(s) with {} ({reason})",
            report.provider
        ),
    };
    let mut out = format!(
        "{}\n\n{}\n\nResolution: {resolution}",
        render_scenarios_table(&report.scenarios),
        render_response_table(&report.response)
    );
    if let Some(omitted) = render_omitted(&report.omitted) {
        out.push_str("\n\n");
        out.push_str(&omitted);
    }
    if !report.issues.is_empty() {
        out.push_str("\nValidation issues:");
        for issue in &report.issues {
            out.push_str(&format!("\n  - {issue}"));
        }
    }
    out
}

pub fn render_batch_table(items: &[BatchItem]) -> String {
    let mut table = new_table();
    table.set_header(vec!["#", "Recommendation", "Resolution", "Provider", "Error"]);
    for item in items {
        let row = match &item.report {
            Some(report) => {
                let resolution = if report.fallback_used {
                    Cell::new("fallback").fg(Color::Yellow)
                } else {
                    Cell::new("accepted").fg(Color::Green)
                };
                vec![
                    Cell::new(item.index),
                    Cell::new(&report.response.recommendation.scenario_id),
                    resolution,
                    Cell::new(&report.provider),
                    Cell::new("-"),
                ]
            }
            None => vec![
                Cell::new(item.index),
                Cell::new("-"),
                Cell::new("failed").fg(Color::Red),
                Cell::new("-"),
                Cell::new(item.error.as_deref().unwrap_or("unknown error")),
            ],
        };
        table.add_row(Row::from(row));
    }
    table.to_string()
}
