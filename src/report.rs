//! Writing results: text reports, CSV rows and JSON.

use std::{cmp, collections::BTreeMap, io::Write};

use anyhow::Result;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use prettytable::*;
use serde::Serialize;

use crate::network::Layer;
use crate::solve::{ScenarioOutcome, ScenarioReport};
use crate::sweep::SweepPoint;

/// Columns every CSV row starts with
const METADATA_COLUMNS: [&str; 4] = ["scenario", "co2_reduction_target", "status", "used_fallback"];

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Human-readable report of an optimal solve
pub fn write_report<W: Write>(out: &mut W, report: &ScenarioReport) -> Result<()> {
    writeln!(out, "Scenario: {}", report.scenario)?;
    writeln!(
        out,
        "CO2 reduction target: {:.1}%{}",
        report.co2_reduction_target * 100.0,
        if report.used_fallback {
            " (unmet demand allowed)"
        } else {
            ""
        }
    )?;
    writeln!(out, "Total cost: {}", money(report.objective))?;

    let mut costs = Table::new();
    costs.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    costs.set_titles(row!["Cost", "Transport", "Inventory"]);
    for layer in Layer::ALL {
        let layer_costs = report.layer_cost(layer);
        costs.add_row(row![
            layer.description(),
            r->money(layer_costs.transport),
            r->money(layer_costs.inventory),
        ]);
    }
    for (name, value) in [
        ("Sourcing", report.sourcing_cost),
        ("Crossdock handling", report.crossdock_handling_cost),
        ("DC handling", report.dc_handling_cost),
        ("Last mile", report.lastmile_cost),
        ("CO2 manufacturing", report.co2_manufacturing_cost),
        ("CO2 new locations", report.co2_new_location_cost),
        ("New location fixed", report.new_location_fixed_cost),
        ("New location production", report.new_location_production_cost),
    ] {
        costs.add_row(row![name, r->money(value), ""]);
    }
    writeln!(out)?;
    costs.print(out)?;

    let emissions = &report.emissions;
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Emissions", "t CO2"]);
    for (mode, tons) in &emissions.by_mode {
        table.add_row(row![format!("Transport ({})", mode), r->format!("{:.3}", tons)]);
    }
    table.add_row(row!["Plant production", r->format!("{:.3}", emissions.plant_production)]);
    table.add_row(row![
        "New location production",
        r->format!("{:.3}", emissions.new_location_production)
    ]);
    table.add_row(row!["Last mile", r->format!("{:.3}", emissions.lastmile)]);
    table.add_row(row!["Total", r->format!("{:.3}", emissions.total)]);
    table.add_row(row!["Cap", r->format!("{:.3}", emissions.cap)]);
    writeln!(out)?;
    table.print(out)?;

    writeln!(
        out,
        "\nDemand: {:.0} of {:.0} units satisfied ({:.2}%)",
        report.demand.satisfied,
        report.demand.total,
        report.demand.satisfied_pct * 100.0
    )?;
    if report.opened_locations.is_empty() {
        writeln!(out, "New locations opened: none")?;
    } else {
        writeln!(
            out,
            "New locations opened: {}",
            report.opened_locations.iter().join(", ")
        )?;
    }
    for (retailer, unmet) in report.unmet_by_retailer.iter().filter(|(_, u)| **u > 1e-6) {
        writeln!(out, "  unmet at {}: {:.0}", retailer, unmet)?;
    }

    for layer in Layer::ALL {
        write_flow_matrix(out, report, layer)?;
    }

    let mut flows = report.flows.iter().collect::<Vec<_>>();
    flows.sort_by_key(|flow| cmp::Reverse(OrderedFloat(flow.units)));
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Layer", "Origin", "Destination", "Mode", "Units"]);
    for flow in flows {
        table.add_row(row![
            flow.layer.label(),
            flow.origin,
            flow.destination,
            flow.mode,
            r->format!("{:.0}", flow.units),
        ]);
    }
    writeln!(out, "\nFlows: {}", report.flows.len())?;
    table.print(out)?;

    Ok(())
}

/// Origin by destination table of one layer, units summed over modes
fn write_flow_matrix<W: Write>(out: &mut W, report: &ScenarioReport, layer: Layer) -> Result<()> {
    let mut cells: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for flow in report.flows.iter().filter(|flow| flow.layer == layer) {
        *cells
            .entry((flow.origin.as_str(), flow.destination.as_str()))
            .or_default() += flow.units;
    }
    if cells.is_empty() {
        return Ok(());
    }

    let origins = cells.keys().map(|(o, _)| *o).unique().collect::<Vec<_>>();
    let destinations = cells
        .keys()
        .map(|(_, d)| *d)
        .unique()
        .sorted()
        .collect::<Vec<_>>();

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    let mut titles = vec![Cell::new(layer.label())];
    titles.extend(destinations.iter().map(|d| Cell::new(d)));
    table.set_titles(Row::new(titles));
    for origin in origins {
        let mut cells_row = vec![Cell::new(origin)];
        cells_row.extend(destinations.iter().map(|destination| {
            let units = cells.get(&(origin, *destination)).copied().unwrap_or(0.0);
            Cell::new_align(&format!("{:.0}", units), format::Alignment::RIGHT)
        }));
        table.add_row(Row::new(cells_row));
    }

    writeln!(out, "\n{}", layer.description())?;
    table.print(out)?;
    Ok(())
}

/// One line per sweep point
pub fn write_sweep_summary<W: Write>(out: &mut W, points: &[SweepPoint]) -> Result<()> {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row![
        "Target",
        "Status",
        "Total cost",
        "Emissions",
        "Cap",
        "Satisfied",
        "Opened",
    ]);
    for point in points {
        let target = format!("{:.0}%", point.target * 100.0);
        match point.outcome.report() {
            Some(report) => table.add_row(row![
                target,
                point.outcome.status(),
                r->money(report.objective),
                r->format!("{:.3}", report.emissions.total),
                r->format!("{:.3}", report.emissions.cap),
                r->format!("{:.2}%", report.demand.satisfied_pct * 100.0),
                report.opened_locations.iter().join(" "),
            ]),
            None => table.add_row(row![target, point.outcome.status(), "", "", "", "", ""]),
        };
    }
    table.print(out)?;
    Ok(())
}

/// A flat result row: metadata, then KPIs and variable values
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub metadata: [String; 4],
    pub values: Vec<(String, f64)>,
}

impl ResultRow {
    pub fn new(scenario: &str, target: f64, outcome: &ScenarioOutcome) -> Self {
        let report = outcome.report();
        let metadata = [
            scenario.to_string(),
            target.to_string(),
            outcome.status(),
            report.is_some_and(|r| r.used_fallback).to_string(),
        ];
        let values = report
            .map(|report| {
                let mut values = report.kpis();
                values.extend(report.variables.iter().cloned());
                values
            })
            .unwrap_or_default();
        ResultRow { metadata, values }
    }
}

/// Write rows as CSV over the union of their columns.
///
/// Columns appear in first-seen order; a row without a value leaves its cell empty.
pub fn write_csv<W: Write>(out: W, rows: &[ResultRow]) -> Result<()> {
    let columns = rows
        .iter()
        .flat_map(|row| row.values.iter().map(|(name, _)| name.as_str()))
        .unique()
        .collect::<Vec<_>>();

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(METADATA_COLUMNS.iter().copied().chain(columns.iter().copied()))?;
    for row in rows {
        let values: BTreeMap<&str, f64> = row
            .values
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        let record = row.metadata.iter().cloned().chain(columns.iter().map(|column| {
            values
                .get(column)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    co2_reduction_target: f64,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ScenarioReport>,
}

/// Write sweep points as a JSON array
pub fn write_json<W: Write>(out: W, points: &[SweepPoint]) -> Result<()> {
    let records = points
        .iter()
        .map(|point| OutcomeRecord {
            co2_reduction_target: point.target,
            status: point.outcome.status(),
            report: point.outcome.report(),
        })
        .collect::<Vec<_>>();
    serde_json::to_writer_pretty(out, &records)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp_solver::OptimizationStatus;
    use crate::scenario::ScenarioRequest;
    use crate::solve::run_scenario;

    fn reference_outcome() -> ScenarioOutcome {
        run_scenario(&ScenarioRequest::reference()).unwrap()
    }

    #[test]
    fn test_text_report_sections() {
        let outcome = reference_outcome();
        let mut out = Vec::new();
        write_report(&mut out, outcome.report().unwrap()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Scenario: reference"));
        assert!(text.contains("CO2 reduction target: 50.0%"));
        assert!(text.contains("Demand: 111000 of 111000 units satisfied (100.00%)"));
        assert!(text.contains("New locations opened: "));
        assert!(text.contains("Transport (sea)"));
        assert!(text.contains(Layer::DcToRetailer.description()));
    }

    #[test]
    fn test_csv_union_of_columns() {
        let optimal = reference_outcome();
        let infeasible = ScenarioOutcome::NonOptimal(OptimizationStatus::Infeasible);
        let rows = vec![
            ResultRow::new("reference", 0.5, &optimal),
            ResultRow::new("closed", 0.9, &infeasible),
        ];

        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        let mut reader = csv::Reader::from_reader(out.as_slice());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "scenario");
        assert_eq!(&headers[3], "used_fallback");
        assert_eq!(&headers[4], "objective");
        assert!(headers.iter().any(|h| h == "f3[PED,FLUXC,road]"));

        let records = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][2], "optimal");
        assert_eq!(&records[1][2], "infeasible");
        assert_eq!(&records[1][4], "");
        assert_eq!(records[1].len(), headers.len());
        let objective: f64 = records[0][4].parse().unwrap();
        assert!((objective - optimal.report().unwrap().objective).abs() < 1e-6);
    }

    #[test]
    fn test_json_keeps_status_of_every_point() {
        let points = vec![
            SweepPoint {
                target: 0.5,
                outcome: reference_outcome(),
            },
            SweepPoint {
                target: 0.9,
                outcome: ScenarioOutcome::NonOptimal(OptimizationStatus::Infeasible),
            },
        ];
        let mut out = Vec::new();
        write_json(&mut out, &points).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(json[0]["status"], "optimal");
        assert_eq!(json[0]["report"]["demand"]["total"], 111000.0);
        assert!(json[0]["report"]["layer_costs"]["dc_to_retailer"]["transport"].is_number());
        assert_eq!(json[1]["status"], "infeasible");
        assert!(json[1].get("report").is_none());
    }

    #[test]
    fn test_sweep_summary_lists_every_target() {
        let points = vec![SweepPoint {
            target: 0.9,
            outcome: ScenarioOutcome::NonOptimal(OptimizationStatus::Infeasible),
        }];
        let mut out = Vec::new();
        write_sweep_summary(&mut out, &points).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("90%"));
        assert!(text.contains("infeasible"));
    }
}
