//! Solving one request under a series of CO₂ reduction targets.

use std::{
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use crate::report::{self, ResultRow};
use crate::scenario::{ConfigError, ScenarioRequest};
use crate::solve::{ScenarioOutcome, run_scenario, run_with_fallback};
use crate::{output_writer, read_request};

/// Reduction targets explored when none are given
pub const DEFAULT_TARGETS: [f64; 4] = [0.0, 0.1, 0.2, 0.3];

/// The outcome of the sweep at one reduction target
#[derive(Debug)]
pub struct SweepPoint {
    pub target: f64,
    pub outcome: ScenarioOutcome,
}

/// Solve `request` once per target, in order.
///
/// A failing target never stops the sweep: configuration and solver errors are kept as
/// [`ScenarioOutcome::Error`] at their point.
pub fn sweep_co2_targets(
    request: &ScenarioRequest,
    targets: &[f64],
    fallback: bool,
) -> Vec<SweepPoint> {
    targets
        .iter()
        .map(|&target| {
            info!("solving with a {:.0}% CO2 reduction target", target * 100.0);
            let request = request.with_co2_reduction_target(target);
            let result = if fallback {
                run_with_fallback(&request)
            } else {
                run_scenario(&request)
            };

            let outcome = result.unwrap_or_else(|err| ScenarioOutcome::Error(err.into()));
            if !outcome.is_optimal() {
                warn!("target {:.2}: {}", target, outcome.status());
            }
            SweepPoint { target, outcome }
        })
        .collect()
}

/// Resolve `request` once to fail on a malformed request before solving anything.
///
/// Every point sets its own target, so the request's own target is not checked.
pub fn scenario_name(request: &ScenarioRequest) -> Result<String, ConfigError> {
    Ok(request.with_co2_reduction_target(0.0).resolve()?.name)
}

/// Command-line arguments for the sweep command.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// JSON scenario request (default: the reference network)
    pub input: Option<PathBuf>,

    /// Comma-separated CO2 reduction targets (default: 0,0.1,0.2,0.3)
    #[clap(short('t'), long, value_delimiter = ',')]
    pub targets: Vec<f64>,

    /// Allow unmet demand at targets where exact demand is infeasible
    #[clap(long)]
    pub fallback: bool,

    /// Output summary file (default: stdout)
    #[clap(long)]
    pub rpt: Option<PathBuf>,

    /// Output CSV file, one row per target
    #[clap(long)]
    pub csv: Option<PathBuf>,

    /// Output JSON file with every result
    #[clap(long)]
    pub json: Option<PathBuf>,
}

/// Run a CO2 target sweep and write its results.
///
/// Infeasible targets are reported, not treated as errors.
pub fn sweep_main(args: SweepArgs) -> Result<()> {
    let SweepArgs {
        input,
        targets,
        fallback,
        ref rpt,
        ref csv,
        ref json,
    } = args;

    let request = read_request(input.as_deref())?;
    let name = scenario_name(&request)?;
    let targets = if targets.is_empty() {
        DEFAULT_TARGETS.to_vec()
    } else {
        targets
    };

    let points = sweep_co2_targets(&request, &targets, fallback);

    let mut writer = output_writer(rpt.as_deref())?;
    writeln!(writer, "Scenario: {}", name)?;
    report::write_sweep_summary(&mut writer, &points)?;
    writer.flush()?;

    if let Some(output) = csv {
        let rows = points
            .iter()
            .map(|point| ResultRow::new(&name, point.target, &point.outcome))
            .collect::<Vec<_>>();
        report::write_csv(BufWriter::new(fs::File::create(output)?), &rows)?;
    }

    if let Some(output) = json {
        report::write_json(BufWriter::new(fs::File::create(output)?), &points)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_grows_with_stricter_targets() {
        let points = sweep_co2_targets(&ScenarioRequest::default(), &DEFAULT_TARGETS, false);
        assert_eq!(points.len(), DEFAULT_TARGETS.len());

        let objectives: Vec<f64> = points
            .iter()
            .map(|point| point.outcome.report().expect("feasible target").objective)
            .collect();
        for pair in objectives.windows(2) {
            assert!(pair[1] >= pair[0] * (1.0 - 1e-9), "{:?}", objectives);
        }

        for point in &points {
            let report = point.outcome.report().unwrap();
            assert_eq!(report.co2_reduction_target, point.target);
            assert!(report.emissions.total <= report.emissions.cap * (1.0 + 1e-6));
        }
    }

    #[test]
    fn test_invalid_target_does_not_stop_the_sweep() {
        let points = sweep_co2_targets(&ScenarioRequest::default(), &[1.5, 0.0], false);

        assert!(matches!(points[0].outcome, ScenarioOutcome::Error(_)));
        assert!(points[0].outcome.status().starts_with("error:"));
        assert!(points[1].outcome.is_optimal());
    }

    #[test]
    fn test_request_target_is_replaced_by_sweep_targets() {
        let request = ScenarioRequest {
            name: Some("overtarget".to_string()),
            ..ScenarioRequest::default().with_co2_reduction_target(1.5)
        };
        assert_eq!(scenario_name(&request).unwrap(), "overtarget");

        let points = sweep_co2_targets(&request, &[0.0], false);
        assert!(points[0].outcome.is_optimal());

        let malformed = ScenarioRequest {
            service_level: Some(1.0),
            ..request
        };
        assert!(matches!(
            scenario_name(&malformed),
            Err(ConfigError::InvalidParameter { ref name, .. }) if name == "service_level"
        ));
    }

    #[test]
    fn test_fallback_applies_per_target() {
        let request = ScenarioRequest {
            use_new_locations: Some(false),
            ..ScenarioRequest::default()
        };
        let points = sweep_co2_targets(&request, &[0.5, 0.6], true);

        for point in &points {
            let report = point.outcome.report().expect("fallback is always solvable");
            assert!(report.used_fallback);
        }
        let satisfied: Vec<f64> = points
            .iter()
            .map(|p| p.outcome.report().unwrap().demand.satisfied)
            .collect();
        assert!(satisfied[1] <= satisfied[0] * (1.0 + 1e-9));
    }
}
