//! Solving a scenario and reading the results back.
//!
//! [`run_scenario`] resolves a request, assembles and solves the model and wraps the
//! result in a [`ScenarioOutcome`]. A [`ScenarioReport`] only exists for an optimal
//! solve; every other status is surfaced as such and never exposes costs.

use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use crate::report::{self, ResultRow};
use crate::sweep::SweepPoint;
use crate::{AppError, output_writer, read_request};
use crate::lp_model_builder;
use crate::lp_solver::{LPSolution, LinearExpression, OptimizationStatus};
use crate::model::NetworkModel;
use crate::network::{Layer, Mode};
use crate::scenario::{ConfigError, Scenario, ScenarioRequest};

/// Values below this are reported as zero flow
const FLOW_EPSILON: f64 = 1e-6;

/// A non-zero flow of the solution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub layer: Layer,
    pub origin: String,
    pub destination: String,
    pub mode: Mode,
    pub units: f64,
}

/// Transport and inventory cost of one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerCosts {
    pub transport: f64,
    pub transport_by_mode: BTreeMap<Mode, f64>,
    pub inventory: f64,
    pub inventory_by_mode: BTreeMap<Mode, f64>,
}

/// Emission breakdown, tonnes CO₂
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Emissions {
    /// Transport emissions of all layers per mode
    pub by_mode: BTreeMap<Mode, f64>,
    pub transport: f64,
    pub plant_production: f64,
    pub new_location_production: f64,
    pub lastmile: f64,
    pub total: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemandSummary {
    pub total: f64,
    pub satisfied: f64,
    pub unmet: f64,
    /// Fraction of the demand delivered, 1 when there is no demand
    pub satisfied_pct: f64,
}

/// Everything known about an optimal solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub co2_reduction_target: f64,
    /// Solved with shortfall allowed after the exact-demand model failed
    pub used_fallback: bool,

    /// Objective without the shortfall penalty
    pub objective: f64,
    pub raw_objective: f64,

    pub layer_costs: BTreeMap<Layer, LayerCosts>,
    pub sourcing_cost: f64,
    pub crossdock_handling_cost: f64,
    pub dc_handling_cost: f64,
    pub lastmile_cost: f64,
    pub co2_manufacturing_cost: f64,
    pub co2_new_location_cost: f64,
    pub new_location_fixed_cost: f64,
    pub new_location_production_cost: f64,

    pub emissions: Emissions,
    pub demand: DemandSummary,
    pub opened_locations: Vec<String>,
    pub unmet_by_retailer: BTreeMap<String, f64>,
    pub flows: Vec<FlowRecord>,
    /// Every decision variable by name, in creation order
    pub variables: Vec<(String, f64)>,
}

impl ScenarioReport {
    fn extract<Brand>(
        scenario: &Scenario,
        model: &NetworkModel<Brand>,
        solution: &LPSolution<Brand>,
    ) -> Self {
        let expressions = &model.expressions;
        let value = |expression: &LinearExpression<Brand>| solution.evaluate(expression);

        let layer_costs = expressions
            .layers
            .iter()
            .map(|(&layer, layer_expressions)| {
                let transport_by_mode: BTreeMap<Mode, f64> = layer_expressions
                    .transport_cost
                    .iter()
                    .map(|(&mode, e)| (mode, value(e)))
                    .collect();
                let inventory_by_mode: BTreeMap<Mode, f64> = layer_expressions
                    .inventory_cost
                    .iter()
                    .map(|(&mode, e)| (mode, value(e)))
                    .collect();
                (
                    layer,
                    LayerCosts {
                        transport: transport_by_mode.values().sum(),
                        transport_by_mode,
                        inventory: inventory_by_mode.values().sum(),
                        inventory_by_mode,
                    },
                )
            })
            .collect();

        let mut by_mode: BTreeMap<Mode, f64> = Mode::ALL.iter().map(|&m| (m, 0.0)).collect();
        for (mode, co2) in expressions.transport_co2_by_mode() {
            by_mode.insert(mode, value(&co2));
        }
        let emissions = Emissions {
            transport: by_mode.values().sum(),
            by_mode,
            plant_production: value(&expressions.plant_production_co2),
            new_location_production: value(&expressions.new_location_production_co2),
            lastmile: value(&expressions.lastmile_co2),
            total: value(&expressions.total_emissions()),
            cap: scenario.emission_cap(),
        };

        let unmet_by_retailer: BTreeMap<String, f64> = model
            .unmet
            .iter()
            .map(|(id, v)| (id.to_string(), solution.get_value(*v).unwrap_or(0.0)))
            .collect();
        let total = scenario.total_demand();
        let unmet: f64 = unmet_by_retailer.values().sum();
        // what the DC → retailer flows actually deliver
        let satisfied = value(&model.layer(Layer::DcToRetailer).total());
        let demand = DemandSummary {
            total,
            satisfied,
            unmet,
            satisfied_pct: if total > 0.0 { satisfied / total } else { 1.0 },
        };

        let opened_locations = model
            .open
            .iter()
            .filter(|(_, y)| solution.get_value(*y).unwrap_or(0.0) > 0.5)
            .map(|(id, _)| id.to_string())
            .collect();

        let flows = model
            .flows
            .iter()
            .flat_map(|(&layer, layer_flows)| {
                layer_flows.flows().iter().filter_map(move |flow| {
                    let units = solution.get_value(flow.variable).unwrap_or(0.0);
                    (units > FLOW_EPSILON).then(|| FlowRecord {
                        layer,
                        origin: flow.lane.origin.to_string(),
                        destination: flow.lane.destination.to_string(),
                        mode: flow.lane.mode,
                        units,
                    })
                })
            })
            .collect();

        let variables = model
            .builder
            .variables()
            .map(|(var, name)| (name.to_string(), solution.get_value(var).unwrap_or(0.0)))
            .collect();

        ScenarioReport {
            scenario: scenario.name.clone(),
            co2_reduction_target: scenario.co2_reduction_target,
            used_fallback: false,
            objective: value(&expressions.economic_cost()),
            raw_objective: solution.objective_value,
            layer_costs,
            sourcing_cost: value(&expressions.sourcing_cost),
            crossdock_handling_cost: value(&expressions.crossdock_handling_cost),
            dc_handling_cost: value(&expressions.dc_handling_cost),
            lastmile_cost: value(&expressions.lastmile_cost),
            co2_manufacturing_cost: value(&expressions.co2_manufacturing_cost),
            co2_new_location_cost: value(&expressions.co2_new_location_cost),
            new_location_fixed_cost: value(&expressions.new_location_fixed_cost),
            new_location_production_cost: value(&expressions.new_location_production_cost),
            emissions,
            demand,
            opened_locations,
            unmet_by_retailer,
            flows,
            variables,
        }
    }

    pub fn layer_cost(&self, layer: Layer) -> LayerCosts {
        self.layer_costs.get(&layer).cloned().unwrap_or_default()
    }

    /// Flat KPI mapping, in a stable order
    pub fn kpis(&self) -> Vec<(String, f64)> {
        let mut kpis = vec![
            ("objective".to_string(), self.objective),
            ("raw_objective".to_string(), self.raw_objective),
        ];
        for layer in Layer::ALL {
            kpis.push((
                format!("transport_{}", layer.key()),
                self.layer_cost(layer).transport,
            ));
        }
        for layer in Layer::ALL {
            kpis.push((
                format!("inventory_{}", layer.key()),
                self.layer_cost(layer).inventory,
            ));
        }
        kpis.extend([
            ("sourcing".to_string(), self.sourcing_cost),
            ("handling_crossdock".to_string(), self.crossdock_handling_cost),
            ("handling_dc".to_string(), self.dc_handling_cost),
            ("lastmile".to_string(), self.lastmile_cost),
            ("co2_manufacturing_cost".to_string(), self.co2_manufacturing_cost),
            ("co2_new_location_cost".to_string(), self.co2_new_location_cost),
            ("new_location_fixed_cost".to_string(), self.new_location_fixed_cost),
            (
                "new_location_production_cost".to_string(),
                self.new_location_production_cost,
            ),
        ]);
        for (mode, tons) in &self.emissions.by_mode {
            kpis.push((format!("emissions_{}", mode), *tons));
        }
        kpis.extend([
            (
                "emissions_production".to_string(),
                self.emissions.plant_production + self.emissions.new_location_production,
            ),
            ("emissions_lastmile".to_string(), self.emissions.lastmile),
            ("emissions_total".to_string(), self.emissions.total),
            ("emission_cap".to_string(), self.emissions.cap),
            ("demand_total".to_string(), self.demand.total),
            ("demand_satisfied".to_string(), self.demand.satisfied),
            ("demand_unmet".to_string(), self.demand.unmet),
            ("demand_satisfied_pct".to_string(), self.demand.satisfied_pct),
            (
                "new_locations_opened".to_string(),
                self.opened_locations.len() as f64,
            ),
        ]);
        kpis
    }

    /// Sum of the delivered flows of a layer
    pub fn layer_volume(&self, layer: Layer) -> f64 {
        self.flows
            .iter()
            .filter(|flow| flow.layer == layer)
            .map(|flow| flow.units)
            .sum()
    }
}

/// Result of running one scenario
#[derive(Debug)]
pub enum ScenarioOutcome {
    Optimal(Box<ScenarioReport>),
    /// The solver finished without a proven optimum
    NonOptimal(OptimizationStatus),
    /// The solver could not be run
    Error(anyhow::Error),
}

impl ScenarioOutcome {
    pub fn report(&self) -> Option<&ScenarioReport> {
        match self {
            ScenarioOutcome::Optimal(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, ScenarioOutcome::Optimal(_))
    }

    /// Short status label used in tables and CSV rows
    pub fn status(&self) -> String {
        match self {
            ScenarioOutcome::Optimal(report) if report.used_fallback => {
                "optimal (unmet demand allowed)".to_string()
            }
            ScenarioOutcome::Optimal(_) => "optimal".to_string(),
            ScenarioOutcome::NonOptimal(status) => status.to_string(),
            ScenarioOutcome::Error(err) => format!("error: {}", err),
        }
    }

    /// The report, or an error for every other outcome
    pub fn into_result(self) -> anyhow::Result<ScenarioReport> {
        match self {
            ScenarioOutcome::Optimal(report) => Ok(*report),
            ScenarioOutcome::NonOptimal(status) => {
                warn!("solver finished with status: {}", status);
                Err(AppError::Infeasible.into())
            }
            ScenarioOutcome::Error(err) => Err(err),
        }
    }
}

/// Assemble, solve and extract a resolved scenario
pub fn solve_scenario(scenario: &Scenario) -> ScenarioOutcome {
    let model = NetworkModel::assemble(scenario, lp_model_builder!(SupplyNetwork));

    let solution = match model.builder.solve() {
        Ok(solution) => solution,
        Err(err) => return ScenarioOutcome::Error(err),
    };

    if !solution.status.is_optimal() {
        info!("scenario '{}': {}", scenario.name, solution.status);
        return ScenarioOutcome::NonOptimal(solution.status);
    }

    let report = ScenarioReport::extract(scenario, &model, &solution);
    info!(
        "scenario '{}': objective {:.2}, emissions {:.2} t, {:.1}% of demand satisfied",
        scenario.name,
        report.objective,
        report.emissions.total,
        report.demand.satisfied_pct * 100.0
    );
    ScenarioOutcome::Optimal(Box::new(report))
}

/// Resolve and solve a request
pub fn run_scenario(request: &ScenarioRequest) -> Result<ScenarioOutcome, ConfigError> {
    let scenario = request.resolve()?;
    Ok(solve_scenario(&scenario))
}

/// Solve a request, retrying with shortfall allowed when exact demand cannot be met.
///
/// The retry answers "how much demand can be satisfied at all"; its report is marked
/// with `used_fallback`.
pub fn run_with_fallback(request: &ScenarioRequest) -> Result<ScenarioOutcome, ConfigError> {
    let outcome = run_scenario(request)?;
    if !matches!(outcome, ScenarioOutcome::NonOptimal(_)) || request.allows_unmet_demand() {
        return Ok(outcome);
    }

    warn!("exact demand cannot be met, retrying with unmet demand allowed");
    Ok(match run_scenario(&request.with_unmet_demand())? {
        ScenarioOutcome::Optimal(mut report) => {
            report.used_fallback = true;
            ScenarioOutcome::Optimal(report)
        }
        other => other,
    })
}

/// Command-line arguments for the solve command.
#[derive(Parser, Debug)]
pub struct SolveArgs {
    /// JSON scenario request (default: the reference network)
    pub input: Option<PathBuf>,

    /// CO2 reduction target in [0, 1], overriding the request
    #[clap(short('t'), long)]
    pub target: Option<f64>,

    /// Allow unmet demand when the exact-demand model is infeasible
    #[clap(long)]
    pub fallback: bool,

    /// Output report file (default: stdout)
    #[clap(long)]
    pub rpt: Option<PathBuf>,

    /// Output CSV file with KPIs and variable values
    #[clap(long)]
    pub csv: Option<PathBuf>,

    /// Output JSON file with the full result
    #[clap(long)]
    pub json: Option<PathBuf>,
}

/// Solve one scenario and write its results.
///
/// CSV and JSON outputs are written whatever the solver status; a scenario without an
/// optimal solution is an error.
pub fn solve_main(args: SolveArgs) -> Result<()> {
    let SolveArgs {
        input,
        target,
        fallback,
        ref rpt,
        ref csv,
        ref json,
    } = args;

    let mut request = read_request(input.as_deref())?;
    if let Some(target) = target {
        request = request.with_co2_reduction_target(target);
    }
    let scenario = request.resolve()?;

    let outcome = if fallback {
        run_with_fallback(&request)?
    } else {
        solve_scenario(&scenario)
    };

    if let Some(output) = csv {
        let row = ResultRow::new(&scenario.name, scenario.co2_reduction_target, &outcome);
        report::write_csv(BufWriter::new(fs::File::create(output)?), &[row])?;
    }

    let point = SweepPoint {
        target: scenario.co2_reduction_target,
        outcome,
    };
    if let Some(output) = json {
        report::write_json(
            BufWriter::new(fs::File::create(output)?),
            std::slice::from_ref(&point),
        )?;
    }

    let result = point.outcome.into_result()?;
    let mut writer = output_writer(rpt.as_deref())?;
    report::write_report(&mut writer, &result)?;
    writer.flush()?;

    Ok(())
}
