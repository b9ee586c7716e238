//! Multi-echelon supply-chain network design under CO₂ caps.
//!
//! The network has four layers: plants ship to crossdocks, crossdocks and optional new
//! production locations ship to distribution centers, and distribution centers serve
//! retailers. Each layer can use a subset of the transport modes (air, sea, road).
//! Given a scenario, the crate builds a mixed-integer linear program that chooses the
//! flows and which new locations to open, minimising the total cost of transport,
//! inventory, sourcing, handling, last-mile delivery, CO₂ pricing and new facilities,
//! subject to demand, flow conservation, capacities and an emission cap.
//!
//! # Main Workflows
//!
//! 1. **Solve** ([`solve`]): resolve one scenario, solve it and report costs, emissions
//!    and flows
//! 2. **Sweep** ([`sweep`]): solve one scenario under a list of CO₂ reduction targets
//! 3. **Template**: print the reference scenario as an editable JSON request
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use supplynet::scenario::ScenarioRequest;
//! use supplynet::solve::run_scenario;
//!
//! let request = ScenarioRequest::reference().with_co2_reduction_target(0.3);
//! let report = run_scenario(&request)?.into_result()?;
//! println!("total cost: {:.2}", report.objective);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **[`network`]**: modes, layers, distance matrices and the reference network
//! - **[`scenario`]**: scenario requests, events and their resolution
//! - **[`model`]**: the MILP formulation
//! - **[`solve`]** and **[`sweep`]**: running scenarios and reading results back
//! - **[`report`]**: text, CSV and JSON output
//! - **[`lp_solver`]**: linear programming solver abstraction layer

use std::{
    error::Error,
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::Parser;

pub mod lp_solver;
pub mod model;
pub mod network;
pub mod report;
pub mod scenario;
pub mod solve;
pub mod sweep;

pub use network::Symbol;
pub use scenario::{Scenario, ScenarioRequest};
pub use solve::{SolveArgs, solve_main};
pub use sweep::{SweepArgs, sweep_main};

/// Application-level errors.
#[derive(Debug, PartialEq, Eq)]
pub enum AppError {
    /// The network cannot meet its demand under the given constraints.
    Infeasible,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Infeasible => write!(f, "Problem Infeasible"),
        }
    }
}

impl Error for AppError {}

/// Reads a scenario request, or the reference network when no file is given.
pub fn read_request(file_name: Option<&Path>) -> Result<ScenarioRequest> {
    match file_name {
        Some(path) => ScenarioRequest::load(path),
        None => Ok(ScenarioRequest::reference()),
    }
}

/// Opens `path` for writing, or stdout.
pub(crate) fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(io::BufWriter::new(fs::File::create(path)?)),
        None => Box::new(io::stdout()),
    })
}

/// Command-line arguments for the template command.
#[derive(Parser, Debug)]
pub struct TemplateArgs {
    /// Output JSON file (default: stdout)
    #[clap(long, short)]
    pub output: Option<PathBuf>,
}

/// Write the reference scenario as a JSON request.
pub fn template_main(args: TemplateArgs) -> Result<()> {
    let mut writer = output_writer(args.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &ScenarioRequest::reference())?;
    writeln!(writer)?;
    Ok(())
}

/// Command-line interface arguments for the network design tools.
#[derive(Debug, Parser)]
#[clap(
    name = "supplynet",
    about = "Supply-chain network design with CO2 caps"
)]
pub enum CLIArguments {
    /// Solve one scenario and report costs, emissions and flows.
    Solve(SolveArgs),
    /// Solve one scenario under a series of CO2 reduction targets.
    Sweep(SweepArgs),
    /// Print the reference scenario as a JSON request to start from.
    Template(TemplateArgs),
}
