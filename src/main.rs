use anyhow::Result;
use clap::Parser;
use supplynet::{CLIArguments, solve_main, sweep_main, template_main};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CLIArguments::parse();

    match args {
        CLIArguments::Solve(args) => solve_main(args),
        CLIArguments::Sweep(args) => sweep_main(args),
        CLIArguments::Template(args) => template_main(args),
    }
}
