//! Command line interface.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::general::config::{OptimisationObjective, SizingConfig};
use crate::general::{inputs, output, plot};
use crate::sizing::sweep::{SweepGrid, run_sweep};
use crate::sizing::{GoodLpSolver, SizingResults, SolverEngine, run_sizing};

#[derive(Parser)]
#[command(name = "pv-battery-opt", author, version, propagate_version = true)]
#[command(about = "Size a solar array and battery so that a demand profile is always met")]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub logging_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a single sizing optimisation and export its results
    Run(RunArgs),

    /// Minimise the battery capacity over a grid of array sizes, degradation rates and
    /// initial capacities
    Sweep(SweepArgs),
}

/// LP engine choices accepted by `--solver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SolverArg {
    Clarabel,
    /// Needs the `highs` cargo feature
    Highs,
    /// Needs the `scip` cargo feature
    Scip,
}

impl From<SolverArg> for SolverEngine {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Clarabel => SolverEngine::Clarabel,
            SolverArg::Highs => SolverEngine::Highs,
            SolverArg::Scip => SolverEngine::Scip,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// CSV with `date_time` and `solar_irradiance (W/m)` columns
    #[arg(long)]
    pub solar_irradiance_path: PathBuf,

    /// CSV with `date_time` and `consumption_kwh` columns
    #[arg(long)]
    pub energy_demand_profile_path: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_path: PathBuf,

    /// TOML file with sizing parameters; command line values take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SolverArg::Clarabel)]
    pub solver: SolverArg,
}

/// Sizing parameters that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct SizingOverrides {
    /// Array area in m², required when minimising the battery capacity
    #[arg(long)]
    pub solar_array_size: Option<f64>,

    /// Stored energy at the first timestep, kWh
    #[arg(long)]
    pub initial_battery_capacity: Option<f64>,

    /// Fraction of stored energy lost per timestep
    #[arg(long)]
    pub battery_degradation_rate: Option<f64>,

    #[arg(long, value_enum)]
    pub optimisation_objective: Option<OptimisationObjective>,

    /// £/kWh
    #[arg(long)]
    pub battery_capex: Option<f64>,

    /// £/m²
    #[arg(long)]
    pub solar_capex: Option<f64>,

    #[arg(long)]
    pub solar_efficiency: Option<f64>,

    #[arg(long)]
    pub timestep_hours: Option<f64>,
}

impl SizingOverrides {
    pub fn apply(&self, config: &mut SizingConfig) {
        if self.solar_array_size.is_some() {
            config.solar_array_size = self.solar_array_size;
        }
        if let Some(value) = self.initial_battery_capacity {
            config.initial_battery_capacity = value;
        }
        if let Some(value) = self.battery_degradation_rate {
            config.battery_degradation_rate = value;
        }
        if let Some(value) = self.optimisation_objective {
            config.optimisation_objective = value;
        }
        if self.battery_capex.is_some() {
            config.battery_capex = self.battery_capex;
        }
        if self.solar_capex.is_some() {
            config.solar_capex = self.solar_capex;
        }
        if let Some(value) = self.solar_efficiency {
            config.solar_efficiency = value;
        }
        if let Some(value) = self.timestep_hours {
            config.timestep_hours = value;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(flatten)]
    pub sizing: SizingOverrides,

    /// Skip writing energy_flows.svg
    #[arg(long)]
    pub no_plot: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Comma-separated array sizes in m²
    #[arg(long, value_delimiter = ',')]
    pub solar_array_sizes: Option<Vec<f64>>,

    /// Comma-separated degradation rates
    #[arg(long, value_delimiter = ',')]
    pub degradation_rates: Option<Vec<f64>>,

    /// Comma-separated initial capacities in kWh
    #[arg(long, value_delimiter = ',')]
    pub initial_battery_capacities: Option<Vec<f64>>,

    #[arg(long)]
    pub solar_efficiency: Option<f64>,

    #[arg(long)]
    pub timestep_hours: Option<f64>,

    /// Parallel scenarios, defaults to the number of available cores
    #[arg(long)]
    pub workers: Option<usize>,
}

impl SweepArgs {
    pub fn grid(&self) -> SweepGrid {
        let default = SweepGrid::default();
        SweepGrid {
            solar_array_sizes: self
                .solar_array_sizes
                .clone()
                .unwrap_or(default.solar_array_sizes),
            degradation_rates: self
                .degradation_rates
                .clone()
                .unwrap_or(default.degradation_rates),
            initial_battery_capacities: self
                .initial_battery_capacities
                .clone()
                .unwrap_or(default.initial_battery_capacities),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<SizingConfig> {
    match path {
        Some(path) => SizingConfig::from_toml_file(path),
        None => Ok(SizingConfig::default()),
    }
}

pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run(&args).map(|_| ()),
        Command::Sweep(args) => sweep(&args),
    }
}

/// Loads the inputs, solves once and writes the CSV (and plot) into the output directory.
pub fn run(args: &RunArgs) -> Result<SizingResults> {
    let mut config = load_config(args.inputs.config.as_deref())?;
    args.sizing.apply(&mut config);
    tracing::info!(?config, "Starting optimisation");

    let inputs = inputs::load_inputs(
        &args.inputs.solar_irradiance_path,
        &args.inputs.energy_demand_profile_path,
    )?;
    let solver = GoodLpSolver::new(args.inputs.solver.into());
    let results = run_sizing(&config, &inputs.irradiance, &inputs.demand, &solver)
        .context("Optimisation failed")?;

    let totals = results.totals();
    tracing::info!(
        demand_kwh = totals.demand,
        generation_kwh = totals.generation,
        curtailed_kwh = totals.curtailed,
        battery_to_house_kwh = totals.battery_to_house,
        "Energy totals"
    );

    output::export_results(&results, Some(inputs.timestamps.as_slice()), &args.inputs.output_path)?;
    if !args.no_plot {
        plot::export_plot(&results, &args.inputs.output_path)?;
    }
    Ok(results)
}

pub fn sweep(args: &SweepArgs) -> Result<()> {
    let mut config = load_config(args.inputs.config.as_deref())?;
    if let Some(value) = args.solar_efficiency {
        config.solar_efficiency = value;
    }
    if let Some(value) = args.timestep_hours {
        config.timestep_hours = value;
    }

    let inputs = inputs::load_inputs(
        &args.inputs.solar_irradiance_path,
        &args.inputs.energy_demand_profile_path,
    )?;
    let workers = args
        .workers
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get));
    let solver = GoodLpSolver::new(args.inputs.solver.into());

    let records = run_sweep(
        &config,
        &args.grid(),
        &inputs.irradiance,
        &inputs.demand,
        &solver,
        workers,
    )
    .context("Sensitivity sweep failed")?;
    output::export_sweep(&records, &args.inputs.output_path)?;
    Ok(())
}
