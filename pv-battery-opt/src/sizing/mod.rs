//! Linear-programming sizing of a solar array and battery.
//!
//! A run goes through the same steps in every mode: validate the configuration, derive
//! generation, build the model, attach the objective of the selected mode, solve once
//! and read the solution back.

pub mod builder;
pub mod generation;
pub mod objective;
pub mod program;
pub mod results;
pub mod solver;
pub mod sweep;

pub use builder::{SizingModel, build_model};
pub use objective::attach_objective;
pub use results::{FEASIBILITY_TOLERANCE, SizingResults, extract_results};
pub use solver::{GoodLpSolver, LpSolver, SolveOutcome, SolverEngine};

use crate::error::SizingError;
use crate::general::config::{SizingConfig, SizingParameters};

/// Validates `config` and runs one sizing optimisation.
pub fn run_sizing(
    config: &SizingConfig,
    irradiance: &[f64],
    demand: &[f64],
    solver: &impl LpSolver,
) -> Result<SizingResults, SizingError> {
    let parameters = config.validate()?;
    run_sizing_with_parameters(&parameters, irradiance, demand, solver)
}

/// Runs one sizing optimisation with already validated parameters.
pub fn run_sizing_with_parameters(
    parameters: &SizingParameters,
    irradiance: &[f64],
    demand: &[f64],
    solver: &impl LpSolver,
) -> Result<SizingResults, SizingError> {
    let mut model = build_model(irradiance, demand, parameters)?;
    attach_objective(&mut model, &parameters.mode)?;

    let outcome = solver.solve(&model.program);
    match &outcome {
        SolveOutcome::Optimal(_) => {}
        SolveOutcome::Infeasible => return Err(SizingError::Infeasible),
        SolveOutcome::Unbounded => return Err(SizingError::Unbounded),
        SolveOutcome::SolverFailure(reason) => {
            return Err(SizingError::SolverFailure(reason.clone()));
        }
    }

    let results = extract_results(&model, &outcome)?;
    let violations = results.check_invariants(FEASIBILITY_TOLERANCE);
    for violation in &violations {
        tracing::warn!(
            relation = violation.relation,
            timestep = ?violation.timestep,
            lhs = violation.lhs,
            rhs = violation.rhs,
            "Solution violates {} {} {}",
            violation.lhs,
            violation.sense,
            violation.rhs
        );
    }

    tracing::info!(
        objective = %results.objective,
        battery_capacity_kwh = results.battery_capacity,
        solar_array_size_m2 = results.solar_array_size,
        objective_value = results.objective_value,
        violations = violations.len(),
        "Optimisation finished"
    );
    Ok(results)
}
