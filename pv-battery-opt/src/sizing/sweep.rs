//! Sensitivity sweep over array size, degradation rate and initial charge.
//!
//! Every grid point is an independent battery-capacity optimisation; scenarios share
//! only the input series and run on a dedicated rayon pool.

use rayon::prelude::*;
use serde::Serialize;

use crate::error::SizingError;
use crate::general::config::{OptimisationObjective, SizingConfig};
use crate::sizing::{LpSolver, run_sizing};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub solar_array_sizes: Vec<f64>,
    pub degradation_rates: Vec<f64>,
    pub initial_battery_capacities: Vec<f64>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            solar_array_sizes: (1..10).map(|i| f64::from(i) * 500.0).collect(),
            degradation_rates: vec![0.001, 0.005, 0.01, 0.015, 0.02],
            initial_battery_capacities: (0..5).map(|i| f64::from(i) * 5.0).collect(),
        }
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepScenario {
    pub solar_array_size: f64,
    pub battery_degradation_rate: f64,
    pub initial_battery_capacity: f64,
}

impl SweepGrid {
    /// All grid points, array size outermost and initial capacity innermost.
    pub fn scenarios(&self) -> Vec<SweepScenario> {
        let mut scenarios = Vec::with_capacity(self.len());
        for &solar_array_size in &self.solar_array_sizes {
            for &battery_degradation_rate in &self.degradation_rates {
                for &initial_battery_capacity in &self.initial_battery_capacities {
                    scenarios.push(SweepScenario {
                        solar_array_size,
                        battery_degradation_rate,
                        initial_battery_capacity,
                    });
                }
            }
        }
        scenarios
    }

    pub fn len(&self) -> usize {
        self.solar_array_sizes.len()
            * self.degradation_rates.len()
            * self.initial_battery_capacities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one scenario, one row of `sensitivity_analysis.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRecord {
    pub solar_array_size: f64,
    pub battery_degradation_rate: f64,
    pub initial_battery_capacity: f64,
    /// Empty when the scenario failed.
    pub battery_capacity: Option<f64>,
    pub status: &'static str,
}

/// Solves every scenario of `grid` with `base` as the template configuration.
///
/// Scenario failures are recorded in the returned rows; only an unusable grid or
/// worker pool fails the sweep.
pub fn run_sweep<S: LpSolver + Sync>(
    base: &SizingConfig,
    grid: &SweepGrid,
    irradiance: &[f64],
    demand: &[f64],
    solver: &S,
    workers: usize,
) -> Result<Vec<SweepRecord>, SizingError> {
    if grid.is_empty() {
        return Err(SizingError::config("sweep grid has no scenarios"));
    }
    if workers == 0 {
        return Err(SizingError::config("sweep needs at least one worker"));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| SizingError::config(format!("failed to start sweep workers: {e}")))?;

    let scenarios = grid.scenarios();
    tracing::info!(
        scenarios = scenarios.len(),
        workers,
        "Running sensitivity sweep"
    );

    let records: Vec<SweepRecord> = pool.install(|| {
        scenarios
            .par_iter()
            .map(|scenario| solve_scenario(base, scenario, irradiance, demand, solver))
            .collect()
    });

    let failed = records.iter().filter(|r| r.battery_capacity.is_none()).count();
    if failed > 0 {
        tracing::warn!(failed, total = records.len(), "Some sweep scenarios failed");
    }
    Ok(records)
}

fn solve_scenario(
    base: &SizingConfig,
    scenario: &SweepScenario,
    irradiance: &[f64],
    demand: &[f64],
    solver: &impl LpSolver,
) -> SweepRecord {
    let config = SizingConfig {
        solar_array_size: Some(scenario.solar_array_size),
        battery_degradation_rate: scenario.battery_degradation_rate,
        initial_battery_capacity: scenario.initial_battery_capacity,
        optimisation_objective: OptimisationObjective::MinimiseBatteryCap,
        ..base.clone()
    };

    let (battery_capacity, status) = match run_sizing(&config, irradiance, demand, solver) {
        Ok(results) => (Some(results.battery_capacity), "optimal"),
        Err(e) => {
            tracing::debug!(?scenario, error = %e, "Sweep scenario failed");
            (None, e.status())
        }
    };

    SweepRecord {
        solar_array_size: scenario.solar_array_size,
        battery_degradation_rate: scenario.battery_degradation_rate,
        initial_battery_capacity: scenario.initial_battery_capacity,
        battery_capacity,
        status,
    }
}
