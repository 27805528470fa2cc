use std::fmt;
use std::time::Duration;

use good_lp::Variable;
use serde::Serialize;

use crate::error::SizingError;
use crate::general::config::OptimisationObjective;
use crate::sizing::builder::SizingModel;
use crate::sizing::generation::ArraySize;
use crate::sizing::solver::SolveOutcome;

/// Relative tolerance used when re-checking a solution: a relation holds when its
/// violation is at most `FEASIBILITY_TOLERANCE * max(1, |lhs|, |rhs|)`.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Solved energy flows of one timestep, kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultRow {
    pub timestep: usize,
    pub pv_to_house: f64,
    pub pv_to_battery: f64,
    pub battery_to_house: f64,
    pub state_of_charge: f64,
    pub battery_degradation: f64,
    pub generation: f64,
    pub demand: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyTotals {
    pub pv_to_house: f64,
    pub pv_to_battery: f64,
    pub battery_to_house: f64,
    pub battery_degradation: f64,
    pub generation: f64,
    pub demand: f64,
    /// Generation that was neither used by the house nor stored.
    pub curtailed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::LessOrEqual => "<=",
            Sense::GreaterOrEqual => ">=",
            Sense::Equal => "==",
        })
    }
}

/// A relation of the model that the extracted values do not satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    pub relation: &'static str,
    pub timestep: Option<usize>,
    pub lhs: f64,
    pub sense: Sense,
    pub rhs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingResults {
    pub rows: Vec<ResultRow>,
    pub battery_capacity: f64,
    pub solar_array_size: f64,
    pub final_state_of_charge: f64,
    pub objective: OptimisationObjective,
    pub objective_value: f64,
    pub solve_time: Duration,
    pub initial_battery_capacity: f64,
    pub battery_degradation_rate: f64,
}

/// Reads the solved values of an optimal outcome back into per-timestep rows.
pub fn extract_results(
    model: &SizingModel,
    outcome: &SolveOutcome,
) -> Result<SizingResults, SizingError> {
    let assignment = match outcome {
        SolveOutcome::Optimal(assignment) => assignment,
        other => {
            return Err(SizingError::Extraction(format!(
                "solver outcome is {}, only optimal solutions carry values",
                other.status()
            )));
        }
    };
    if let Some((key, _)) = model
        .program
        .variables()
        .find(|&(_, var)| assignment.value(var).is_none())
    {
        return Err(SizingError::Extraction(format!(
            "solution has no value for {key}"
        )));
    }

    let vars = &model.variables;
    let value = |var: Variable| assignment.values[&var];
    let objective = model
        .program
        .objective()
        .map(|objective| objective.kind)
        .unwrap_or_else(|| model.parameters.mode.objective());

    let rows = (0..vars.horizon())
        .map(|t| ResultRow {
            timestep: t,
            pv_to_house: value(vars.pv_to_house[t]),
            pv_to_battery: value(vars.pv_to_battery[t]),
            battery_to_house: value(vars.battery_to_house[t]),
            state_of_charge: value(vars.state_of_charge[t]),
            battery_degradation: value(vars.battery_degradation[t]),
            generation: model.generation[t].eval_with(&assignment.values),
            demand: model.demand[t],
        })
        .collect();

    let solar_array_size = match vars.array_size {
        ArraySize::Fixed(size) => size,
        ArraySize::Decision(var) => value(var),
    };

    Ok(SizingResults {
        rows,
        battery_capacity: value(vars.battery_capacity),
        solar_array_size,
        final_state_of_charge: value(vars.final_state_of_charge),
        objective,
        objective_value: assignment.objective_value,
        solve_time: assignment.solve_time,
        initial_battery_capacity: model.parameters.initial_battery_capacity,
        battery_degradation_rate: model.parameters.battery_degradation_rate,
    })
}

impl SizingResults {
    pub fn totals(&self) -> EnergyTotals {
        let mut totals = self
            .rows
            .iter()
            .fold(EnergyTotals::default(), |mut acc, row| {
                acc.pv_to_house += row.pv_to_house;
                acc.pv_to_battery += row.pv_to_battery;
                acc.battery_to_house += row.battery_to_house;
                acc.battery_degradation += row.battery_degradation;
                acc.generation += row.generation;
                acc.demand += row.demand;
                acc
            });
        totals.curtailed = (totals.generation - totals.pv_to_house - totals.pv_to_battery).max(0.0);
        totals
    }

    /// Re-checks every model relation on the extracted values and returns all violations.
    pub fn check_invariants(&self, tolerance: f64) -> Vec<InvariantViolation> {
        let mut checker = Checker {
            tolerance,
            violations: Vec::new(),
        };
        let capacity = self.battery_capacity;

        checker.check("non_negative", None, capacity, Sense::GreaterOrEqual, 0.0);
        checker.check("non_negative", None, self.solar_array_size, Sense::GreaterOrEqual, 0.0);
        checker.check(
            "non_negative",
            None,
            self.final_state_of_charge,
            Sense::GreaterOrEqual,
            0.0,
        );

        for (t, row) in self.rows.iter().enumerate() {
            let at = Some(t);
            for value in [
                row.pv_to_house,
                row.pv_to_battery,
                row.battery_to_house,
                row.state_of_charge,
                row.battery_degradation,
            ] {
                checker.check("non_negative", at, value, Sense::GreaterOrEqual, 0.0);
            }

            checker.check(
                "demand_met",
                at,
                row.battery_to_house + row.pv_to_house,
                Sense::GreaterOrEqual,
                row.demand,
            );
            checker.check(
                "generation_limit",
                at,
                row.pv_to_battery + row.pv_to_house,
                Sense::LessOrEqual,
                row.generation,
            );
            checker.check(
                "degradation",
                at,
                row.battery_degradation,
                Sense::Equal,
                self.battery_degradation_rate * row.state_of_charge,
            );
            checker.check(
                "capacity_limit",
                at,
                row.state_of_charge,
                Sense::LessOrEqual,
                capacity,
            );

            let next = self
                .rows
                .get(t + 1)
                .map_or(self.final_state_of_charge, |r| r.state_of_charge);
            checker.check(
                "state_of_charge_balance",
                Some(t + 1),
                next,
                Sense::Equal,
                row.state_of_charge + row.pv_to_battery
                    - row.battery_to_house
                    - row.battery_degradation,
            );
        }

        if let Some(first) = self.rows.first() {
            checker.check(
                "initial_state_of_charge",
                Some(0),
                first.state_of_charge,
                Sense::Equal,
                self.initial_battery_capacity,
            );
        }
        checker.check(
            "final_capacity_limit",
            None,
            self.final_state_of_charge,
            Sense::LessOrEqual,
            capacity,
        );

        checker.violations
    }
}

struct Checker {
    tolerance: f64,
    violations: Vec<InvariantViolation>,
}

impl Checker {
    fn check(
        &mut self,
        relation: &'static str,
        timestep: Option<usize>,
        lhs: f64,
        sense: Sense,
        rhs: f64,
    ) {
        let violation = match sense {
            Sense::LessOrEqual => lhs - rhs,
            Sense::GreaterOrEqual => rhs - lhs,
            Sense::Equal => (lhs - rhs).abs(),
        };
        let allowed = self.tolerance * 1f64.max(lhs.abs()).max(rhs.abs());
        if !(violation <= allowed) {
            self.violations.push(InvariantViolation {
                relation,
                timestep,
                lhs,
                sense,
                rhs,
            });
        }
    }
}
