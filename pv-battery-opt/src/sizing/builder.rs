use good_lp::{Expression, Variable, constraint};

use crate::error::SizingError;
use crate::general::config::{SizingMode, SizingParameters};
use crate::sizing::generation::{ArraySize, check_horizon, derive_generation};
use crate::sizing::program::{LinearProgram, VariableKey};

pub const PV_TO_HOUSE: &str = "pv_to_house";
pub const PV_TO_BATTERY: &str = "pv_to_battery";
pub const BATTERY_TO_HOUSE: &str = "battery_to_house";
pub const STATE_OF_CHARGE: &str = "state_of_charge";
pub const BATTERY_DEGRADATION: &str = "battery_degradation";
pub const FINAL_STATE_OF_CHARGE: &str = "final_state_of_charge";
pub const BATTERY_CAPACITY: &str = "battery_capacity";
pub const SOLAR_ARRAY_SIZE: &str = "solar_array_size";

/// Handles of every variable declared by [`build_model`].
#[derive(Debug, Clone)]
pub struct ModelVariables {
    pub pv_to_house: Vec<Variable>,
    pub pv_to_battery: Vec<Variable>,
    pub battery_to_house: Vec<Variable>,
    /// Stored energy at the start of each timestep.
    pub state_of_charge: Vec<Variable>,
    pub battery_degradation: Vec<Variable>,
    /// Stored energy after the last timestep.
    pub final_state_of_charge: Variable,
    pub battery_capacity: Variable,
    pub array_size: ArraySize,
}

impl ModelVariables {
    pub fn horizon(&self) -> usize {
        self.state_of_charge.len()
    }
}

/// A built model: the linear program plus what is needed to read a solution back.
#[derive(Debug, Clone)]
pub struct SizingModel {
    pub program: LinearProgram,
    pub variables: ModelVariables,
    pub demand: Vec<f64>,
    pub generation: Vec<Expression>,
    pub parameters: SizingParameters,
}

/// Declares all decision variables and emits the energy balance and storage constraints.
///
/// The state of charge at `t` is the energy stored when step `t` starts; the flows of
/// step `t` carry it to `t + 1`. The first step is pinned to the initial capacity and
/// the step after the horizon is held in `final_state_of_charge`.
pub fn build_model(
    irradiance: &[f64],
    demand: &[f64],
    parameters: &SizingParameters,
) -> Result<SizingModel, SizingError> {
    let horizon = check_horizon(irradiance, demand)?;
    let mut program = LinearProgram::new();

    let battery_capacity = program.add_variable(VariableKey::scalar(BATTERY_CAPACITY));
    let array_size = match parameters.mode {
        SizingMode::MinimiseBatteryCapacity { solar_array_size } => {
            ArraySize::Fixed(solar_array_size)
        }
        SizingMode::MinimiseTotalCapex { .. } => {
            ArraySize::Decision(program.add_variable(VariableKey::scalar(SOLAR_ARRAY_SIZE)))
        }
    };
    let final_state_of_charge = program.add_variable(VariableKey::scalar(FINAL_STATE_OF_CHARGE));

    let mut pv_to_house = Vec::with_capacity(horizon);
    let mut pv_to_battery = Vec::with_capacity(horizon);
    let mut battery_to_house = Vec::with_capacity(horizon);
    let mut state_of_charge = Vec::with_capacity(horizon);
    let mut battery_degradation = Vec::with_capacity(horizon);
    for t in 0..horizon {
        pv_to_house.push(program.add_variable(VariableKey::at(PV_TO_HOUSE, t)));
        pv_to_battery.push(program.add_variable(VariableKey::at(PV_TO_BATTERY, t)));
        battery_to_house.push(program.add_variable(VariableKey::at(BATTERY_TO_HOUSE, t)));
        state_of_charge.push(program.add_variable(VariableKey::at(STATE_OF_CHARGE, t)));
        battery_degradation.push(program.add_variable(VariableKey::at(BATTERY_DEGRADATION, t)));
    }

    let variables = ModelVariables {
        pv_to_house,
        pv_to_battery,
        battery_to_house,
        state_of_charge,
        battery_degradation,
        final_state_of_charge,
        battery_capacity,
        array_size,
    };

    let generation = derive_generation(
        irradiance,
        demand,
        array_size,
        parameters.solar_efficiency,
        parameters.timestep_hours,
    )?;

    add_fixed_constraints(&mut program, &variables, parameters);
    add_time_dependent_constraints(
        &mut program,
        &variables,
        demand,
        &generation,
        parameters.battery_degradation_rate,
    );

    tracing::debug!(
        timesteps = horizon,
        variables = program.num_variables(),
        constraints = program.constraints().len(),
        "Built sizing model"
    );

    Ok(SizingModel {
        program,
        variables,
        demand: demand.to_vec(),
        generation,
        parameters: *parameters,
    })
}

/// Boundary constraints of the horizon: the initial state and the state after the last step.
fn add_fixed_constraints(
    program: &mut LinearProgram,
    vars: &ModelVariables,
    parameters: &SizingParameters,
) {
    let last = vars.horizon() - 1;

    program.add_constraint(
        "initial_state_of_charge",
        constraint!(vars.state_of_charge[0] == parameters.initial_battery_capacity),
    );
    program.add_constraint(
        "final_state_of_charge_balance",
        constraint!(vars.final_state_of_charge == stored_after(vars, last)),
    );
    program.add_constraint(
        "final_capacity_limit",
        constraint!(vars.final_state_of_charge <= vars.battery_capacity),
    );
}

fn add_time_dependent_constraints(
    program: &mut LinearProgram,
    vars: &ModelVariables,
    demand: &[f64],
    generation: &[Expression],
    degradation_rate: f64,
) {
    for t in 0..vars.horizon() {
        program.add_constraint(
            format!("demand_met[{t}]"),
            constraint!(vars.battery_to_house[t] + vars.pv_to_house[t] >= demand[t]),
        );

        program.add_constraint(
            format!("generation_limit[{t}]"),
            constraint!(vars.pv_to_battery[t] + vars.pv_to_house[t] <= generation[t].clone()),
        );

        program.add_constraint(
            format!("degradation[{t}]"),
            constraint!(vars.battery_degradation[t] == degradation_rate * vars.state_of_charge[t]),
        );

        // t = 0 is pinned by initial_state_of_charge
        if t > 0 {
            program.add_constraint(
                format!("state_of_charge_balance[{t}]"),
                constraint!(vars.state_of_charge[t] == stored_after(vars, t - 1)),
            );
        }

        program.add_constraint(
            format!("capacity_limit[{t}]"),
            constraint!(vars.state_of_charge[t] <= vars.battery_capacity),
        );
    }
}

/// Energy left in the battery once step `t` is over.
fn stored_after(vars: &ModelVariables, t: usize) -> Expression {
    vars.state_of_charge[t] + vars.pv_to_battery[t]
        - vars.battery_to_house[t]
        - vars.battery_degradation[t]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::config::SizingMode;
    use crate::sizing::program::coefficient;
    use approx::assert_relative_eq;
    use good_lp::IntoAffineExpression;

    fn parameters(mode: SizingMode) -> SizingParameters {
        SizingParameters {
            initial_battery_capacity: 2.0,
            battery_degradation_rate: 0.01,
            solar_efficiency: 0.2,
            timestep_hours: 0.5,
            mode,
        }
    }

    fn battery_mode() -> SizingMode {
        SizingMode::MinimiseBatteryCapacity {
            solar_array_size: 10.0,
        }
    }

    fn capex_mode() -> SizingMode {
        SizingMode::MinimiseTotalCapex {
            solar_capex: 100.0,
            battery_capex: 100.0,
        }
    }

    #[test]
    fn test_declares_one_variable_set_per_timestep() {
        let model = build_model(&[1.0; 10], &[1.0; 10], &parameters(battery_mode())).unwrap();
        let vars = &model.variables;

        assert_eq!(vars.pv_to_house.len(), 10);
        assert_eq!(vars.pv_to_battery.len(), 10);
        assert_eq!(vars.battery_to_house.len(), 10);
        assert_eq!(vars.state_of_charge.len(), 10);
        assert_eq!(vars.battery_degradation.len(), 10);
        assert_eq!(vars.array_size, ArraySize::Fixed(10.0));
        // five per timestep plus capacity and final state
        assert_eq!(model.program.num_variables(), 52);
        assert_eq!(model.program.problem().len(), 52);
        assert_eq!(model.program.variable(SOLAR_ARRAY_SIZE, None), None);
        assert_eq!(
            model.program.variable(STATE_OF_CHARGE, Some(4)),
            Some(vars.state_of_charge[4])
        );

        for (_, definition) in model.program.problem().iter_variables_with_def() {
            assert_eq!(definition.get_min(), 0.0, "{}", definition.get_name());
        }
    }

    #[test]
    fn test_capex_mode_declares_the_array_size() {
        let model = build_model(&[1.0; 4], &[1.0; 4], &parameters(capex_mode())).unwrap();
        let size = model.program.variable(SOLAR_ARRAY_SIZE, None).unwrap();

        assert_eq!(model.variables.array_size, ArraySize::Decision(size));
        assert_eq!(model.program.num_variables(), 4 * 5 + 3);
        // 1 W/m² * 0.5 h * 0.2 * 0.001
        let limit = model.program.constraint("generation_limit[0]").unwrap();
        assert_relative_eq!(coefficient(limit.expression(), size), -1e-4);
    }

    #[test]
    fn test_emits_every_constraint() {
        let horizon = 6;
        let model = build_model(&[1.0; 6], &[1.0; 6], &parameters(battery_mode())).unwrap();
        let program = &model.program;

        // four per timestep, a balance for every step but the first, and three boundary ones
        assert_eq!(program.constraints().len(), 4 * horizon + (horizon - 1) + 3);
        for t in 0..horizon {
            for name in ["demand_met", "generation_limit", "degradation", "capacity_limit"] {
                assert!(program.constraint(&format!("{name}[{t}]")).is_some(), "{name}[{t}]");
            }
        }
        assert!(program.constraint("state_of_charge_balance[0]").is_none());
        for t in 1..horizon {
            assert!(
                program
                    .constraint(&format!("state_of_charge_balance[{t}]"))
                    .is_some()
            );
        }
        assert!(program.objective().is_none());
    }

    #[test]
    fn test_initial_state_of_charge_is_pinned() {
        let model = build_model(&[1.0; 3], &[1.0; 3], &parameters(battery_mode())).unwrap();
        let initial = model.program.constraint("initial_state_of_charge").unwrap();

        // state_of_charge[0] - 2 == 0
        assert!(initial.is_equality());
        assert_eq!(initial.expression().constant(), -2.0);
        assert_eq!(
            coefficient(initial.expression(), model.variables.state_of_charge[0]),
            1.0
        );
    }

    #[test]
    fn test_demand_is_a_lower_bound_on_delivery() {
        let model = build_model(&[1.0; 3], &[0.5, 0.7, 0.2], &parameters(battery_mode())).unwrap();
        let vars = &model.variables;
        let demand_met = model.program.constraint("demand_met[1]").unwrap();
        let e = demand_met.expression();

        // 0.7 - battery_to_house[1] - pv_to_house[1] <= 0
        assert!(!demand_met.is_equality());
        assert_relative_eq!(e.constant(), 0.7);
        assert_eq!(coefficient(e, vars.battery_to_house[1]), -1.0);
        assert_eq!(coefficient(e, vars.pv_to_house[1]), -1.0);
        assert_eq!(coefficient(e, vars.pv_to_battery[1]), 0.0);
    }

    #[test]
    fn test_state_of_charge_balance_references_previous_step() {
        let model = build_model(&[1.0; 3], &[1.0; 3], &parameters(battery_mode())).unwrap();
        let vars = &model.variables;
        let balance = model.program.constraint("state_of_charge_balance[2]").unwrap();
        let e = balance.expression();

        assert!(balance.is_equality());
        assert_eq!(e.constant(), 0.0);
        assert_eq!(coefficient(e, vars.state_of_charge[2]), 1.0);
        assert_eq!(coefficient(e, vars.state_of_charge[1]), -1.0);
        assert_eq!(coefficient(e, vars.pv_to_battery[1]), -1.0);
        assert_eq!(coefficient(e, vars.battery_to_house[1]), 1.0);
        assert_eq!(coefficient(e, vars.battery_degradation[1]), 1.0);
        assert_eq!(coefficient(e, vars.pv_to_battery[2]), 0.0);

        let degradation = model.program.constraint("degradation[1]").unwrap();
        assert_eq!(
            coefficient(degradation.expression(), vars.state_of_charge[1]),
            -0.01
        );
    }

    #[test]
    fn test_demand_and_generation_are_mode_independent() {
        let irradiance = [0.0, 400.0, 800.0];
        let demand = [0.5, 0.7, 0.2];
        let a = build_model(&irradiance, &demand, &parameters(battery_mode())).unwrap();
        let b = build_model(&irradiance, &demand, &parameters(capex_mode())).unwrap();

        assert_eq!(a.demand, b.demand);
        let size = b.program.variable(SOLAR_ARRAY_SIZE, None).unwrap();
        for t in 0..3 {
            let fixed = a.generation[t].constant();
            let per_m2 = coefficient(&b.generation[t], size);
            assert_relative_eq!(fixed, per_m2 * 10.0);
        }
    }

    #[test]
    fn test_mismatched_series_fail_before_building() {
        let err = build_model(&[1.0; 3], &[1.0; 4], &parameters(battery_mode())).unwrap_err();
        assert_eq!(
            err,
            SizingError::DimensionMismatch {
                irradiance: 3,
                demand: 4
            }
        );
    }
}
