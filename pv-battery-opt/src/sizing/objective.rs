use good_lp::Expression;

use crate::error::SizingError;
use crate::general::config::SizingMode;
use crate::sizing::builder::SizingModel;
use crate::sizing::generation::ArraySize;
use crate::sizing::program::Objective;

/// Builds the objective expression for `mode` over the variables of `model`.
pub fn objective_for(model: &SizingModel, mode: &SizingMode) -> Result<Objective, SizingError> {
    let capacity = model.variables.battery_capacity;

    let expression = match (mode, model.variables.array_size) {
        (SizingMode::MinimiseBatteryCapacity { .. }, ArraySize::Fixed(_)) => {
            Expression::from(capacity)
        }
        (
            SizingMode::MinimiseTotalCapex {
                solar_capex,
                battery_capex,
            },
            ArraySize::Decision(array_size),
        ) => *solar_capex * array_size + *battery_capex * capacity,
        (SizingMode::MinimiseBatteryCapacity { .. }, ArraySize::Decision(_)) => {
            return Err(SizingError::config(
                "the battery capacity objective needs a model built with a fixed array size",
            ));
        }
        (SizingMode::MinimiseTotalCapex { .. }, ArraySize::Fixed(_)) => {
            return Err(SizingError::config(
                "the capex objective needs a model built with the array size as a decision variable",
            ));
        }
    };

    Ok(Objective {
        kind: mode.objective(),
        expression,
    })
}

/// Attaches the objective of `mode` to the model.
///
/// Attaching the same objective twice leaves the model unchanged; attaching a different
/// one is a configuration error.
pub fn attach_objective(model: &mut SizingModel, mode: &SizingMode) -> Result<(), SizingError> {
    let objective = objective_for(model, mode)?;
    tracing::debug!(objective = %objective.kind, "Attaching objective");
    model.program.set_objective(objective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::config::{OptimisationObjective, SizingParameters};
    use crate::sizing::builder::build_model;
    use crate::sizing::program::coefficient;
    use good_lp::IntoAffineExpression;

    const BATTERY_MODE: SizingMode = SizingMode::MinimiseBatteryCapacity {
        solar_array_size: 10.0,
    };
    const CAPEX_MODE: SizingMode = SizingMode::MinimiseTotalCapex {
        solar_capex: 150.0,
        battery_capex: 300.0,
    };

    fn model(mode: SizingMode) -> SizingModel {
        let parameters = SizingParameters {
            initial_battery_capacity: 0.0,
            battery_degradation_rate: 0.01,
            solar_efficiency: 0.15,
            timestep_hours: 0.5,
            mode,
        };
        build_model(&[100.0; 4], &[0.1; 4], &parameters).unwrap()
    }

    #[test]
    fn test_battery_objective_is_the_capacity() {
        let mut model = model(BATTERY_MODE);
        attach_objective(&mut model, &BATTERY_MODE).unwrap();

        let objective = model.program.objective().unwrap();
        assert_eq!(objective.kind, OptimisationObjective::MinimiseBatteryCap);
        assert_eq!(
            coefficient(&objective.expression, model.variables.battery_capacity),
            1.0
        );
        assert_eq!((&objective.expression).linear_coefficients().into_iter().count(), 1);
        assert_eq!(objective.expression.constant(), 0.0);
    }

    #[test]
    fn test_capex_objective_weights_both_sizes() {
        let mut model = model(CAPEX_MODE);
        attach_objective(&mut model, &CAPEX_MODE).unwrap();

        let ArraySize::Decision(array_size) = model.variables.array_size else {
            panic!("array size should be a decision variable");
        };
        let objective = model.program.objective().unwrap();
        assert_eq!(objective.kind, OptimisationObjective::MinimiseBatteryAndSolarCost);
        assert_eq!(coefficient(&objective.expression, array_size), 150.0);
        assert_eq!(
            coefficient(&objective.expression, model.variables.battery_capacity),
            300.0
        );
    }

    #[test]
    fn test_attaching_twice_is_idempotent() {
        let mut model = model(BATTERY_MODE);
        attach_objective(&mut model, &BATTERY_MODE).unwrap();
        let first = model.program.objective().cloned();
        attach_objective(&mut model, &BATTERY_MODE).unwrap();
        assert_eq!(model.program.objective().cloned(), first);
    }

    #[test]
    fn test_mode_must_match_the_model() {
        let mut battery_model = model(BATTERY_MODE);
        assert!(matches!(
            attach_objective(&mut battery_model, &CAPEX_MODE),
            Err(SizingError::Configuration(_))
        ));
        assert!(battery_model.program.objective().is_none());

        let mut capex_model = model(CAPEX_MODE);
        assert!(matches!(
            attach_objective(&mut capex_model, &BATTERY_MODE),
            Err(SizingError::Configuration(_))
        ));
    }

    #[test]
    fn test_second_objective_is_rejected() {
        let mut model = model(CAPEX_MODE);
        attach_objective(&mut model, &CAPEX_MODE).unwrap();
        let other = SizingMode::MinimiseTotalCapex {
            solar_capex: 1.0,
            battery_capex: 1.0,
        };
        assert!(matches!(
            attach_objective(&mut model, &other),
            Err(SizingError::Configuration(_))
        ));
    }
}
