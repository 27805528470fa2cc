use good_lp::{Expression, Variable};

use crate::error::SizingError;

/// Irradiance is given in W/m², generation in kWh.
pub const W_TO_KW: f64 = 0.001;

/// Array size as seen by the model: a parameter, or the decision variable that
/// replaces it when the array is sized by the optimiser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArraySize {
    Fixed(f64),
    Decision(Variable),
}

/// Energy produced by one m² of array during one timestep, kWh.
pub fn generation_per_unit_area(irradiance: f64, solar_efficiency: f64, timestep_hours: f64) -> f64 {
    irradiance * timestep_hours * solar_efficiency * W_TO_KW
}

/// Checks that both series describe the same non-empty horizon of valid samples.
pub fn check_horizon(irradiance: &[f64], demand: &[f64]) -> Result<usize, SizingError> {
    if irradiance.len() != demand.len() {
        return Err(SizingError::DimensionMismatch {
            irradiance: irradiance.len(),
            demand: demand.len(),
        });
    }
    if demand.is_empty() {
        return Err(SizingError::EmptyHorizon);
    }
    for (series, values) in [("irradiance", irradiance), ("demand", demand)] {
        if let Some((timestep, &value)) = values
            .iter()
            .enumerate()
            .find(|&(_, &v)| !(v.is_finite() && v >= 0.0))
        {
            return Err(SizingError::InvalidSample {
                series,
                timestep,
                value,
            });
        }
    }
    Ok(demand.len())
}

/// Derives the generation of every timestep.
///
/// With a fixed array every expression is a constant. With a sized array each one is
/// `generation_per_unit_area(t) * array_size`.
pub fn derive_generation(
    irradiance: &[f64],
    demand: &[f64],
    array_size: ArraySize,
    solar_efficiency: f64,
    timestep_hours: f64,
) -> Result<Vec<Expression>, SizingError> {
    check_horizon(irradiance, demand)?;

    Ok(irradiance
        .iter()
        .map(|&sample| {
            let per_m2 = generation_per_unit_area(sample, solar_efficiency, timestep_hours);
            match array_size {
                ArraySize::Fixed(size) => Expression::from(per_m2 * size),
                ArraySize::Decision(var) => per_m2 * var,
            }
        })
        .collect())
}
