use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::SizingError;

/// Which quantity the optimiser minimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum OptimisationObjective {
    /// Fixed array size, minimise the battery capacity.
    #[default]
    #[value(name = "minimise_battery_cap")]
    #[serde(rename = "minimise_battery_cap")]
    MinimiseBatteryCap,
    /// Array size and battery capacity both free, minimise their combined capex.
    #[value(name = "minimise_battery_and_solar_cost")]
    #[serde(rename = "minimise_battery_and_solar_cost")]
    MinimiseBatteryAndSolarCost,
}

impl OptimisationObjective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinimiseBatteryCap => "minimise_battery_cap",
            Self::MinimiseBatteryAndSolarCost => "minimise_battery_and_solar_cost",
        }
    }
}

impl fmt::Display for OptimisationObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimisationObjective {
    type Err = SizingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "minimise_battery_cap" => Ok(Self::MinimiseBatteryCap),
            "minimise_battery_and_solar_cost" => Ok(Self::MinimiseBatteryAndSolarCost),
            other => Err(SizingError::config(format!(
                "unknown optimisation objective `{other}`"
            ))),
        }
    }
}

/// Scalar parameters of a sizing run.
///
/// Mode-specific fields are optional here and checked by [`SizingConfig::validate`],
/// which turns the struct into [`SizingParameters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingConfig {
    /// Fixed array area in m², only used when minimising the battery capacity.
    pub solar_array_size: Option<f64>,
    /// State of charge at the first timestep, kWh.
    pub initial_battery_capacity: f64,
    /// Fraction of the stored energy lost per timestep.
    pub battery_degradation_rate: f64,
    pub optimisation_objective: OptimisationObjective,
    /// £/kWh, required for the capex objective.
    pub battery_capex: Option<f64>,
    /// £/m², required for the capex objective.
    pub solar_capex: Option<f64>,
    /// Panel efficiency (0, 1].
    pub solar_efficiency: f64,
    /// Duration of one timestep in hours (half-hourly data by default).
    pub timestep_hours: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            solar_array_size: None,
            initial_battery_capacity: 0.0,
            battery_degradation_rate: 0.01,
            optimisation_objective: OptimisationObjective::MinimiseBatteryCap,
            battery_capex: None,
            solar_capex: None,
            solar_efficiency: 0.15,
            timestep_hours: 0.5,
        }
    }
}

/// The two sizing modes with the parameters each one requires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingMode {
    MinimiseBatteryCapacity { solar_array_size: f64 },
    MinimiseTotalCapex { solar_capex: f64, battery_capex: f64 },
}

impl SizingMode {
    pub fn objective(&self) -> OptimisationObjective {
        match self {
            Self::MinimiseBatteryCapacity { .. } => OptimisationObjective::MinimiseBatteryCap,
            Self::MinimiseTotalCapex { .. } => OptimisationObjective::MinimiseBatteryAndSolarCost,
        }
    }
}

/// Validated parameters, ready for model construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingParameters {
    pub initial_battery_capacity: f64,
    pub battery_degradation_rate: f64,
    pub solar_efficiency: f64,
    pub timestep_hours: f64,
    pub mode: SizingMode,
}

impl SizingConfig {
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("Failed to parse sizing configuration")
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Checks every parameter and resolves the sizing mode.
    pub fn validate(&self) -> Result<SizingParameters, SizingError> {
        let initial_battery_capacity =
            non_negative("initial_battery_capacity", self.initial_battery_capacity)?;

        let battery_degradation_rate = self.battery_degradation_rate;
        if !(0.0..1.0).contains(&battery_degradation_rate) {
            return Err(SizingError::config(format!(
                "battery_degradation_rate must be in [0, 1), got {battery_degradation_rate}"
            )));
        }

        let solar_efficiency = self.solar_efficiency;
        if !(solar_efficiency > 0.0 && solar_efficiency <= 1.0) {
            return Err(SizingError::config(format!(
                "solar_efficiency must be in (0, 1], got {solar_efficiency}"
            )));
        }

        let timestep_hours = self.timestep_hours;
        if !(timestep_hours.is_finite() && timestep_hours > 0.0) {
            return Err(SizingError::config(format!(
                "timestep_hours must be positive, got {timestep_hours}"
            )));
        }

        let mode = match self.optimisation_objective {
            OptimisationObjective::MinimiseBatteryCap => {
                let solar_array_size = self.solar_array_size.ok_or_else(|| {
                    SizingError::config(
                        "solar_array_size must be specified when minimising the battery capacity",
                    )
                })?;
                SizingMode::MinimiseBatteryCapacity {
                    solar_array_size: non_negative("solar_array_size", solar_array_size)?,
                }
            }
            OptimisationObjective::MinimiseBatteryAndSolarCost => {
                let (Some(battery_capex), Some(solar_capex)) = (self.battery_capex, self.solar_capex)
                else {
                    return Err(SizingError::config(
                        "battery_capex and solar_capex must both be specified when minimising \
                         the battery and solar cost",
                    ));
                };
                if let Some(size) = self.solar_array_size {
                    tracing::info!(
                        solar_array_size = size,
                        "A solar array size was provided but the array size is optimised in this \
                         mode, ignoring it"
                    );
                }
                SizingMode::MinimiseTotalCapex {
                    solar_capex: non_negative("solar_capex", solar_capex)?,
                    battery_capex: non_negative("battery_capex", battery_capex)?,
                }
            }
        };

        Ok(SizingParameters {
            initial_battery_capacity,
            battery_degradation_rate,
            solar_efficiency,
            timestep_hours,
            mode,
        })
    }
}

fn non_negative(name: &str, value: f64) -> Result<f64, SizingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SizingError::config(format!(
            "{name} must be a finite non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery_mode_config() -> SizingConfig {
        SizingConfig {
            solar_array_size: Some(10.0),
            ..Default::default()
        }
    }

    fn capex_mode_config() -> SizingConfig {
        SizingConfig {
            optimisation_objective: OptimisationObjective::MinimiseBatteryAndSolarCost,
            battery_capex: Some(300.0),
            solar_capex: Some(150.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_battery_mode_requires_array_size() {
        let config = SizingConfig::default();
        assert!(matches!(
            config.validate(),
            Err(SizingError::Configuration(_))
        ));

        let params = battery_mode_config().validate().unwrap();
        assert_eq!(
            params.mode,
            SizingMode::MinimiseBatteryCapacity {
                solar_array_size: 10.0
            }
        );
        assert_eq!(params.timestep_hours, 0.5);
        assert_eq!(params.solar_efficiency, 0.15);
    }

    #[test]
    fn test_capex_mode_requires_both_rates() {
        let mut config = capex_mode_config();
        config.battery_capex = None;
        assert!(matches!(
            config.validate(),
            Err(SizingError::Configuration(_))
        ));

        let mut config = capex_mode_config();
        config.solar_capex = None;
        assert!(matches!(
            config.validate(),
            Err(SizingError::Configuration(_))
        ));

        let params = capex_mode_config().validate().unwrap();
        assert_eq!(
            params.mode,
            SizingMode::MinimiseTotalCapex {
                solar_capex: 150.0,
                battery_capex: 300.0
            }
        );
    }

    #[test]
    fn test_capex_mode_ignores_array_size() {
        let config = SizingConfig {
            solar_array_size: Some(42.0),
            ..capex_mode_config()
        };
        let params = config.validate().unwrap();
        assert_eq!(params.mode.objective(), OptimisationObjective::MinimiseBatteryAndSolarCost);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            SizingConfig {
                battery_degradation_rate: 1.0,
                ..battery_mode_config()
            },
            SizingConfig {
                battery_degradation_rate: -0.1,
                ..battery_mode_config()
            },
            SizingConfig {
                initial_battery_capacity: -1.0,
                ..battery_mode_config()
            },
            SizingConfig {
                solar_efficiency: 0.0,
                ..battery_mode_config()
            },
            SizingConfig {
                timestep_hours: f64::NAN,
                ..battery_mode_config()
            },
            SizingConfig {
                solar_array_size: Some(-5.0),
                ..battery_mode_config()
            },
            SizingConfig {
                battery_capex: Some(f64::INFINITY),
                ..capex_mode_config()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(SizingError::Configuration(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_objective_names() {
        assert_eq!(
            "minimise_battery_cap".parse::<OptimisationObjective>().unwrap(),
            OptimisationObjective::MinimiseBatteryCap
        );
        assert_eq!(
            "minimise_battery_and_solar_cost"
                .parse::<OptimisationObjective>()
                .unwrap(),
            OptimisationObjective::MinimiseBatteryAndSolarCost
        );
        assert!("minimise_everything".parse::<OptimisationObjective>().is_err());
        assert_eq!(
            OptimisationObjective::MinimiseBatteryAndSolarCost.to_string(),
            "minimise_battery_and_solar_cost"
        );
    }

    #[test]
    fn test_from_toml() {
        let config = SizingConfig::from_toml_str(
            r#"
            optimisation_objective = "minimise_battery_and_solar_cost"
            battery_capex = 250.0
            solar_capex = 120.0
            battery_degradation_rate = 0.005
            "#,
        )
        .unwrap();
        assert_eq!(
            config.optimisation_objective,
            OptimisationObjective::MinimiseBatteryAndSolarCost
        );
        assert_eq!(config.battery_capex, Some(250.0));
        assert_eq!(config.solar_capex, Some(120.0));
        assert_eq!(config.battery_degradation_rate, 0.005);
        assert_eq!(config.timestep_hours, 0.5);

        assert!(SizingConfig::from_toml_str("unknown_field = 1").is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "solar_array_size = 25.0\n").unwrap();
        let config = SizingConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.solar_array_size, Some(25.0));
        assert!(config.validate().is_ok());
    }
}
