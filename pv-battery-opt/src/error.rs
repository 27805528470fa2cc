use thiserror::Error;

/// Errors raised by the sizing core.
///
/// Input and configuration errors are raised before a model is built or solved.
/// Solver outcomes are passed through unchanged; none of them is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("irradiance series has {irradiance} samples but demand series has {demand}")]
    DimensionMismatch { irradiance: usize, demand: usize },

    #[error("input series are empty, at least one timestep is required")]
    EmptyHorizon,

    #[error("invalid {series} sample {value} at timestep {timestep}")]
    InvalidSample {
        series: &'static str,
        timestep: usize,
        value: f64,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("optimisation problem is infeasible")]
    Infeasible,

    #[error("optimisation problem is unbounded")]
    Unbounded,

    #[error("solver failure: {0}")]
    SolverFailure(String),

    #[error("cannot extract results: {0}")]
    Extraction(String),
}

impl SizingError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short machine-readable name of the failure, used in sweep reports.
    pub fn status(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::EmptyHorizon => "empty_horizon",
            Self::InvalidSample { .. } => "invalid_sample",
            Self::Configuration(_) => "configuration_error",
            Self::Infeasible => "infeasible",
            Self::Unbounded => "unbounded",
            Self::SolverFailure(_) => "solver_failure",
            Self::Extraction(_) => "extraction_error",
        }
    }
}
