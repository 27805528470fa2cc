pub mod cli;
pub mod error;
pub mod general;
pub mod sizing;

// Re-export commonly used items for convenience
pub use error::SizingError;
pub use general::config::{OptimisationObjective, SizingConfig};
pub use sizing::{GoodLpSolver, LpSolver, SizingResults, SolveOutcome, run_sizing};
