pub mod config;
pub mod inputs;
pub mod output;
pub mod plot;

pub use config::{OptimisationObjective, SizingConfig, SizingMode, SizingParameters};
pub use inputs::{InputSeries, load_inputs};
