//! CSV export of sizing results and sweep records.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::sizing::SizingResults;
use crate::sizing::sweep::SweepRecord;

pub const OUTPUT_FILE: &str = "optimisation_output.csv";
pub const SENSITIVITY_FILE: &str = "sensitivity_analysis.csv";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct OutputRow {
    timestep: usize,
    date_time: Option<String>,
    pv_to_house: f64,
    pv_to_battery: f64,
    battery_to_house: f64,
    state_of_charge: f64,
    battery_degradation: f64,
    solar_generation: f64,
    energy_demand: f64,
    battery_capacity: f64,
    solar_array_size: f64,
}

/// Writes one row per timestep; the sized scalars are repeated on every row.
pub fn write_results(
    results: &SizingResults,
    timestamps: Option<&[NaiveDateTime]>,
    writer: impl Write,
) -> Result<()> {
    if let Some(timestamps) = timestamps {
        if timestamps.len() != results.rows.len() {
            bail!(
                "{} timestamps for {} result rows",
                timestamps.len(),
                results.rows.len()
            );
        }
    }

    let mut wtr = csv::Writer::from_writer(writer);
    for (t, row) in results.rows.iter().enumerate() {
        wtr.serialize(OutputRow {
            timestep: row.timestep,
            date_time: timestamps.map(|ts| ts[t].format(TIMESTAMP_FORMAT).to_string()),
            pv_to_house: row.pv_to_house,
            pv_to_battery: row.pv_to_battery,
            battery_to_house: row.battery_to_house,
            state_of_charge: row.state_of_charge,
            battery_degradation: row.battery_degradation,
            solar_generation: row.generation,
            energy_demand: row.demand,
            battery_capacity: results.battery_capacity,
            solar_array_size: results.solar_array_size,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `optimisation_output.csv` into `output_dir`, creating the directory if needed.
pub fn export_results(
    results: &SizingResults,
    timestamps: Option<&[NaiveDateTime]>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let path = create_output_file_path(output_dir, OUTPUT_FILE)?;
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_results(results, timestamps, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Saved results to {}", path.display());
    Ok(path)
}

pub fn write_sweep(records: &[SweepRecord], writer: impl Write) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `sensitivity_analysis.csv` into `output_dir`.
pub fn export_sweep(records: &[SweepRecord], output_dir: &Path) -> Result<PathBuf> {
    let path = create_output_file_path(output_dir, SENSITIVITY_FILE)?;
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_sweep(records, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Saved sensitivity analysis to {}", path.display());
    Ok(path)
}

fn create_output_file_path(output_dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    Ok(output_dir.join(file_name))
}
