//! Loading and alignment of the irradiance and demand CSV files.
//!
//! Demand is read as given (half-hourly, possibly several years). Irradiance is a
//! single-year profile, usually hourly, which is cleaned, re-sampled to half-hourly and
//! mapped onto every demand timestamp by calendar position.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};

pub const DATE_TIME: &str = "date_time";
pub const ENERGY_DEMAND: &str = "consumption_kwh";
pub const SOLAR_IRRADIANCE: &str = "solar_irradiance (W/m)";

const DATE_TIME_FORMATS: [&str; 3] = ["%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// One timestamped value of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Aligned model inputs, one entry per half-hour of the demand profile.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSeries {
    pub timestamps: Vec<NaiveDateTime>,
    /// W/m²
    pub irradiance: Vec<f64>,
    /// kWh per timestep
    pub demand: Vec<f64>,
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Reads the `date_time` column and `column` from CSV data.
pub fn read_series(reader: impl Read, column: &str) -> Result<Vec<Sample>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV header")?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("Missing column `{name}`"))
    };
    let time_index = find(DATE_TIME)?;
    let value_index = find(column)?;

    let mut samples = Vec::new();
    for result in rdr.records() {
        let record = result.context("Failed to read CSV record")?;
        let line = record.position().map_or(0, |p| p.line());

        let raw_time = record.get(time_index).unwrap_or_default();
        let timestamp = parse_timestamp(raw_time)
            .with_context(|| format!("Line {line}: invalid {DATE_TIME} `{raw_time}`"))?;
        let raw_value = record.get(value_index).unwrap_or_default();
        let value: f64 = raw_value
            .parse()
            .with_context(|| format!("Line {line}: invalid {column} `{raw_value}`"))?;

        samples.push(Sample::new(timestamp, value));
    }
    Ok(samples)
}

pub fn read_series_from_path(path: &Path, column: &str) -> Result<Vec<Sample>> {
    tracing::info!("Reading file at {}", path.display());
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not read file at {}", path.display()))?;
    read_series(file, column).with_context(|| format!("Invalid CSV file: {}", path.display()))
}

/// Sorts by timestamp and collapses repeated timestamps.
///
/// Repeats with identical values keep that value, differing values are averaged.
pub fn merge_duplicate_timestamps(mut samples: Vec<Sample>) -> Vec<Sample> {
    samples.sort_by_key(|s| s.timestamp);

    let mut merged: Vec<Sample> = Vec::with_capacity(samples.len());
    let mut start = 0;
    while start < samples.len() {
        let timestamp = samples[start].timestamp;
        let end = samples[start..]
            .iter()
            .position(|s| s.timestamp != timestamp)
            .map_or(samples.len(), |offset| start + offset);
        let group = &samples[start..end];

        let first = group[0].value;
        let value = if group.iter().all(|s| s.value == first) {
            first
        } else {
            group.iter().map(|s| s.value).sum::<f64>() / group.len() as f64
        };
        if group.len() > 1 {
            tracing::debug!(%timestamp, count = group.len(), value, "Merged duplicate timestamp");
        }
        merged.push(Sample::new(timestamp, value));
        start = end;
    }
    merged
}

/// Drops samples that are not on the hour or half hour.
pub fn keep_half_hourly(samples: Vec<Sample>) -> Vec<Sample> {
    let before = samples.len();
    let kept: Vec<Sample> = samples
        .into_iter()
        .filter(|s| matches!(s.timestamp.minute(), 0 | 30) && s.timestamp.second() == 0)
        .collect();
    if kept.len() < before {
        tracing::info!(dropped = before - kept.len(), "Dropped non half-hourly samples");
    }
    kept
}

/// Replaces a zero sample by the sample one day earlier when that one is non-zero.
///
/// Samples are processed in order, so a filled value can fill the following day too.
pub fn fill_zero_from_previous_day(samples: &mut [Sample]) {
    let mut by_time: HashMap<NaiveDateTime, f64> = HashMap::with_capacity(samples.len());
    let one_day = TimeDelta::days(1);

    for sample in samples.iter_mut() {
        if sample.value == 0.0 {
            let previous = sample
                .timestamp
                .checked_sub_signed(one_day)
                .and_then(|t| by_time.get(&t));
            if let Some(&previous) = previous {
                if previous != 0.0 {
                    sample.value = previous;
                }
            }
        }
        by_time.insert(sample.timestamp, sample.value);
    }
}

fn floor_to_half_hour(timestamp: NaiveDateTime) -> NaiveDateTime {
    let minute = if timestamp.minute() < 30 { 0 } else { 30 };
    timestamp
        .with_minute(minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

/// Re-samples a sorted series onto a half-hourly grid.
///
/// Each slot takes the next sample at or after it. One extra slot repeating the last
/// value is appended so that hourly data ending at 23:00 covers 23:30 as well.
pub fn resample_half_hourly(samples: &[Sample]) -> Vec<Sample> {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Vec::new();
    };
    let step = TimeDelta::minutes(30);

    let mut resampled = Vec::new();
    let mut slot = floor_to_half_hour(first.timestamp);
    let mut next = 0;
    while slot <= last.timestamp {
        while samples[next].timestamp < slot {
            next += 1;
        }
        resampled.push(Sample::new(slot, samples[next].value));
        slot += step;
    }
    resampled.push(Sample::new(
        floor_to_half_hour(last.timestamp) + step,
        last.value,
    ));
    resampled
}

type CalendarKey = (u32, u32, u32, u32);

fn calendar_key(timestamp: NaiveDateTime) -> CalendarKey {
    (
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
    )
}

/// Looks up the profile value for every demand timestamp by month, day and time of day.
pub fn align_to_timestamps(profile: &[Sample], timestamps: &[NaiveDateTime]) -> Result<Vec<f64>> {
    let mut by_position: HashMap<CalendarKey, f64> = HashMap::with_capacity(profile.len());
    for sample in profile {
        by_position
            .entry(calendar_key(sample.timestamp))
            .or_insert(sample.value);
    }

    timestamps
        .iter()
        .map(|&timestamp| {
            by_position
                .get(&calendar_key(timestamp))
                .copied()
                .ok_or_else(|| anyhow!("No solar irradiance sample for demand timestamp {timestamp}"))
        })
        .collect()
}

/// Applies all pre-processing and aligns irradiance onto the demand timestamps.
pub fn prepare_inputs(irradiance: Vec<Sample>, demand: Vec<Sample>) -> Result<InputSeries> {
    let demand = keep_half_hourly(merge_duplicate_timestamps(demand));
    if demand.is_empty() {
        bail!("Energy demand profile has no half-hourly samples");
    }

    let mut irradiance = merge_duplicate_timestamps(irradiance);
    fill_zero_from_previous_day(&mut irradiance);
    let profile = resample_half_hourly(&irradiance);

    let timestamps: Vec<NaiveDateTime> = demand.iter().map(|s| s.timestamp).collect();
    let irradiance = align_to_timestamps(&profile, &timestamps)?;

    tracing::info!(
        timesteps = timestamps.len(),
        first = %timestamps[0],
        last = %timestamps[timestamps.len() - 1],
        "Prepared input series"
    );

    Ok(InputSeries {
        timestamps,
        irradiance,
        demand: demand.into_iter().map(|s| s.value).collect(),
    })
}

pub fn load_inputs(irradiance_path: &Path, demand_path: &Path) -> Result<InputSeries> {
    let demand = read_series_from_path(demand_path, ENERGY_DEMAND)?;
    let irradiance = read_series_from_path(irradiance_path, SOLAR_IRRADIANCE)?;
    prepare_inputs(irradiance, demand)
}
