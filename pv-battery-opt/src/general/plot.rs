use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use plotters::prelude::*;

use crate::sizing::SizingResults;

pub const PLOT_FILE: &str = "energy_flows.svg";

struct Series<'a> {
    label: &'a str,
    color: RGBColor,
    values: Vec<f64>,
}

/// Draws the battery state of charge and the energy delivered to the house over time.
pub fn plot_energy_flows(results: &SizingResults, path: &Path) -> Result<()> {
    if results.rows.is_empty() {
        bail!("Nothing to plot, results have no timesteps");
    }

    let rows = &results.rows;
    let delivered: Vec<f64> = rows
        .iter()
        .map(|r| r.pv_to_house + r.battery_to_house)
        .collect();
    let series = [
        Series {
            label: "State of charge",
            color: BLUE,
            values: rows.iter().map(|r| r.state_of_charge).collect(),
        },
        Series {
            label: "PV to house",
            color: RGBColor(230, 160, 0),
            values: rows.iter().map(|r| r.pv_to_house).collect(),
        },
        Series {
            label: "Battery to house",
            color: GREEN,
            values: rows.iter().map(|r| r.battery_to_house).collect(),
        },
        Series {
            label: "Total delivered",
            color: BLACK,
            values: delivered.clone(),
        },
        Series {
            label: "Excess delivered",
            color: RED,
            values: delivered
                .iter()
                .zip(rows)
                .map(|(d, r)| (d - r.demand).max(0.0))
                .collect(),
        },
    ];

    let y_max = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0f64, f64::max)
        .max(1e-3)
        * 1.1;

    let root = SVGBackend::new(path, (1600, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = format!(
        "Energy flows (battery {:.2} kWh, array {:.1} m²)",
        results.battery_capacity, results.solar_array_size
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..rows.len() as f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Timestep")
        .y_desc("Energy (kWh)")
        .draw()?;

    for s in &series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(
                s.values.iter().enumerate().map(|(i, &y)| (i as f64, y)),
                &color,
            ))?
            .label(s.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Writes `energy_flows.svg` into `output_dir`.
pub fn export_plot(results: &SizingResults, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let path = output_dir.join(PLOT_FILE);
    plot_energy_flows(results, &path)
        .with_context(|| format!("Failed to draw {}", path.display()))?;
    tracing::info!("Plot saved as {}", path.display());
    Ok(path)
}
