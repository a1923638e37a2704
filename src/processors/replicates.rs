//! Averaging of replicate tests.

use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::core::loaders::{load_table, Column, DataTable, LoaderError};
use crate::core::transforms::masked_mean;
use crate::visualization::{FigurePlan, SeriesPlan};

use super::sensors::{classify, LineStyle};

/// Lower bound of valid readings by default.
pub const DEFAULT_VALID_MIN: f64 = 0.001;

/// Upper bound of valid readings by default.
pub const DEFAULT_VALID_MAX: f64 = 3000.0;

/// Errors that can occur while averaging replicates.
#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error("No replicate files given")]
    NoReplicates,

    #[error("Channel '{channel}' missing from replicate {}", .path.display())]
    MissingChannel { channel: String, path: PathBuf },

    #[error("Invalid range: min {min} is not below max {max}")]
    InvalidRange { min: f64, max: f64 },
}

/// Result type for replicate operations.
pub type Result<T> = std::result::Result<T, ReplicateError>;

/// Average matching channels across replicate files.
///
/// Channels are taken from the first replicate; a channel is averaged when its
/// name contains any of `channel_filters` (all channels if the list is
/// empty). Each row is the mean of the replicate values inside
/// `[valid_min, valid_max]`, or NaN if none qualify. The result is truncated
/// to the shortest replicate and keeps the first replicate's index.
///
/// # Arguments
///
/// * `paths` - Replicate CSV files; the first column of each is the index
/// * `channel_filters` - Channel-name substrings to average
/// * `time_column` - Copied from the first replicate instead of averaged
/// * `valid_min` / `valid_max` - Validity mask bounds
pub fn average_replicates<P: AsRef<Path>>(
    paths: &[P],
    channel_filters: &[String],
    time_column: &str,
    valid_min: f64,
    valid_max: f64,
) -> Result<DataTable> {
    if valid_min >= valid_max {
        return Err(ReplicateError::InvalidRange {
            min: valid_min,
            max: valid_max,
        });
    }
    if paths.is_empty() {
        return Err(ReplicateError::NoReplicates);
    }

    let replicates = paths
        .iter()
        .map(|p| load_table(p, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let rows = replicates.iter().map(DataTable::len).min().unwrap_or(0);

    let first = &replicates[0];
    let mut averaged = DataTable::new(first.index_name.clone());
    averaged.index = first.index[..rows].to_vec();

    if let Some(time) = first.column(time_column) {
        averaged
            .columns
            .push(Column::new(time.name.clone(), time.values[..rows].to_vec()));
    }

    let selected = first.column_names().filter(|&name| {
        name != time_column
            && (channel_filters.is_empty()
                || channel_filters.iter().any(|f| name.contains(f.as_str())))
    });

    for name in selected {
        let series: Vec<&[f64]> = replicates
            .iter()
            .zip(paths)
            .map(|(table, path)| {
                table
                    .column(name)
                    .map(|c| &c.values[..rows])
                    .ok_or_else(|| ReplicateError::MissingChannel {
                        channel: name.to_string(),
                        path: path.as_ref().to_path_buf(),
                    })
            })
            .collect::<Result<_>>()?;

        let mut row_values = Vec::with_capacity(series.len());
        let values = (0..rows)
            .map(|row| {
                row_values.clear();
                row_values.extend(series.iter().map(|s| s[row]));
                masked_mean(&row_values, valid_min, valid_max)
            })
            .collect();
        averaged.columns.push(Column::new(name, values));
    }

    info!(
        "Averaged {} channels over {} replicates ({} rows)",
        averaged.columns.len(),
        replicates.len(),
        rows
    );

    Ok(averaged)
}

/// Plan a figure with one line per averaged channel.
///
/// The x axis is the time column, or the row number if the table has none.
/// Axis labels and line styles follow the first channel's sensor kind; the
/// y axis spans zero to the largest averaged value. Returns `None` when the
/// table holds no finite averaged value.
pub fn plan_average_figure(
    table: &DataTable,
    time_column: &str,
    output_path: &Path,
) -> Option<FigurePlan> {
    let time: Vec<f64> = table
        .column(time_column)
        .map(|c| c.values.clone())
        .unwrap_or_else(|| (0..table.len()).map(|i| i as f64).collect());

    let channels: Vec<&Column> = table
        .columns
        .iter()
        .filter(|c| c.name != time_column)
        .collect();

    let series: Vec<SeriesPlan> = channels
        .iter()
        .map(|column| SeriesPlan {
            label: column.name.clone(),
            style: classify(&column.name).map_or(LineStyle::Solid, |k| k.line_style()),
            points: time
                .iter()
                .zip(&column.values)
                .filter(|(t, v)| t.is_finite() && v.is_finite())
                .map(|(&t, &v)| (t, v))
                .collect(),
        })
        .filter(|s| !s.points.is_empty())
        .collect();

    let y_max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.1))
        .fold(f64::NEG_INFINITY, f64::max);
    if !y_max.is_finite() {
        return None;
    }
    let (t_min, t_max) = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));

    let quantity = channels
        .first()
        .and_then(|c| classify(&c.name))
        .map(|k| k.quantity());
    let y_range = (0.0, y_max.max(0.0));
    let secondary = quantity
        .and_then(|q| q.secondary_axis())
        .map(|axis| crate::visualization::SecondaryAxisPlan {
            label: axis.label.to_string(),
            range: (axis.convert(y_range.0), axis.convert(y_range.1)),
        });

    Some(FigurePlan {
        output_path: output_path.to_path_buf(),
        x_label: "Time (s)".to_string(),
        y_label: quantity.map_or("Value", |q| q.axis_label()).to_string(),
        x_range: (t_min, t_max),
        y_range,
        secondary,
        series,
        events: None,
    })
}
