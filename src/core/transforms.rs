//! Time alignment, smoothing and baseline operations on data tables.
//!
//! Per-column work is parallelized using Rayon.

use rayon::prelude::*;

use super::loaders::{Column, DataTable};

/// Shift a time series so the test starts at zero.
pub fn align_time(time: &mut [f64], start: f64) {
    for t in time.iter_mut() {
        *t -= start;
    }
}

/// Rows dropped before and after a centered window of `window` samples.
///
/// Even windows put the extra sample before the center, so the leading drop
/// is `window / 2` and the trailing drop is one less.
#[inline]
pub fn window_margins(window: usize) -> (usize, usize) {
    if window <= 1 {
        return (0, 0);
    }
    let leading = window / 2;
    (leading, window - 1 - leading)
}

/// Centered moving average.
///
/// Only positions with a full window are produced, so the output has
/// `values.len() - (window - 1)` samples (none if the input is shorter than
/// the window). A NaN anywhere in a window makes that output NaN.
///
/// # Example
///
/// ```
/// use fire_reduction::core::transforms::centered_moving_average;
///
/// let smoothed = centered_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
/// assert_eq!(smoothed, vec![2.0, 3.0, 4.0]);
/// ```
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Smooth every column except `time_column` with a centered moving average.
///
/// Index and time values are sliced to the rows that keep a full window, then
/// any row still holding a NaN is dropped.
pub fn smooth_table(table: &DataTable, window: usize, time_column: &str) -> DataTable {
    let (leading, trailing) = window_margins(window);
    let n = table.len();

    if n < leading + trailing + 1 {
        return DataTable {
            index_name: table.index_name.clone(),
            index: Vec::new(),
            columns: table
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), Vec::new()))
                .collect(),
        };
    }

    let end = n - trailing;
    let columns: Vec<Column> = table
        .columns
        .par_iter()
        .map(|column| {
            let values = if column.name == time_column {
                column.values[leading..end].to_vec()
            } else {
                centered_moving_average(&column.values, window)
            };
            Column::new(column.name.clone(), values)
        })
        .collect();

    let smoothed = DataTable {
        index_name: table.index_name.clone(),
        index: table.index[leading..end].to_vec(),
        columns,
    };

    drop_incomplete_rows(smoothed)
}

/// Remove every row where any column is NaN.
pub fn drop_incomplete_rows(table: DataTable) -> DataTable {
    let keep: Vec<bool> = (0..table.len())
        .map(|row| table.columns.iter().all(|c| !c.values[row].is_nan()))
        .collect();

    if keep.iter().all(|&k| k) {
        return table;
    }

    let select = |values: Vec<f64>| -> Vec<f64> {
        values
            .into_iter()
            .zip(&keep)
            .filter_map(|(v, &k)| k.then_some(v))
            .collect()
    };

    DataTable {
        index_name: table.index_name,
        index: table
            .index
            .into_iter()
            .zip(&keep)
            .filter_map(|(v, &k)| k.then_some(v))
            .collect(),
        columns: table
            .columns
            .into_iter()
            .map(|c| Column::new(c.name, select(c.values)))
            .collect(),
    }
}

/// Zero-offset baseline: mean of the first `samples` values.
///
/// Uses every value if the series is shorter; an empty series has baseline 0.
pub fn zero_baseline(values: &[f64], samples: usize) -> f64 {
    let count = samples.min(values.len());
    if count == 0 {
        return 0.0;
    }
    values[..count].iter().sum::<f64>() / count as f64
}

/// Mean of the values inside `[min, max]`, or NaN if none qualify.
pub fn masked_mean(values: &[f64], min: f64, max: f64) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|&&v| v >= min && v <= max)
        .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table(n: usize) -> DataTable {
        DataTable {
            index_name: "TimeStamp(s)".to_string(),
            index: (0..n).map(|i| i.to_string()).collect(),
            columns: vec![
                Column::new("Time", (0..n).map(|i| 100.0 + i as f64).collect()),
                Column::new("TC_A1_1", (0..n).map(|i| (i * i) as f64).collect()),
            ],
        }
    }

    #[test]
    fn test_align_time() {
        let mut time = vec![100.0, 101.0, 102.5];
        align_time(&mut time, 100.0);
        assert_eq!(time, vec![0.0, 1.0, 2.5]);
    }

    #[test]
    fn test_window_margins() {
        assert_eq!(window_margins(0), (0, 0));
        assert_eq!(window_margins(1), (0, 0));
        assert_eq!(window_margins(5), (2, 2));
        assert_eq!(window_margins(10), (5, 4));
    }

    #[test]
    fn test_moving_average_length_and_means() {
        let values: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        for window in [2, 5, 10] {
            let smoothed = centered_moving_average(&values, window);
            assert_eq!(smoothed.len(), values.len() - (window - 1));
            for (i, s) in smoothed.iter().enumerate() {
                let expected: f64 = values[i..i + window].iter().sum::<f64>() / window as f64;
                assert!((s - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_moving_average_short_input() {
        assert!(centered_moving_average(&[1.0, 2.0], 5).is_empty());
        assert_eq!(centered_moving_average(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_smooth_table_keeps_time_unsmoothed() {
        let table = sample_table(10);
        let smoothed = smooth_table(&table, 5, "Time");

        assert_eq!(smoothed.len(), 6);
        assert_eq!(smoothed.index.first().map(String::as_str), Some("2"));
        assert_eq!(smoothed.index.last().map(String::as_str), Some("7"));

        let time = &smoothed.column("Time").unwrap().values;
        assert_eq!(time, &vec![102.0, 103.0, 104.0, 105.0, 106.0, 107.0]);

        // mean of 0,1,4,9,16
        let tc = &smoothed.column("TC_A1_1").unwrap().values;
        assert!((tc[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_table_even_window() {
        let table = sample_table(12);
        let smoothed = smooth_table(&table, 10, "Time");

        assert_eq!(smoothed.len(), 3);
        assert_eq!(smoothed.index, vec!["5", "6", "7"]);
    }

    #[test]
    fn test_smooth_table_drops_nan_rows() {
        let mut table = sample_table(8);
        table.columns[1].values[0] = f64::NAN;
        let smoothed = smooth_table(&table, 3, "Time");

        // the first window touches the NaN and is dropped
        assert_eq!(smoothed.len(), 5);
        assert_eq!(smoothed.index.first().map(String::as_str), Some("2"));
        assert!(smoothed.columns.iter().all(|c| c.values.len() == 5));
    }

    #[test]
    fn test_smooth_table_shorter_than_window() {
        let table = sample_table(3);
        let smoothed = smooth_table(&table, 5, "Time");
        assert!(smoothed.is_empty());
        assert_eq!(smoothed.columns.len(), 2);
    }

    #[test]
    fn test_zero_baseline() {
        assert_eq!(zero_baseline(&[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0], 5), 0.0);
        assert_eq!(zero_baseline(&[1.0, 3.0], 60), 2.0);
        assert_eq!(zero_baseline(&[], 60), 0.0);
    }

    #[test]
    fn test_masked_mean() {
        assert_eq!(masked_mean(&[10.0, 20.0, -5.0, 5000.0], 0.001, 3000.0), 15.0);
        assert!(masked_mean(&[0.0, 4000.0], 0.001, 3000.0).is_nan());
    }
}
