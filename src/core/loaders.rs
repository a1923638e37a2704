//! Loaders for raw test data and the tables that describe it.
//!
//! This module provides parsers for:
//! - Raw per-test data CSV files (index column plus numeric channels)
//! - Calibration tables (slope, intercept and display name per channel)
//! - Test description tables (test window, exclusions, axis scales)
//! - Event timeline tables (labelled events per test)

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use log::warn;
use thiserror::Error;

use crate::config::{CalibrationConfig, DescriptionConfig};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("No description row for test '{test}'")]
    MissingTest { test: String },

    #[error("Test '{test}': invalid value '{value}' in column '{column}'")]
    InvalidValue {
        test: String,
        column: String,
        value: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A named numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Container for one test's time series.
///
/// The index column is kept as text so it is written back unchanged. All
/// other columns are numeric; blank or unparsable cells are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    /// Header of the index column.
    pub index_name: String,
    /// Index values, one per row.
    pub index: Vec<String>,
    /// Numeric columns in file order.
    pub columns: Vec<Column>,
}

impl DataTable {
    /// Creates an empty table with the given index header.
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            index: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column by name for modification.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns the column names in file order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Parse a CSV cell as a number, treating blanks and text as NaN.
fn parse_cell(cell: &str) -> f64 {
    cell.trim().parse().unwrap_or(f64::NAN)
}

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file)))
}

/// Load a time-series CSV into a [`DataTable`].
///
/// # Arguments
///
/// * `path` - Path to the CSV file
/// * `index_column` - Header of the index column; `None` uses the first column
///
/// # Errors
///
/// Returns an error if the file cannot be read, the index column is absent,
/// or the file has no data rows.
pub fn load_table<P: AsRef<Path>>(path: P, index_column: Option<&str>) -> Result<DataTable> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let index_idx = match index_column {
        Some(name) => headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                LoaderError::MissingColumns(format!("{} in {}", name, path.display()))
            })?,
        None => 0,
    };

    let mut table = DataTable::new(headers[index_idx].trim());
    let column_positions: Vec<usize> = (0..headers.len()).filter(|&i| i != index_idx).collect();
    table.columns = column_positions
        .iter()
        .map(|&i| Column::new(headers[i].trim(), Vec::with_capacity(4096)))
        .collect();

    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        table
            .index
            .push(record.get(index_idx).unwrap_or_default().trim().to_string());
        for (column, &pos) in table.columns.iter_mut().zip(&column_positions) {
            column.values.push(record.get(pos).map_or(f64::NAN, parse_cell));
        }
    }

    if table.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(table)
}

fn header_position(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| LoaderError::MissingColumns(format!("{} in {}", name, path.display())))
}

/// Calibration coefficients for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub slope: f64,
    pub intercept: f64,
    /// Legend label for the channel.
    pub display_name: String,
}

/// Calibration records keyed by channel name.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    records: HashMap<String, CalibrationRecord>,
}

impl CalibrationTable {
    pub fn get(&self, channel: &str) -> Option<&CalibrationRecord> {
        self.records.get(channel)
    }

    pub fn insert(&mut self, channel: impl Into<String>, record: CalibrationRecord) {
        self.records.insert(channel.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load a calibration table.
///
/// Rows whose slope or intercept cannot be parsed are skipped with a warning,
/// which leaves that channel without calibration.
pub fn load_calibration<P: AsRef<Path>>(path: P, config: &CalibrationConfig) -> Result<CalibrationTable> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    if config.channel_column >= headers.len() {
        return Err(LoaderError::MissingColumns(format!(
            "channel column #{} in {}",
            config.channel_column,
            path.display()
        )));
    }
    let slope_idx = header_position(&headers, &config.slope_column, path)?;
    let intercept_idx = header_position(&headers, &config.intercept_column, path)?;
    let name_idx = header_position(&headers, &config.name_column, path)?;

    let mut table = CalibrationTable::default();

    for result in reader.records() {
        let record = result?;
        let channel = record.get(config.channel_column).unwrap_or_default().trim();
        if channel.is_empty() {
            continue;
        }

        let slope = record.get(slope_idx).and_then(|s| s.trim().parse::<f64>().ok());
        let intercept = record
            .get(intercept_idx)
            .and_then(|s| s.trim().parse::<f64>().ok());

        match (slope, intercept) {
            (Some(slope), Some(intercept)) => {
                let display_name = record
                    .get(name_idx)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(channel)
                    .to_string();
                table.insert(
                    channel,
                    CalibrationRecord {
                        slope,
                        intercept,
                        display_name,
                    },
                );
            }
            _ => warn!(
                "Skipping calibration row for {} in {}: unparsable slope or intercept",
                channel,
                path.display()
            ),
        }
    }

    Ok(table)
}

/// Configured y-axis limit for one plotted quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisScale {
    /// Upper limit of the primary axis.
    Limit(f64),
    /// Sentinel `None`: the quantity is not plotted for this test.
    Disabled,
}

/// Per-test description row.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDescriptor {
    pub name: String,
    /// Absolute start of the test, in raw time units.
    pub start: f64,
    /// Absolute end of the test, in raw time units.
    pub end: f64,
    pub excluded_channels: Vec<String>,
    pub excluded_groups: Vec<String>,
    /// Axis scales keyed by description column (e.g. `Y Scale TC`).
    pub axis_scales: HashMap<String, AxisScale>,
}

impl TestDescriptor {
    /// Length of the visible window after time alignment.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Axis scale for a description column, if the column exists.
    pub fn axis_scale(&self, column: &str) -> Option<AxisScale> {
        self.axis_scales.get(column).copied()
    }
}

/// Split a pipe-delimited exclusion cell, dropping empty tokens.
pub fn parse_pipe_list(cell: &str) -> Vec<String> {
    cell.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_axis_scale(cell: &str) -> Option<AxisScale> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("none") {
        return Some(AxisScale::Disabled);
    }
    cell.parse().ok().map(AxisScale::Limit)
}

/// Test description table; rows are parsed into descriptors on lookup.
#[derive(Debug, Clone)]
pub struct DescriptionTable {
    headers: Vec<String>,
    rows: HashMap<String, Vec<String>>,
    columns: DescriptionConfig,
}

impl DescriptionTable {
    fn cell<'a>(&'a self, row: &'a [String], column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|i| row.get(i).map(String::as_str).unwrap_or_default())
    }

    fn required_number(&self, test: &str, row: &[String], column: &str) -> Result<f64> {
        let cell = self
            .cell(row, column)
            .ok_or_else(|| LoaderError::MissingColumns(format!("{} (test '{}')", column, test)))?;
        cell.trim().parse().map_err(|_| LoaderError::InvalidValue {
            test: test.to_string(),
            column: column.to_string(),
            value: cell.to_string(),
        })
    }

    /// Build the descriptor for a test.
    ///
    /// # Errors
    ///
    /// Fails if the test has no row, or its start/end cells are absent or
    /// not numeric, or an axis-scale cell is neither numeric nor `None`.
    pub fn descriptor(&self, test: &str) -> Result<TestDescriptor> {
        let row = self.rows.get(test).ok_or_else(|| LoaderError::MissingTest {
            test: test.to_string(),
        })?;

        let start = self.required_number(test, row, &self.columns.start_column)?;
        let end = self.required_number(test, row, &self.columns.end_column)?;
        let excluded_channels = self
            .cell(row, &self.columns.excluded_channels_column)
            .map(parse_pipe_list)
            .unwrap_or_default();
        let excluded_groups = self
            .cell(row, &self.columns.excluded_groups_column)
            .map(parse_pipe_list)
            .unwrap_or_default();

        let mut axis_scales = HashMap::new();
        for (i, header) in self.headers.iter().enumerate() {
            if !header.starts_with("Y Scale") {
                continue;
            }
            let cell = row.get(i).map(String::as_str).unwrap_or_default();
            let scale = parse_axis_scale(cell).ok_or_else(|| LoaderError::InvalidValue {
                test: test.to_string(),
                column: header.clone(),
                value: cell.to_string(),
            })?;
            axis_scales.insert(header.clone(), scale);
        }

        Ok(TestDescriptor {
            name: test.to_string(),
            start,
            end,
            excluded_channels,
            excluded_groups,
            axis_scales,
        })
    }
}

/// Load the test description table, keyed by the configured test column.
pub fn load_descriptions<P: AsRef<Path>>(path: P, config: &DescriptionConfig) -> Result<DescriptionTable> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    if config.test_column >= headers.len() {
        return Err(LoaderError::MissingColumns(format!(
            "test column #{} in {}",
            config.test_column,
            path.display()
        )));
    }

    let mut rows = HashMap::new();
    for result in reader.records() {
        let record = result?;
        let test = record.get(config.test_column).unwrap_or_default().trim();
        if test.is_empty() {
            continue;
        }
        rows.insert(
            test.to_string(),
            record.iter().map(|c| c.trim().to_string()).collect(),
        );
    }

    Ok(DescriptionTable {
        headers,
        rows,
        columns: config.clone(),
    })
}

/// A labelled event on a test's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    /// Event time relative to the test start.
    pub time: f64,
    pub label: String,
}

/// Event timeline for all tests.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    times: Vec<f64>,
    labels: HashMap<String, Vec<String>>,
}

impl EventTable {
    /// Events for a test, shifted to test-relative time.
    ///
    /// Returns `None` when the table has no column for the test. Blank cells
    /// and labels commented out with `#` are ignored.
    pub fn events_for(&self, test: &str, start: f64) -> Option<Vec<TimelineEvent>> {
        let labels = self.labels.get(test)?;
        let events = self
            .times
            .iter()
            .zip(labels)
            .filter(|(time, label)| time.is_finite() && !label.is_empty() && !label.starts_with('#'))
            .map(|(time, label)| TimelineEvent {
                time: time - start,
                label: label.clone(),
            })
            .collect();
        Some(events)
    }
}

/// Load the event timeline table.
///
/// The `Time` column (or the first column if absent) holds absolute event
/// times; every other column is one test.
pub fn load_event_table<P: AsRef<Path>>(path: P) -> Result<EventTable> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let time_idx = headers.iter().position(|h| h == "Time").unwrap_or(0);
    let mut table = EventTable::default();
    for (i, header) in headers.iter().enumerate() {
        if i != time_idx && !header.is_empty() {
            table.labels.insert(header.clone(), Vec::new());
        }
    }

    for result in reader.records() {
        let record = result?;
        table
            .times
            .push(record.get(time_idx).map_or(f64::NAN, parse_cell));
        for (i, header) in headers.iter().enumerate() {
            if let Some(labels) = table.labels.get_mut(header) {
                if i != time_idx {
                    labels.push(record.get(i).unwrap_or_default().trim().to_string());
                }
            }
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_table_with_named_index() -> Result<()> {
        let file = write_temp(&[
            "Time,TimeStamp(s),TC_A1_1,BDP_A4_1",
            "100,0.0,20.5,1.0",
            "101,1.0,,2.0",
        ]);

        let table = load_table(file.path(), Some("TimeStamp(s)"))?;
        assert_eq!(table.index_name, "TimeStamp(s)");
        assert_eq!(table.index, vec!["0.0", "1.0"]);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["Time", "TC_A1_1", "BDP_A4_1"]
        );
        assert_eq!(table.column("Time").unwrap().values, vec![100.0, 101.0]);
        let tc = &table.column("TC_A1_1").unwrap().values;
        assert_eq!(tc[0], 20.5);
        assert!(tc[1].is_nan());

        Ok(())
    }

    #[test]
    fn test_load_table_missing_index() {
        let file = write_temp(&["Time,TC_A1_1", "0,1"]);
        let result = load_table(file.path(), Some("TimeStamp(s)"));
        assert!(matches!(result, Err(LoaderError::MissingColumns(_))));
    }

    #[test]
    fn test_load_table_empty() {
        let file = write_temp(&["Time,TC_A1_1"]);
        let result = load_table(file.path(), None);
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_load_calibration() -> Result<()> {
        let file = write_temp(&[
            "Module,Port,Device Name,Calibration Slope,Calibration Intercept,Test Specific Name",
            "1,0,TC_A1_1,1.0,0.0,TC 1 0.03 m BS",
            "1,1,HF_A1_1,2.5,-0.1,",
            "1,2,BDP_A4_1,abc,0.0,Probe",
        ]);

        let table = load_calibration(file.path(), &CalibrationConfig::default())?;
        assert_eq!(table.len(), 2);

        let tc = table.get("TC_A1_1").unwrap();
        assert_eq!(tc.slope, 1.0);
        assert_eq!(tc.display_name, "TC 1 0.03 m BS");

        // Blank display name falls back to the channel
        assert_eq!(table.get("HF_A1_1").unwrap().display_name, "HF_A1_1");
        assert!(table.get("BDP_A4_1").is_none());

        Ok(())
    }

    fn description_file() -> NamedTempFile {
        write_temp(&[
            "Date,Location,Notes,Test Name,Start of Test,End of Test,Excluded Channels,Excluded Groups,Y Scale TC,Y Scale BDP,Y Scale HF",
            "7/8/14,West,,Test_27_West_070814,100,700,TC_A1_3|BDP_A4_2,HOSE_,1000,5,None",
            "7/9/14,East,,Test_28_East,abc,700,,,1000,5,20",
        ])
    }

    #[test]
    fn test_descriptor_parsing() -> Result<()> {
        let file = description_file();
        let table = load_descriptions(file.path(), &DescriptionConfig::default())?;

        let desc = table.descriptor("Test_27_West_070814")?;
        assert_eq!(desc.start, 100.0);
        assert_eq!(desc.duration(), 600.0);
        assert_eq!(desc.excluded_channels, vec!["TC_A1_3", "BDP_A4_2"]);
        assert_eq!(desc.excluded_groups, vec!["HOSE_"]);
        assert_eq!(desc.axis_scale("Y Scale TC"), Some(AxisScale::Limit(1000.0)));
        assert_eq!(desc.axis_scale("Y Scale HF"), Some(AxisScale::Disabled));
        assert_eq!(desc.axis_scale("Y Scale GAS"), None);

        Ok(())
    }

    #[test]
    fn test_descriptor_errors_name_the_test() -> Result<()> {
        let file = description_file();
        let table = load_descriptions(file.path(), &DescriptionConfig::default())?;

        match table.descriptor("Test_99") {
            Err(LoaderError::MissingTest { test }) => assert_eq!(test, "Test_99"),
            other => panic!("Expected MissingTest, got {:?}", other),
        }

        match table.descriptor("Test_28_East") {
            Err(LoaderError::InvalidValue { test, column, .. }) => {
                assert_eq!(test, "Test_28_East");
                assert_eq!(column, "Start of Test");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_parse_pipe_list_drops_empty_tokens() {
        assert_eq!(parse_pipe_list(""), Vec::<String>::new());
        assert_eq!(parse_pipe_list("A||B |"), vec!["A", "B"]);
    }

    #[test]
    fn test_event_table() -> Result<()> {
        let file = write_temp(&[
            "Time,Test_27_West_070814,Test_28_East",
            "110,Ignition,",
            "150,#Door open,Ignition",
            "200,Water on,",
        ]);

        let table = load_event_table(file.path())?;
        let events = table.events_for("Test_27_West_070814", 100.0).unwrap();
        assert_eq!(
            events,
            vec![
                TimelineEvent { time: 10.0, label: "Ignition".to_string() },
                TimelineEvent { time: 100.0, label: "Water on".to_string() },
            ]
        );
        assert_eq!(table.events_for("Test_28_East", 0.0).unwrap().len(), 1);
        assert!(table.events_for("Test_99", 0.0).is_none());

        Ok(())
    }
}
