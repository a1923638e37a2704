//! Per-test and batch reduction.
//!
//! For each raw test file: load, align the time column to the test start,
//! smooth, convert every eligible channel of every sensor group, draw one
//! figure per group and write `<test>_Reduced.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::{ProcessingConfig, ReductionConfig, SensorGroup};
use crate::core::loaders::{
    load_calibration, load_descriptions, load_event_table, load_table, AxisScale,
    CalibrationTable, DataTable, DescriptionTable, EventTable, LoaderError, TestDescriptor,
    TimelineEvent,
};
use crate::core::transforms::{align_time, smooth_table};
use crate::core::writers::{write_table_csv, WriteError};
use crate::visualization::{
    figure_path, render_figure, FigurePlan, SecondaryAxisPlan, SeriesPlan, VisualizationError,
};

use super::conversion::{convert_channel, ConvertedChannel};
use super::grouping::{eligible_channels, is_group_excluded};

/// Errors raised while reducing a test.
#[derive(Debug, Error)]
pub enum ReductionError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Test '{test}': missing column '{column}'")]
    MissingColumn { test: String, column: String },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Test '{test}': figure {tag} failed: {source}")]
    Plot {
        test: String,
        tag: String,
        #[source]
        source: VisualizationError,
    },
}

/// Result type for reduction operations.
pub type Result<T> = std::result::Result<T, ReductionError>;

/// A raw test data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTest {
    /// Test name (file stem)
    pub name: String,
    pub path: PathBuf,
}

/// Find the raw test files to process in `data_dir`, sorted by name.
///
/// Only `.csv` files are considered. Files whose lowercase name contains a
/// skip pattern are ignored, as are files rejected by the test filter or the
/// required name substring.
pub fn discover_tests(data_dir: &Path, processing: &ProcessingConfig) -> Result<Vec<RawTest>> {
    let entries = fs::read_dir(data_dir).map_err(|e| ReductionError::ReadDir {
        path: data_dir.to_path_buf(),
        source: e,
    })?;

    let mut tests: Vec<RawTest> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .filter_map(|path| {
            let name = path.file_stem()?.to_str()?.to_string();
            let lower = name.to_lowercase();
            if processing
                .skip_patterns
                .iter()
                .any(|p| lower.contains(&p.to_lowercase()))
            {
                debug!("Skipping {}", path.display());
                return None;
            }
            Some(RawTest { name, path })
        })
        .filter(|test| {
            processing
                .test_filter
                .as_ref()
                .map_or(true, |wanted| &test.name == wanted)
        })
        .filter(|test| {
            processing
                .require_in_name
                .as_ref()
                .map_or(true, |s| test.name.contains(s.as_str()))
        })
        .collect();

    tests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tests)
}

/// Load a raw test file, align its time column and smooth it.
pub fn prepare_test_data(
    path: &Path,
    descriptor: &TestDescriptor,
    processing: &ProcessingConfig,
) -> Result<DataTable> {
    let mut table = load_table(path, Some(processing.index_column.as_str()))?;

    let time = table
        .column_mut(&processing.time_column)
        .ok_or_else(|| ReductionError::MissingColumn {
            test: descriptor.name.clone(),
            column: processing.time_column.clone(),
        })?;
    align_time(&mut time.values, descriptor.start);

    Ok(smooth_table(
        &table,
        processing.smoothing_window,
        &processing.time_column,
    ))
}

/// A test loaded and ready for conversion.
#[derive(Debug, Clone)]
pub struct PreparedTest {
    pub descriptor: TestDescriptor,
    pub calibration: CalibrationTable,
    /// Time-aligned, smoothed raw readings
    pub data: DataTable,
}

/// Convert every eligible channel of a group.
///
/// Channels that fail to convert are logged and skipped.
pub fn convert_group(
    prepared: &PreparedTest,
    group: &SensorGroup,
    processing: &ProcessingConfig,
) -> Vec<ConvertedChannel> {
    eligible_channels(
        &prepared.data,
        group,
        &prepared.descriptor,
        &processing.time_column,
        &processing.hose_size_tag,
    )
    .into_iter()
    .filter_map(|(channel, kind)| {
        match convert_channel(
            &prepared.data,
            &channel,
            kind,
            &prepared.calibration,
            processing.pre_test_time,
        ) {
            Ok(converted) => Some(converted),
            Err(e) => {
                warn!("Test {}: skipping {}: {}", prepared.descriptor.name, channel, e);
                None
            }
        }
    })
    .collect()
}

/// Plan the figure of one group.
///
/// The group quantity is that of its first channel. Returns `None` when the
/// group has no channels or the test disables plots for the quantity.
///
/// # Errors
///
/// Fails if the description table has no axis-scale column for the quantity.
pub fn plan_group_figure(
    descriptor: &TestDescriptor,
    group: &SensorGroup,
    channels: &[ConvertedChannel],
    time: &[f64],
    events: Option<&[TimelineEvent]>,
    figure_dir: &Path,
) -> Result<Option<FigurePlan>> {
    let Some(first) = channels.first() else {
        return Ok(None);
    };
    let quantity = first.quantity();

    let scale_column = quantity.scale_column();
    let limit = match descriptor.axis_scale(scale_column) {
        Some(AxisScale::Limit(limit)) => limit,
        Some(AxisScale::Disabled) => return Ok(None),
        None => {
            return Err(ReductionError::MissingColumn {
                test: descriptor.name.clone(),
                column: scale_column.to_string(),
            })
        }
    };

    let y_range = if quantity.is_symmetric() {
        (-limit, limit)
    } else {
        (0.0, limit)
    };
    let secondary = quantity.secondary_axis().map(|axis| SecondaryAxisPlan {
        label: axis.label.to_string(),
        range: (axis.convert(y_range.0), axis.convert(y_range.1)),
    });

    let series = channels
        .iter()
        .map(|channel| SeriesPlan {
            label: channel.label.clone(),
            style: channel.line_style(),
            points: time
                .iter()
                .zip(&channel.values)
                .filter(|(t, v)| t.is_finite() && v.is_finite())
                .map(|(&t, &v)| (t, v))
                .collect(),
        })
        .collect();

    Ok(Some(FigurePlan {
        output_path: figure_path(figure_dir, &descriptor.name, group.tag()),
        x_label: "Time (s)".to_string(),
        y_label: quantity.axis_label().to_string(),
        x_range: (0.0, descriptor.duration()),
        y_range,
        secondary,
        series,
        events: events.map(<[TimelineEvent]>::to_vec),
    }))
}

/// Outcome of reducing one test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub test: String,
    pub channels_converted: usize,
    pub figures: Vec<PathBuf>,
    /// Figures that could not be drawn; the reduced table is still written
    pub figure_errors: Vec<String>,
    pub reduced_path: PathBuf,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub reduced: Vec<TestReport>,
    /// `(test, error message)` for every failed test
    pub failed: Vec<(String, String)>,
}

/// Shared inputs for reducing one or more tests.
pub struct ReductionContext<'a> {
    config: &'a ReductionConfig,
    descriptions: DescriptionTable,
    events: Option<EventTable>,
}

impl<'a> ReductionContext<'a> {
    /// Load the description table and, if readable, the event timeline.
    pub fn new(config: &'a ReductionConfig) -> Result<Self> {
        let descriptions = load_descriptions(&config.paths.description_file, &config.descriptions)?;

        let events = match load_event_table(&config.paths.timing_file) {
            Ok(events) => Some(events),
            Err(e) => {
                debug!("No event timeline ({}), plotting without annotations", e);
                None
            }
        };

        Ok(Self {
            config,
            descriptions,
            events,
        })
    }

    /// Load descriptor, calibration and smoothed data for a test.
    pub fn prepare(&self, test: &RawTest) -> Result<PreparedTest> {
        let descriptor = self.descriptions.descriptor(&test.name)?;

        let calibration_file = self.config.calibration.file_for_test(&test.name);
        let calibration = load_calibration(calibration_file, &self.config.calibration)?;
        debug!(
            "Test {}: {} calibration records from {}",
            test.name,
            calibration.len(),
            calibration_file.display()
        );

        let data = prepare_test_data(&test.path, &descriptor, &self.config.processing)?;

        Ok(PreparedTest {
            descriptor,
            calibration,
            data,
        })
    }

    /// Reduce one test: convert, plot and write the reduced table.
    ///
    /// A figure that cannot be planned or drawn is logged and recorded in the
    /// report; the reduced table is written regardless.
    pub fn reduce_test(&self, test: &RawTest) -> Result<TestReport> {
        info!("Reducing {}", test.name);

        let prepared = self.prepare(test)?;
        let processing = &self.config.processing;
        let events = self
            .events
            .as_ref()
            .and_then(|e| e.events_for(&test.name, prepared.descriptor.start));

        let time = prepared
            .data
            .column(&processing.time_column)
            .map(|c| c.values.clone())
            .unwrap_or_default();

        let mut reduced = prepared.data.clone();
        let mut converted_names: Vec<String> = Vec::new();
        let mut figures = Vec::new();
        let mut figure_errors = Vec::new();

        for group in &self.config.groups {
            if is_group_excluded(group, &prepared.descriptor) {
                debug!("Test {}: group {} excluded", test.name, group.tag());
                continue;
            }

            let channels = convert_group(&prepared, group, processing);
            for channel in &channels {
                if let Some(column) = reduced.column_mut(&channel.name) {
                    column.values.clone_from(&channel.values);
                }
                if !converted_names.contains(&channel.name) {
                    converted_names.push(channel.name.clone());
                }
            }

            if !self.config.plots.enabled {
                continue;
            }
            match self.draw_group_figure(&prepared, group, &channels, &time, events.as_deref()) {
                Ok(Some(path)) => {
                    debug!("Wrote {}", path.display());
                    figures.push(path);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("{}", e);
                    figure_errors.push(e.to_string());
                }
            }
        }

        let reduced_path = self
            .config
            .paths
            .reduced_dir()
            .join(format!("{}_Reduced.csv", test.name));
        write_table_csv(&reduced_path, &reduced)?;

        info!(
            "Test {}: {} channels converted, {} figures, {} figure failures",
            test.name,
            converted_names.len(),
            figures.len(),
            figure_errors.len()
        );

        Ok(TestReport {
            test: test.name.clone(),
            channels_converted: converted_names.len(),
            figures,
            figure_errors,
            reduced_path,
        })
    }

    /// Plan and render one group figure, returning its path if drawn.
    fn draw_group_figure(
        &self,
        prepared: &PreparedTest,
        group: &SensorGroup,
        channels: &[ConvertedChannel],
        time: &[f64],
        events: Option<&[TimelineEvent]>,
    ) -> Result<Option<PathBuf>> {
        let plan = plan_group_figure(
            &prepared.descriptor,
            group,
            channels,
            time,
            events,
            &self.config.paths.figure_dir,
        )?;
        let Some(plan) = plan else {
            return Ok(None);
        };

        render_figure(&plan, (self.config.plots.width, self.config.plots.height)).map_err(|e| {
            ReductionError::Plot {
                test: prepared.descriptor.name.clone(),
                tag: group.tag().to_string(),
                source: e,
            }
        })?;
        Ok(Some(plan.output_path))
    }
}

/// Reduce every discovered test.
///
/// A failing test is logged and recorded; the remaining tests still run.
/// `on_test` is called with each test name before it is reduced.
pub fn run_batch<F>(config: &ReductionConfig, mut on_test: F) -> Result<BatchReport>
where
    F: FnMut(&str),
{
    let tests = discover_tests(&config.paths.data_dir, &config.processing)?;
    info!("Found {} test files in {}", tests.len(), config.paths.data_dir.display());

    let context = ReductionContext::new(config)?;
    let mut report = BatchReport::default();

    for test in &tests {
        on_test(&test.name);
        match context.reduce_test(test) {
            Ok(test_report) => report.reduced.push(test_report),
            Err(e) => {
                error!("Test {} failed: {}", test.name, e);
                report.failed.push((test.name.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}
