//! Configuration types for the reduction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Locations of input tables and output artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the raw per-test CSV files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory receiving one figure per sensor group
    #[serde(default = "default_figure_dir")]
    pub figure_dir: PathBuf,

    /// Directory receiving `<test>_Reduced.csv` (defaults to `data_dir`)
    #[serde(default)]
    pub reduced_dir: Option<PathBuf>,

    /// Event timeline table (one column of event labels per test)
    #[serde(default = "default_timing_file")]
    pub timing_file: PathBuf,

    /// Test description table (start/end, exclusions, axis scales)
    #[serde(default = "default_description_file")]
    pub description_file: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("../Experimental_Data/")
}

fn default_figure_dir() -> PathBuf {
    PathBuf::from("../Figures/Script_Figures/")
}

fn default_timing_file() -> PathBuf {
    PathBuf::from("../Experimental_Data/All_Times.csv")
}

fn default_description_file() -> PathBuf {
    PathBuf::from("../Experimental_Data/Description_of_Experiments.csv")
}

impl PathsConfig {
    /// Directory where reduced tables are written.
    pub fn reduced_dir(&self) -> &Path {
        self.reduced_dir.as_deref().unwrap_or(&self.data_dir)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            figure_dir: default_figure_dir(),
            reduced_dir: None,
            timing_file: default_timing_file(),
            description_file: default_description_file(),
        }
    }
}

/// Calibration file selected when the test name contains a substring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOverride {
    pub test_contains: String,
    pub file: PathBuf,
}

/// Calibration table selection and column layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Table used when no override matches
    #[serde(default = "default_calibration_file")]
    pub default_file: PathBuf,

    /// Checked in order; the first match wins
    #[serde(default = "default_calibration_overrides")]
    pub overrides: Vec<CalibrationOverride>,

    /// Position of the channel-name column
    #[serde(default = "default_channel_column")]
    pub channel_column: usize,

    #[serde(default = "default_slope_column")]
    pub slope_column: String,

    #[serde(default = "default_intercept_column")]
    pub intercept_column: String,

    /// Column holding the human-readable name used in legends
    #[serde(default = "default_name_column")]
    pub name_column: String,
}

fn default_calibration_file() -> PathBuf {
    PathBuf::from("../DAQ_Files/Delco_DAQ_Channel_List.csv")
}

fn default_calibration_overrides() -> Vec<CalibrationOverride> {
    vec![
        CalibrationOverride {
            test_contains: "West".to_string(),
            file: PathBuf::from("../DAQ_Files/West_DelCo_DAQ_Channel_List.csv"),
        },
        CalibrationOverride {
            test_contains: "East".to_string(),
            file: PathBuf::from("../DAQ_Files/East_DelCo_DAQ_Channel_List.csv"),
        },
    ]
}

fn default_channel_column() -> usize {
    2
}

fn default_slope_column() -> String {
    "Calibration Slope".to_string()
}

fn default_intercept_column() -> String {
    "Calibration Intercept".to_string()
}

fn default_name_column() -> String {
    "Test Specific Name".to_string()
}

impl CalibrationConfig {
    /// Pick the calibration table for a test.
    pub fn file_for_test(&self, test_name: &str) -> &Path {
        self.overrides
            .iter()
            .find(|o| test_name.contains(&o.test_contains))
            .map(|o| o.file.as_path())
            .unwrap_or(&self.default_file)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            default_file: default_calibration_file(),
            overrides: default_calibration_overrides(),
            channel_column: default_channel_column(),
            slope_column: default_slope_column(),
            intercept_column: default_intercept_column(),
            name_column: default_name_column(),
        }
    }
}

/// Column layout of the test description table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionConfig {
    /// Position of the test-name column
    #[serde(default = "default_test_column")]
    pub test_column: usize,

    #[serde(default = "default_start_column")]
    pub start_column: String,

    #[serde(default = "default_end_column")]
    pub end_column: String,

    #[serde(default = "default_excluded_channels_column")]
    pub excluded_channels_column: String,

    #[serde(default = "default_excluded_groups_column")]
    pub excluded_groups_column: String,
}

fn default_test_column() -> usize {
    3
}

fn default_start_column() -> String {
    "Start of Test".to_string()
}

fn default_end_column() -> String {
    "End of Test".to_string()
}

fn default_excluded_channels_column() -> String {
    "Excluded Channels".to_string()
}

fn default_excluded_groups_column() -> String {
    "Excluded Groups".to_string()
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            test_column: default_test_column(),
            start_column: default_start_column(),
            end_column: default_end_column(),
            excluded_channels_column: default_excluded_channels_column(),
            excluded_groups_column: default_excluded_groups_column(),
        }
    }
}

/// Test selection and signal processing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Process only the test with this exact name
    #[serde(default)]
    pub test_filter: Option<String>,

    /// Process only tests whose name contains this substring
    #[serde(default = "default_require_in_name")]
    pub require_in_name: Option<String>,

    /// Files whose lowercase name contains any of these are skipped
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,

    /// Index column of the raw data files, kept verbatim
    #[serde(default = "default_index_column")]
    pub index_column: String,

    /// Time column, offset to the test start and never smoothed
    #[serde(default = "default_time_column")]
    pub time_column: String,

    /// Moving average window in samples
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Samples averaged for the zero-offset baseline
    #[serde(default = "default_pre_test_time")]
    pub pre_test_time: usize,

    /// Only hose channels carrying this tag are converted
    #[serde(default = "default_hose_size_tag")]
    pub hose_size_tag: String,
}

fn default_require_in_name() -> Option<String> {
    Some("Test".to_string())
}

fn default_skip_patterns() -> Vec<String> {
    vec![
        "_times".to_string(),
        "_reduced".to_string(),
        "description_".to_string(),
        "_profile".to_string(),
    ]
}

fn default_index_column() -> String {
    "TimeStamp(s)".to_string()
}

fn default_time_column() -> String {
    "Time".to_string()
}

fn default_smoothing_window() -> usize {
    5
}

fn default_pre_test_time() -> usize {
    60
}

fn default_hose_size_tag() -> String {
    "2p5".to_string()
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            test_filter: None,
            require_in_name: default_require_in_name(),
            skip_patterns: default_skip_patterns(),
            index_column: default_index_column(),
            time_column: default_time_column(),
            smoothing_window: default_smoothing_window(),
            pre_test_time: default_pre_test_time(),
            hose_size_tag: default_hose_size_tag(),
        }
    }
}

/// Figure output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_plots_enabled")]
    pub enabled: bool,

    #[serde(default = "default_plot_width")]
    pub width: u32,

    #[serde(default = "default_plot_height")]
    pub height: u32,
}

fn default_plots_enabled() -> bool {
    true
}

fn default_plot_width() -> u32 {
    1000
}

fn default_plot_height() -> u32 {
    600
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enabled: default_plots_enabled(),
            width: default_plot_width(),
            height: default_plot_height(),
        }
    }
}

/// A named set of channel-name substrings plotted together on one figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorGroup {
    pub members: Vec<String>,
}

impl SensorGroup {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// File-name tag: the first member without its trailing underscores.
    pub fn tag(&self) -> &str {
        self.members
            .first()
            .map(|m| m.trim_end_matches('_'))
            .unwrap_or_default()
    }

    /// True if the channel name contains any member substring.
    pub fn matches(&self, channel: &str) -> bool {
        self.members.iter().any(|m| channel.contains(m.as_str()))
    }
}

fn default_groups() -> Vec<SensorGroup> {
    let mut groups: Vec<SensorGroup> = (1..=19)
        .map(|n| SensorGroup::new([format!("TC_A{}_", n)]))
        .collect();
    groups.push(SensorGroup::new(["TC_Ignition"]));
    groups.push(SensorGroup::new(["TC_Helmet_"]));
    for n in [4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 18] {
        groups.push(SensorGroup::new([format!("BDP_A{}_", n)]));
    }
    groups.push(SensorGroup::new(["HF_", "RAD_"]));
    groups.push(SensorGroup::new(["GAS_", "CO_", "CO2_", "O2_"]));
    groups.push(SensorGroup::new(["HOSE_"]));
    groups
}

fn default_profile_groups() -> Vec<SensorGroup> {
    vec![
        SensorGroup::new(["BDP_A5_"]),
        SensorGroup::new(["BDP_A6_"]),
        SensorGroup::new(["BDP_A10_"]),
    ]
}

/// Main reduction configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub descriptions: DescriptionConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub plots: PlotConfig,

    /// Sensor groups, one figure each
    #[serde(default = "default_groups")]
    pub groups: Vec<SensorGroup>,

    /// BDP arrays exported by the `profile` command
    #[serde(default = "default_profile_groups")]
    pub profile_groups: Vec<SensorGroup>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            calibration: CalibrationConfig::default(),
            descriptions: DescriptionConfig::default(),
            processing: ProcessingConfig::default(),
            plots: PlotConfig::default(),
            groups: default_groups(),
            profile_groups: default_profile_groups(),
        }
    }
}

impl ReductionConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ReductionConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
