//! Command-line interface for fire-test data reduction.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::SensorGroup;
use crate::processors::{convective, properties, reduction, replicates};
use crate::visualization::render_figure;
use crate::ReductionConfig;

#[derive(Parser)]
#[command(name = "fire-reduction")]
#[command(about = "Fire-test sensor data reduction", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert, plot and write reduced CSVs for every raw test file
    Reduce {
        /// Process only this test
        #[arg(short, long)]
        test: Option<String>,
        /// Moving average window in samples
        #[arg(short, long)]
        window: Option<usize>,
        /// Samples averaged for the zero-offset baseline
        #[arg(long)]
        pre_test_time: Option<usize>,
        /// Skip figure rendering
        #[arg(long)]
        no_plots: bool,
        /// Directory containing raw test CSV files
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Output directory for figures
        #[arg(long)]
        figure_dir: Option<PathBuf>,
    },

    /// Export probe-array profiles (velocity, temperature, density, heat capacity)
    Profile {
        /// Test to export
        #[arg(short, long)]
        test: String,
        /// Probe groups (channel prefixes); defaults to the configured profile groups
        #[arg(short, long)]
        group: Vec<String>,
        /// Output directory (defaults to the reduced data directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Average matching channels across replicate test files
    Average {
        /// Replicate CSV files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
        /// Channel-name substrings to average (all channels if omitted)
        #[arg(long)]
        channel: Vec<String>,
        /// Readings below this are ignored
        #[arg(long, default_value_t = replicates::DEFAULT_VALID_MIN)]
        valid_min: f64,
        /// Readings above this are ignored
        #[arg(long, default_value_t = replicates::DEFAULT_VALID_MAX)]
        valid_max: f64,
        /// Also draw the averaged channels to this PNG file
        #[arg(long)]
        figure: Option<PathBuf>,
    },

    /// Look up air density and heat capacity at a temperature (°C)
    Properties {
        /// Temperature in °C
        #[arg(allow_hyphen_values = true)]
        temperature: f64,
    },

    /// Write the default configuration as a YAML template
    InitConfig {
        /// Output YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match ReductionConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ReductionConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Reduce { test, window, pre_test_time, no_plots, data_dir, figure_dir } => {
            let mut config = config;
            if let Some(test) = test {
                config.processing.test_filter = Some(test);
            }
            if let Some(window) = window {
                config.processing.smoothing_window = window;
            }
            if let Some(samples) = pre_test_time {
                config.processing.pre_test_time = samples;
            }
            if no_plots {
                config.plots.enabled = false;
            }
            if let Some(dir) = data_dir {
                config.paths.data_dir = dir;
            }
            if let Some(dir) = figure_dir {
                config.paths.figure_dir = dir;
            }
            cmd_reduce(&config);
        }
        Commands::Profile { test, group, output_dir } => {
            cmd_profile(&test, &group, output_dir, &config);
        }
        Commands::Average { files, output, channel, valid_min, valid_max, figure } => {
            cmd_average(&files, &output, &channel, valid_min, valid_max, figure.as_deref(), &config);
        }
        Commands::Properties { temperature } => {
            cmd_properties(temperature);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path, &config);
        }
    }
}

fn cmd_reduce(config: &ReductionConfig) {
    let start = Instant::now();

    println!("Reducing fire test data...");
    println!("Data directory: {}", config.paths.data_dir.display());
    println!("Figure directory: {}", config.paths.figure_dir.display());
    println!("Smoothing window: {}", config.processing.smoothing_window);
    if let Some(test) = &config.processing.test_filter {
        println!("Test filter: {}", test);
    }

    let spinner = create_spinner("Scanning for raw test files...");

    let result = reduction::run_batch(config, |test| {
        spinner.set_message(format!("Reducing {}...", test));
    });

    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            for (test, message) in &report.failed {
                println!("FAILED {}: {}", test, message);
            }

            let figures: usize = report.reduced.iter().map(|r| r.figures.len()).sum();
            let figure_failures: usize =
                report.reduced.iter().map(|r| r.figure_errors.len()).sum();
            let channels: usize = report.reduced.iter().map(|r| r.channels_converted).sum();

            print_summary(
                "Reduction Complete",
                &[
                    ("Data directory", config.paths.data_dir.display().to_string()),
                    ("Reduced directory", config.paths.reduced_dir().display().to_string()),
                    ("Tests reduced", report.reduced.len().to_string()),
                    ("Tests failed", report.failed.len().to_string()),
                    ("Channels converted", channels.to_string()),
                    ("Figures written", figures.to_string()),
                    ("Figures failed", figure_failures.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );

            if report.reduced.is_empty() && !report.failed.is_empty() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Reduction failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn export_profiles(
    test_name: &str,
    groups: &[SensorGroup],
    output_dir: &Path,
    config: &ReductionConfig,
) -> anyhow::Result<Vec<(String, PathBuf, usize)>> {
    let path = config.paths.data_dir.join(format!("{}.csv", test_name));
    if !path.exists() {
        bail!("raw data file {} not found", path.display());
    }
    let test = reduction::RawTest {
        name: test_name.to_string(),
        path,
    };

    let context = reduction::ReductionContext::new(config).context("loading test tables")?;
    let prepared = context
        .prepare(&test)
        .with_context(|| format!("preparing {}", test_name))?;

    let mut written = Vec::new();
    for group in groups {
        let profile = convective::build_probe_profile(&prepared, group, &config.processing);
        if profile.probes.is_empty() {
            info!("Test {}: no probes for {}", test_name, group.tag());
            continue;
        }
        let csv_path = profile
            .write_csv(output_dir)
            .with_context(|| format!("writing {} profile", group.tag()))?;
        written.push((group.tag().to_string(), csv_path, profile.probes.len()));
    }

    Ok(written)
}

fn cmd_profile(test: &str, groups: &[String], output_dir: Option<PathBuf>, config: &ReductionConfig) {
    let start = Instant::now();

    let groups: Vec<SensorGroup> = if groups.is_empty() {
        config.profile_groups.clone()
    } else {
        groups.iter().map(|g| SensorGroup::new([g.as_str()])).collect()
    };
    let output_dir = output_dir.unwrap_or_else(|| config.paths.reduced_dir().to_path_buf());

    println!("Exporting probe profiles...");
    println!("Test: {}", test);
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Converting probe arrays...");

    match export_profiles(test, &groups, &output_dir, config) {
        Ok(written) => {
            spinner.finish_and_clear();

            let mut items = vec![("Test", test.to_string())];
            for (tag, path, probes) in &written {
                println!("{}: {} probes -> {}", tag, probes, path.display());
            }
            items.push(("Profiles written", written.len().to_string()));
            items.push(("Duration", format!("{:.2?}", start.elapsed())));

            print_summary("Profile Export Complete", &items);
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Profile export failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_average(
    files: &[PathBuf],
    output: &Path,
    channels: &[String],
    valid_min: f64,
    valid_max: f64,
    figure: Option<&Path>,
    config: &ReductionConfig,
) {
    let start = Instant::now();

    println!("Averaging {} replicates...", files.len());
    println!("Output: {}", output.display());
    println!("Valid range: [{}, {}]", valid_min, valid_max);

    let spinner = create_spinner("Averaging replicate channels...");

    let result = replicates::average_replicates(
        files,
        channels,
        &config.processing.time_column,
        valid_min,
        valid_max,
    )
    .context("averaging replicates")
    .and_then(|table| {
        crate::core::write_table_csv(output, &table)
            .with_context(|| format!("writing {}", output.display()))?;
        Ok(table)
    })
    .and_then(|table| {
        let Some(path) = figure else {
            return Ok((table, None));
        };
        let time_column = &config.processing.time_column;
        match replicates::plan_average_figure(&table, time_column, path) {
            Some(plan) => {
                render_figure(&plan, (config.plots.width, config.plots.height))
                    .with_context(|| format!("drawing {}", path.display()))?;
                Ok((table, Some(path)))
            }
            None => {
                warn!("No finite averaged values, skipping figure {}", path.display());
                Ok((table, None))
            }
        }
    });

    spinner.finish_and_clear();

    match result {
        Ok((table, drawn)) => {
            print_summary(
                "Replicate Average Complete",
                &[
                    ("Replicates", files.len().to_string()),
                    ("Columns", table.columns.len().to_string()),
                    ("Rows", table.len().to_string()),
                    ("Output file", output.display().to_string()),
                    (
                        "Figure",
                        drawn.map_or_else(|| "none".to_string(), |p| p.display().to_string()),
                    ),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Averaging failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_properties(temperature: f64) {
    let density = properties::density(temperature);
    let heat_capacity = properties::heat_capacity(temperature);

    let show = |value: Result<f64, properties::PropertyError>| match value {
        Ok(v) => format!("{:.6}", v),
        Err(e) => e.to_string(),
    };

    print_summary(
        "Air Properties",
        &[
            ("Temperature (°C)", temperature.to_string()),
            ("Density (kg/m³)", show(density)),
            ("Cp (kJ/kg·K)", show(heat_capacity)),
        ],
    );

    if density.is_err() && heat_capacity.is_err() {
        std::process::exit(1);
    }
}

fn cmd_init_config(path: &Path, config: &ReductionConfig) {
    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration template to {}", path.display()),
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
