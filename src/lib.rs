//! Fire-test sensor data reduction.
//!
//! This crate provides tools for:
//! - Loading raw test data, calibration tables and test descriptions
//! - Converting thermocouple, probe, heat flux, gas and hose channels to
//!   physical units
//! - Smoothing and time-aligning channels, then plotting one figure per
//!   sensor group
//! - Exporting probe-array profiles and averaging replicate tests
//!
//! # Example
//!
//! ```no_run
//! use fire_reduction::{processors::reduction::run_batch, ReductionConfig};
//!
//! let config = ReductionConfig::default();
//! let report = run_batch(&config, |test| println!("{}", test)).unwrap();
//! println!("{} tests reduced", report.reduced.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{PlotConfig, ProcessingConfig, ReductionConfig, SensorGroup};
pub use core::loaders::{DataTable, TestDescriptor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
