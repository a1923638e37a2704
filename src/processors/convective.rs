//! Probe-array profiles for convective heat release.
//!
//! For each probe of a bi-directional probe array the profile holds the flow
//! velocity, the gas temperature from the co-located thermocouple and the air
//! density and heat capacity at that temperature.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::warn;
use regex::Regex;

use crate::config::{ProcessingConfig, SensorGroup};
use crate::core::loaders::{Column, DataTable};
use crate::core::writers::{write_table_csv, WriteError};

use super::conversion::probe_velocity_with_temperature;
use super::grouping::eligible_channels;
use super::properties::{density_clamped, heat_capacity_clamped};
use super::reduction::PreparedTest;
use super::sensors::SensorKind;

const KELVIN_OFFSET: f64 = 273.15;

/// Series for one probe of the array.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeColumn {
    pub channel: String,
    /// Trailing number of the channel name, if any
    pub position: Option<u32>,
    pub velocity: Vec<f64>,
    /// Gas temperature in K
    pub temperature: Vec<f64>,
    pub density: Vec<f64>,
    pub heat_capacity: Vec<f64>,
}

/// Profile of one probe array for one test.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeProfile {
    pub test: String,
    pub tag: String,
    pub index_name: String,
    pub index: Vec<String>,
    pub time: Vec<f64>,
    /// Probes ordered by position
    pub probes: Vec<ProbeColumn>,
}

fn trailing_number(channel: &str) -> Option<u32> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+)$").unwrap())
        .captures(channel)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Build the profile of a probe group.
///
/// Probes that cannot be converted are logged and left out. Property lookups
/// clamp to the tabulated temperature range.
pub fn build_probe_profile(
    prepared: &PreparedTest,
    group: &SensorGroup,
    processing: &ProcessingConfig,
) -> ProbeProfile {
    let mut probes: Vec<ProbeColumn> = eligible_channels(
        &prepared.data,
        group,
        &prepared.descriptor,
        &processing.time_column,
        &processing.hose_size_tag,
    )
    .into_iter()
    .filter(|(_, kind)| *kind == SensorKind::BiDirectionalProbe)
    .filter_map(|(channel, _)| {
        let (velocity, temperature_c) = match probe_velocity_with_temperature(
            &prepared.data,
            &channel,
            &prepared.calibration,
            processing.pre_test_time,
        ) {
            Ok(result) => result,
            Err(e) => {
                warn!("Test {}: skipping probe {}: {}", prepared.descriptor.name, channel, e);
                return None;
            }
        };

        Some(ProbeColumn {
            position: trailing_number(&channel),
            velocity,
            temperature: temperature_c.iter().map(|t| t + KELVIN_OFFSET).collect(),
            density: temperature_c.iter().map(|&t| density_clamped(t)).collect(),
            heat_capacity: temperature_c.iter().map(|&t| heat_capacity_clamped(t)).collect(),
            channel,
        })
    })
    .collect();

    // unnumbered probes sort last
    probes.sort_by_key(|p| (p.position.is_none(), p.position));

    ProbeProfile {
        test: prepared.descriptor.name.clone(),
        tag: group.tag().to_string(),
        index_name: prepared.data.index_name.clone(),
        index: prepared.data.index.clone(),
        time: prepared
            .data
            .column(&processing.time_column)
            .map(|c| c.values.clone())
            .unwrap_or_default(),
        probes,
    }
}

impl ProbeProfile {
    /// Flatten into a table: time, then four columns per probe.
    pub fn to_table(&self) -> DataTable {
        let mut table = DataTable::new(self.index_name.clone());
        table.index = self.index.clone();
        table.columns.push(Column::new("Time", self.time.clone()));

        for probe in &self.probes {
            let ch = &probe.channel;
            table
                .columns
                .push(Column::new(format!("{} Velocity (m/s)", ch), probe.velocity.clone()));
            table
                .columns
                .push(Column::new(format!("{} Temperature (K)", ch), probe.temperature.clone()));
            table
                .columns
                .push(Column::new(format!("{} Density (kg/m3)", ch), probe.density.clone()));
            table.columns.push(Column::new(
                format!("{} Heat Capacity (kJ/kg-K)", ch),
                probe.heat_capacity.clone(),
            ));
        }
        table
    }

    /// Write `<dir>/<test>_<tag>_Profile.csv` and return its path.
    pub fn write_csv(&self, dir: &Path) -> Result<PathBuf, WriteError> {
        let path = dir.join(format!("{}_{}_Profile.csv", self.test, self.tag));
        write_table_csv(&path, &self.to_table())?;
        Ok(path)
    }
}
