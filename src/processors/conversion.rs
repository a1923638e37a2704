//! Conversion of raw channel readings to physical units.
//!
//! Each sensor kind maps to one formula:
//!
//! ```text
//! thermocouple  T = raw * slope + intercept                       (°C)
//! probe         p = 0.4 * 248.8 * (raw - zero)                    (Pa)
//!               v = 0.0698 * sqrt(|p| * (T_tc + 273.15)) * sign(p) (m/s)
//! heat flux     q = (raw - zero) * slope + intercept              (kW/m²)
//! gas           c = raw * slope + intercept                       (%)
//! hose          P = raw * slope + intercept                       (psi)
//! ```
//!
//! `zero` is the mean of the first `pre_test_time` samples of the channel and
//! `T_tc` is the calibrated temperature of the probe's companion thermocouple
//! (`BDP_` prefix replaced by `TC_`).

use thiserror::Error;

use crate::core::loaders::{CalibrationRecord, CalibrationTable, DataTable};
use crate::core::transforms::zero_baseline;

use super::sensors::{LineStyle, Quantity, SensorKind};

/// Inches of water per volt of probe transducer output.
pub const PROBE_INCH_H2O_PER_VOLT: f64 = 0.4;

/// Pascals per inch of water.
pub const PASCAL_PER_INCH_H2O: f64 = 248.8;

/// Probe coefficient of the velocity relation.
pub const PROBE_VELOCITY_COEFFICIENT: f64 = 0.0698;

const KELVIN_OFFSET: f64 = 273.15;

/// Errors that can occur while converting a single channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("channel {channel} not found in data")]
    MissingChannel { channel: String },

    #[error("no calibration record for channel {channel}")]
    MissingCalibration { channel: String },

    #[error("probe {channel} has no companion thermocouple {companion}")]
    MissingCompanion { channel: String, companion: String },
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// A channel converted to physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedChannel {
    pub name: String,
    /// Legend label from the calibration table.
    pub label: String,
    pub kind: SensorKind,
    pub values: Vec<f64>,
}

impl ConvertedChannel {
    pub fn quantity(&self) -> Quantity {
        self.kind.quantity()
    }

    pub fn line_style(&self) -> LineStyle {
        self.kind.line_style()
    }
}

/// `raw * slope + intercept`
pub fn linear(raw: &[f64], slope: f64, intercept: f64) -> Vec<f64> {
    raw.iter().map(|&v| v * slope + intercept).collect()
}

/// `(raw - zero) * slope + intercept`
pub fn linear_from_zero(raw: &[f64], zero: f64, slope: f64, intercept: f64) -> Vec<f64> {
    raw.iter().map(|&v| (v - zero) * slope + intercept).collect()
}

/// Differential pressure (Pa) from probe transducer voltage.
pub fn probe_pressure(raw: &[f64], zero: f64) -> Vec<f64> {
    raw.iter()
        .map(|&v| PROBE_INCH_H2O_PER_VOLT * PASCAL_PER_INCH_H2O * (v - zero))
        .collect()
}

/// Sign as -1, 0 or 1; NaN stays NaN.
#[inline]
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x * 0.0
    }
}

/// Flow velocity (m/s) from differential pressure and gas temperature (°C).
///
/// The velocity carries the sign of the pressure and is exactly zero when the
/// pressure is zero.
pub fn probe_velocity(pressure: &[f64], gas_temperature_c: &[f64]) -> Vec<f64> {
    pressure
        .iter()
        .zip(gas_temperature_c)
        .map(|(&p, &t)| {
            let v = PROBE_VELOCITY_COEFFICIENT * (p.abs() * (t + KELVIN_OFFSET)).sqrt() * sign(p);
            // avoid -0.0 for negative zero pressure
            if v == 0.0 {
                0.0
            } else {
                v
            }
        })
        .collect()
}

/// Name of the thermocouple co-located with a probe channel.
pub fn companion_thermocouple(channel: &str) -> Option<String> {
    channel.strip_prefix("BDP_").map(|rest| format!("TC_{}", rest))
}

fn raw_values<'a>(table: &'a DataTable, channel: &str) -> Result<&'a [f64]> {
    table
        .column(channel)
        .map(|c| c.values.as_slice())
        .ok_or_else(|| ConversionError::MissingChannel {
            channel: channel.to_string(),
        })
}

fn calibration_for<'a>(calibration: &'a CalibrationTable, channel: &str) -> Result<&'a CalibrationRecord> {
    calibration
        .get(channel)
        .ok_or_else(|| ConversionError::MissingCalibration {
            channel: channel.to_string(),
        })
}

/// Calibrated temperature (°C) of a thermocouple channel.
pub fn thermocouple_temperature(
    table: &DataTable,
    channel: &str,
    calibration: &CalibrationTable,
) -> Result<Vec<f64>> {
    let raw = raw_values(table, channel)?;
    let record = calibration_for(calibration, channel)?;
    Ok(linear(raw, record.slope, record.intercept))
}

/// Probe velocity (m/s) together with the companion gas temperature (°C).
pub fn probe_velocity_with_temperature(
    table: &DataTable,
    channel: &str,
    calibration: &CalibrationTable,
    pre_test_time: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let raw = raw_values(table, channel)?;
    let companion = companion_thermocouple(channel).ok_or_else(|| ConversionError::MissingCompanion {
        channel: channel.to_string(),
        companion: String::new(),
    })?;
    if table.column(&companion).is_none() {
        return Err(ConversionError::MissingCompanion {
            channel: channel.to_string(),
            companion,
        });
    }
    let temperature = thermocouple_temperature(table, &companion, calibration)?;

    let pressure = probe_pressure(raw, zero_baseline(raw, pre_test_time));
    Ok((probe_velocity(&pressure, &temperature), temperature))
}

/// Convert one channel of `table` to physical units.
///
/// The table holds smoothed raw readings; it is not modified. Probe channels
/// read their companion thermocouple from the same table and convert it with
/// its own calibration record.
///
/// # Errors
///
/// Fails if the channel or its calibration record is missing, or, for probes,
/// if the companion thermocouple or its calibration is missing.
pub fn convert_channel(
    table: &DataTable,
    channel: &str,
    kind: SensorKind,
    calibration: &CalibrationTable,
    pre_test_time: usize,
) -> Result<ConvertedChannel> {
    let raw = raw_values(table, channel)?;
    let record = calibration_for(calibration, channel)?;

    let values = match kind {
        SensorKind::BiDirectionalProbe => {
            probe_velocity_with_temperature(table, channel, calibration, pre_test_time)?.0
        }
        _ if kind.uses_zero_baseline() => linear_from_zero(
            raw,
            zero_baseline(raw, pre_test_time),
            record.slope,
            record.intercept,
        ),
        _ => linear(raw, record.slope, record.intercept),
    };

    Ok(ConvertedChannel {
        name: channel.to_string(),
        label: record.display_name.clone(),
        kind,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::Column;

    fn record(slope: f64, intercept: f64, name: &str) -> CalibrationRecord {
        CalibrationRecord {
            slope,
            intercept,
            display_name: name.to_string(),
        }
    }

    fn table(columns: Vec<Column>) -> DataTable {
        let n = columns.first().map_or(0, |c| c.values.len());
        DataTable {
            index_name: "TimeStamp(s)".to_string(),
            index: (0..n).map(|i| i.to_string()).collect(),
            columns,
        }
    }

    #[test]
    fn test_thermocouple_identity() {
        let data = table(vec![Column::new("TC_A1_1", vec![20.0, 21.0, 22.0])]);
        let mut cal = CalibrationTable::default();
        cal.insert("TC_A1_1", record(1.0, 0.0, "TC 1"));

        let converted = convert_channel(
            &data,
            "TC_A1_1",
            SensorKind::Thermocouple { helmet: false },
            &cal,
            60,
        )
        .unwrap();

        assert_eq!(converted.values, vec![20.0, 21.0, 22.0]);
        assert_eq!(converted.label, "TC 1");
        assert_eq!(converted.quantity(), Quantity::Temperature);
    }

    #[test]
    fn test_identity_for_every_linear_kind() {
        let raw = vec![0.5, -1.25, 3.0];
        let mut cal = CalibrationTable::default();
        let kinds = [
            ("HF_A1", SensorKind::HeatFlux),
            ("RAD_A1", SensorKind::Radiometer),
            ("CO2_A1", SensorKind::Gas),
            ("HOSE_2p5_A", SensorKind::HosePressure),
        ];
        let mut columns = Vec::new();
        for (name, _) in &kinds {
            cal.insert(*name, record(1.0, 0.0, name));
            columns.push(Column::new(*name, raw.clone()));
        }
        let data = table(columns);

        // zero baseline of 0 samples is 0, so heat flux is the identity too
        for (name, kind) in kinds {
            let converted = convert_channel(&data, name, kind, &cal, 0).unwrap();
            assert_eq!(converted.values, raw, "{}", name);
        }
    }

    #[test]
    fn test_heat_flux_subtracts_baseline() {
        let data = table(vec![Column::new("HF_A1", vec![1.0, 1.0, 3.0, 5.0])]);
        let mut cal = CalibrationTable::default();
        cal.insert("HF_A1", record(2.0, 0.5, "HF"));

        let converted = convert_channel(&data, "HF_A1", SensorKind::HeatFlux, &cal, 2).unwrap();
        assert_eq!(converted.values, vec![0.5, 0.5, 4.5, 8.5]);
    }

    #[test]
    fn test_baseline_only_for_zeroed_kinds() {
        let raw = vec![2.0, 2.0, 6.0];
        let kinds = [
            ("TC_A1_1", SensorKind::Thermocouple { helmet: false }, vec![2.0, 2.0, 6.0]),
            ("CO_A1", SensorKind::Gas, vec![2.0, 2.0, 6.0]),
            ("HF_A1", SensorKind::HeatFlux, vec![0.0, 0.0, 4.0]),
            ("RAD_A1", SensorKind::Radiometer, vec![0.0, 0.0, 4.0]),
        ];
        let mut cal = CalibrationTable::default();
        let mut columns = Vec::new();
        for (name, _, _) in &kinds {
            cal.insert(*name, record(1.0, 0.0, name));
            columns.push(Column::new(*name, raw.clone()));
        }
        let data = table(columns);

        for (name, kind, expected) in kinds {
            let converted = convert_channel(&data, name, kind, &cal, 2).unwrap();
            assert_eq!(converted.values, expected, "{}", name);
        }
    }

    #[test]
    fn test_probe_velocity_scenario() {
        let raw = vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0];
        let data = table(vec![
            Column::new("BDP_A4_1", raw.clone()),
            Column::new("TC_A4_1", vec![20.0; 7]),
        ]);
        let mut cal = CalibrationTable::default();
        cal.insert("BDP_A4_1", record(1.0, 0.0, "Probe 1"));
        cal.insert("TC_A4_1", record(1.0, 0.0, "TC 1"));

        let converted =
            convert_channel(&data, "BDP_A4_1", SensorKind::BiDirectionalProbe, &cal, 5).unwrap();

        let expected: Vec<f64> = raw
            .iter()
            .map(|&v| {
                let p = 0.4 * 248.8 * v;
                0.0698 * (p * 293.15_f64).sqrt()
            })
            .collect();
        for (got, want) in converted.values.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-12);
        }
        assert_eq!(&converted.values[..5], &[0.0; 5]);
        assert_eq!(converted.quantity(), Quantity::Velocity);
    }

    #[test]
    fn test_velocity_sign_follows_pressure() {
        let pressure = vec![-50.0, -0.5, 0.0, -0.0, 0.5, 50.0];
        let velocity = probe_velocity(&pressure, &[25.0; 6]);

        for (p, v) in pressure.iter().zip(&velocity) {
            if *p == 0.0 {
                assert_eq!(*v, 0.0);
                assert!(v.is_sign_positive());
            } else {
                assert_eq!(p.signum(), v.signum());
            }
        }
    }

    #[test]
    fn test_probe_missing_companion() {
        let data = table(vec![Column::new("BDP_A4_1", vec![0.0, 1.0])]);
        let mut cal = CalibrationTable::default();
        cal.insert("BDP_A4_1", record(1.0, 0.0, "Probe 1"));

        let result = convert_channel(&data, "BDP_A4_1", SensorKind::BiDirectionalProbe, &cal, 5);
        assert_eq!(
            result,
            Err(ConversionError::MissingCompanion {
                channel: "BDP_A4_1".to_string(),
                companion: "TC_A4_1".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_calibration() {
        let data = table(vec![Column::new("TC_A1_1", vec![1.0])]);
        let cal = CalibrationTable::default();

        let result = convert_channel(
            &data,
            "TC_A1_1",
            SensorKind::Thermocouple { helmet: false },
            &cal,
            60,
        );
        assert_eq!(
            result,
            Err(ConversionError::MissingCalibration {
                channel: "TC_A1_1".to_string()
            })
        );
    }

    #[test]
    fn test_companion_thermocouple() {
        assert_eq!(companion_thermocouple("BDP_A10_3").as_deref(), Some("TC_A10_3"));
        assert_eq!(companion_thermocouple("TC_A10_3"), None);
    }
}
