//! Sensor classification by channel-name prefix.

/// Kind of instrument behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// `TC_`; `helmet` for `TC_Helmet_` channels
    Thermocouple { helmet: bool },
    /// `BDP_` bi-directional pressure probe
    BiDirectionalProbe,
    /// `HF_` heat flux gauge
    HeatFlux,
    /// `RAD_` radiometer
    Radiometer,
    /// `GAS_`, `CO_`, `CO2_` or `O2_` analyzer
    Gas,
    /// `HOSE_` hose pressure transducer
    HosePressure,
}

/// Prefix table, checked in order; the first match classifies the channel.
const PREFIXES: &[(&str, SensorKind)] = &[
    ("TC_Helmet_", SensorKind::Thermocouple { helmet: true }),
    ("TC_", SensorKind::Thermocouple { helmet: false }),
    ("BDP_", SensorKind::BiDirectionalProbe),
    ("HF_", SensorKind::HeatFlux),
    ("RAD_", SensorKind::Radiometer),
    ("GAS_", SensorKind::Gas),
    ("CO2_", SensorKind::Gas),
    ("CO_", SensorKind::Gas),
    ("O2_", SensorKind::Gas),
    ("HOSE_", SensorKind::HosePressure),
];

/// Classify a channel by its name prefix.
///
/// Returns `None` for channels with no known prefix; those are never
/// converted or plotted.
pub fn classify(channel: &str) -> Option<SensorKind> {
    PREFIXES
        .iter()
        .find(|(prefix, _)| channel.starts_with(prefix))
        .map(|&(_, kind)| kind)
}

/// Physical quantity plotted for a sensor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Temperature,
    HelmetTemperature,
    Velocity,
    HeatFlux,
    Concentration,
    Pressure,
}

/// Line style of a plotted series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

/// Secondary y-axis showing the primary quantity in alternate units.
#[derive(Debug, Clone, Copy)]
pub struct SecondaryAxis {
    pub label: &'static str,
    convert: fn(f64) -> f64,
}

impl SecondaryAxis {
    pub fn convert(&self, value: f64) -> f64 {
        (self.convert)(value)
    }
}

fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

fn mps_to_mph(v: f64) -> f64 {
    v * 2.23694
}

impl SensorKind {
    /// Quantity produced by converting this kind of sensor.
    pub fn quantity(&self) -> Quantity {
        match self {
            SensorKind::Thermocouple { helmet: false } => Quantity::Temperature,
            SensorKind::Thermocouple { helmet: true } => Quantity::HelmetTemperature,
            SensorKind::BiDirectionalProbe => Quantity::Velocity,
            SensorKind::HeatFlux | SensorKind::Radiometer => Quantity::HeatFlux,
            SensorKind::Gas => Quantity::Concentration,
            SensorKind::HosePressure => Quantity::Pressure,
        }
    }

    pub fn line_style(&self) -> LineStyle {
        match self {
            SensorKind::Radiometer => LineStyle::Dashed,
            _ => LineStyle::Solid,
        }
    }

    /// True if the conversion subtracts a pre-test zero baseline.
    pub fn uses_zero_baseline(&self) -> bool {
        matches!(
            self,
            SensorKind::BiDirectionalProbe | SensorKind::HeatFlux | SensorKind::Radiometer
        )
    }
}

impl Quantity {
    /// Primary y-axis label.
    pub fn axis_label(&self) -> &'static str {
        match self {
            Quantity::Temperature | Quantity::HelmetTemperature => "Temperature (°C)",
            Quantity::Velocity => "Velocity (m/s)",
            Quantity::HeatFlux => "Heat Flux (kW/m²)",
            Quantity::Concentration => "Concentration (%)",
            Quantity::Pressure => "Pressure (psi)",
        }
    }

    /// Description-table column holding the axis limit for this quantity.
    pub fn scale_column(&self) -> &'static str {
        match self {
            Quantity::Temperature => "Y Scale TC",
            Quantity::HelmetTemperature => "Y Scale TC_Helmet",
            Quantity::Velocity => "Y Scale BDP",
            Quantity::HeatFlux => "Y Scale HF",
            Quantity::Concentration => "Y Scale GAS",
            Quantity::Pressure => "Y Scale HOSE",
        }
    }

    /// True if the axis spans `[-limit, limit]` rather than `[0, limit]`.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Quantity::Velocity)
    }

    pub fn secondary_axis(&self) -> Option<SecondaryAxis> {
        match self {
            Quantity::Temperature | Quantity::HelmetTemperature => Some(SecondaryAxis {
                label: "Temperature (°F)",
                convert: celsius_to_fahrenheit,
            }),
            Quantity::Velocity => Some(SecondaryAxis {
                label: "Velocity (mph)",
                convert: mps_to_mph,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(classify("TC_A1_1"), Some(SensorKind::Thermocouple { helmet: false }));
        assert_eq!(classify("TC_Helmet_1"), Some(SensorKind::Thermocouple { helmet: true }));
        assert_eq!(classify("BDP_A4_1"), Some(SensorKind::BiDirectionalProbe));
        assert_eq!(classify("HF_A1"), Some(SensorKind::HeatFlux));
        assert_eq!(classify("RAD_A1"), Some(SensorKind::Radiometer));
        assert_eq!(classify("CO2_A1"), Some(SensorKind::Gas));
        assert_eq!(classify("O2_A1"), Some(SensorKind::Gas));
        assert_eq!(classify("GAS_CO_1"), Some(SensorKind::Gas));
        assert_eq!(classify("HOSE_2p5_1"), Some(SensorKind::HosePressure));
    }

    #[test]
    fn test_classify_is_unambiguous() {
        // contains "TC_" but is a probe; substring checks would match both
        assert_eq!(classify("BDP_TC_A1"), Some(SensorKind::BiDirectionalProbe));
        assert_eq!(classify("HF_RAD_1"), Some(SensorKind::HeatFlux));
        assert_eq!(classify("Time"), None);
        assert_eq!(classify("XTC_A1_1"), None);
    }

    #[test]
    fn test_quantities_and_styles() {
        assert_eq!(SensorKind::Radiometer.quantity(), Quantity::HeatFlux);
        assert_eq!(SensorKind::Radiometer.line_style(), LineStyle::Dashed);
        assert_eq!(SensorKind::HeatFlux.line_style(), LineStyle::Solid);
        assert_eq!(
            SensorKind::Thermocouple { helmet: true }.quantity().scale_column(),
            "Y Scale TC_Helmet"
        );
        assert!(Quantity::Velocity.is_symmetric());
        assert!(!Quantity::Pressure.is_symmetric());
        assert!(SensorKind::BiDirectionalProbe.uses_zero_baseline());
        assert!(!SensorKind::Gas.uses_zero_baseline());
    }

    #[test]
    fn test_secondary_axes() {
        let temp = Quantity::Temperature.secondary_axis().unwrap();
        assert_eq!(temp.convert(100.0), 212.0);

        let vel = Quantity::Velocity.secondary_axis().unwrap();
        assert!((vel.convert(10.0) - 22.3694).abs() < 1e-9);

        assert!(Quantity::HeatFlux.secondary_axis().is_none());
    }
}
