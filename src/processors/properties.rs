//! Air property lookup tables.
//!
//! Density and specific heat capacity of air versus temperature, interpolated
//! piecewise-linearly between tabulated samples. Queries exactly on a sample
//! return that sample; queries outside the table return
//! [`PropertyError::OutOfDomain`]. The `*_clamped` variants return the nearest
//! endpoint instead.

use thiserror::Error;

/// Errors that can occur during property lookups.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PropertyError {
    #[error("value {value} outside table domain [{min}, {max}]")]
    OutOfDomain { value: f64, min: f64, max: f64 },
}

/// Result type for property lookups.
pub type Result<T> = std::result::Result<T, PropertyError>;

/// Offset added to a Celsius temperature before the heat capacity lookup.
pub const HEAT_CAPACITY_KELVIN_OFFSET: f64 = 274.15;

/// Tabulated `(x, y)` samples with strictly increasing `x`.
#[derive(Debug, Clone, Copy)]
pub struct PropertyTable {
    x: &'static [f64],
    y: &'static [f64],
}

/// Air density (kg/m³) versus temperature (°C).
pub const DENSITY: PropertyTable = PropertyTable {
    x: &[
        10.0, 15.0, 20.0, 25.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 200.0, 300.0,
        400.0, 500.0, 1000.0,
    ],
    y: &[
        1.247, 1.225, 1.204, 1.184, 1.165, 1.127, 1.109, 1.060, 1.029, 0.9996, 0.9721, 0.9461,
        0.7461, 0.6159, 0.5243, 0.4565, 0.2772,
    ],
};

/// Air specific heat capacity (kJ/kg·K) versus temperature (K).
pub const HEAT_CAPACITY: PropertyTable = PropertyTable {
    x: &[
        250.0, 300.0, 350.0, 400.0, 450.0, 500.0, 550.0, 600.0, 650.0, 700.0, 750.0, 800.0,
        900.0, 1000.0, 1100.0, 1200.0, 1300.0, 1400.0, 1500.0,
    ],
    y: &[
        1.003, 1.005, 1.008, 1.013, 1.020, 1.029, 1.040, 1.051, 1.063, 1.075, 1.087, 1.099,
        1.121, 1.142, 1.155, 1.173, 1.190, 1.204, 1.216,
    ],
};

impl PropertyTable {
    /// Smallest tabulated input.
    pub fn min(&self) -> f64 {
        self.x[0]
    }

    /// Largest tabulated input.
    pub fn max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    /// Interpolate the table at `value`.
    pub fn lookup(&self, value: f64) -> Result<f64> {
        if !(value >= self.min() && value <= self.max()) {
            return Err(PropertyError::OutOfDomain {
                value,
                min: self.min(),
                max: self.max(),
            });
        }

        // first sample at or above the query
        let i = self.x.partition_point(|&x| x < value);
        if self.x[i] == value {
            return Ok(self.y[i]);
        }

        let (x0, x1) = (self.x[i - 1], self.x[i]);
        let (y0, y1) = (self.y[i - 1], self.y[i]);
        Ok(y1 - (y1 - y0) * (x1 - value) / (x1 - x0))
    }

    /// Interpolate the table, clamping out-of-domain input to the endpoints.
    pub fn lookup_clamped(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        let clamped = value.clamp(self.min(), self.max());
        self.lookup(clamped).unwrap_or(f64::NAN)
    }
}

/// Air density (kg/m³) at a temperature in °C.
///
/// # Example
///
/// ```
/// use fire_reduction::processors::properties::density;
///
/// assert_eq!(density(20.0).unwrap(), 1.204);
/// assert!(density(5.0).is_err());
/// ```
pub fn density(celsius: f64) -> Result<f64> {
    DENSITY.lookup(celsius)
}

/// Air density at a temperature in °C, clamped to the table.
pub fn density_clamped(celsius: f64) -> f64 {
    DENSITY.lookup_clamped(celsius)
}

/// Specific heat capacity (kJ/kg·K) at a temperature in °C.
pub fn heat_capacity(celsius: f64) -> Result<f64> {
    HEAT_CAPACITY.lookup(celsius + HEAT_CAPACITY_KELVIN_OFFSET)
}

/// Specific heat capacity at a temperature in °C, clamped to the table.
pub fn heat_capacity_clamped(celsius: f64) -> f64 {
    HEAT_CAPACITY.lookup_clamped(celsius + HEAT_CAPACITY_KELVIN_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_well_formed() {
        for table in [DENSITY, HEAT_CAPACITY] {
            assert_eq!(table.x.len(), table.y.len());
            assert!(table.x.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_density_interpolation() {
        // midway between 20 (1.204) and 25 (1.184)
        let rho = density(22.5).unwrap();
        assert!((rho - 1.194).abs() < 1e-12);
    }

    #[test]
    fn test_interpolated_values_lie_between_brackets() {
        for table in [DENSITY, HEAT_CAPACITY] {
            for i in 1..table.x.len() {
                let (x0, x1) = (table.x[i - 1], table.x[i]);
                let (lo, hi) = if table.y[i - 1] < table.y[i] {
                    (table.y[i - 1], table.y[i])
                } else {
                    (table.y[i], table.y[i - 1])
                };
                for frac in [0.1, 0.25, 0.5, 0.9] {
                    let v = table.lookup(x0 + (x1 - x0) * frac).unwrap();
                    assert!(v >= lo && v <= hi, "{} not in [{}, {}]", v, lo, hi);
                }
            }
        }
    }

    #[test]
    fn test_exact_sample_points() {
        assert_eq!(density(10.0).unwrap(), 1.247);
        assert_eq!(density(100.0).unwrap(), 0.9461);
        assert_eq!(density(1000.0).unwrap(), 0.2772);
        assert_eq!(HEAT_CAPACITY.lookup(250.0).unwrap(), 1.003);
        assert_eq!(HEAT_CAPACITY.lookup(1500.0).unwrap(), 1.216);
    }

    #[test]
    fn test_out_of_domain() {
        assert_eq!(
            density(5.0),
            Err(PropertyError::OutOfDomain {
                value: 5.0,
                min: 10.0,
                max: 1000.0
            })
        );
        assert!(density(1000.5).is_err());
        assert!(density(f64::NAN).is_err());
        assert!(heat_capacity(-30.0).is_err());
    }

    #[test]
    fn test_clamped_lookups() {
        assert_eq!(density_clamped(-20.0), 1.247);
        assert_eq!(density_clamped(1500.0), 0.2772);
        assert_eq!(heat_capacity_clamped(2000.0), 1.216);
        assert!(density_clamped(f64::NAN).is_nan());
    }

    #[test]
    fn test_heat_capacity_uses_kelvin_offset() {
        // 25.85 °C -> 300 K exactly
        let cp = heat_capacity(300.0 - HEAT_CAPACITY_KELVIN_OFFSET).unwrap();
        assert!((cp - 1.005).abs() < 1e-12);

        // 100 °C -> 374.15 K, between 350 (1.008) and 400 (1.013)
        let cp = heat_capacity(100.0).unwrap();
        assert!(cp > 1.008 && cp < 1.013);
    }
}
