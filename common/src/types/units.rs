use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::UnitError;

/// Ground speed as reported by gpsd
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialOrd, PartialEq)]
pub struct MetersPerSecond(pub f64);

impl Display for MetersPerSecond {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:.2}m/s", self.0))
    }
}

impl From<f64> for MetersPerSecond {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// Unit the rider wants speed displayed in, stored as `UNT` in the device config
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SpeedUnit {
    #[default]
    Mph,
    Kmh,
    Mps,
}

impl SpeedUnit {
    pub fn factor(self) -> f64 {
        match self {
            SpeedUnit::Mph => 2.237,
            SpeedUnit::Kmh => 3.6,
            SpeedUnit::Mps => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedUnit::Mph => "mph",
            SpeedUnit::Kmh => "km/h",
            SpeedUnit::Mps => "m/s",
        }
    }

    /// Converts to the integer shown on the OLED and the LED panel.
    ///
    /// Truncates rather than rounds.
    pub fn convert(self, speed: MetersPerSecond) -> i64 {
        (speed.0 * self.factor()) as i64
    }
}

impl TryFrom<i64> for SpeedUnit {
    type Error = UnitError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SpeedUnit::Mph),
            1 => Ok(SpeedUnit::Kmh),
            2 => Ok(SpeedUnit::Mps),
            other => Err(UnitError::InvalidArgument(other)),
        }
    }
}

impl From<SpeedUnit> for i64 {
    fn from(value: SpeedUnit) -> Self {
        match value {
            SpeedUnit::Mph => 0,
            SpeedUnit::Kmh => 1,
            SpeedUnit::Mps => 2,
        }
    }
}

/// Converts a speed using a raw unit code, as found in an unvalidated config
pub fn convert(speed: MetersPerSecond, unit_code: i64) -> Result<i64, UnitError> {
    let unit = SpeedUnit::try_from(unit_code)?;

    Ok(unit.convert(speed))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(SpeedUnit::Mph.convert(MetersPerSecond(10.0)), 22);
        assert_eq!(SpeedUnit::Kmh.convert(MetersPerSecond(10.0)), 36);
        assert_eq!(SpeedUnit::Kmh.convert(MetersPerSecond(0.99 / 3.6)), 0);
        assert_eq!(SpeedUnit::Mps.convert(MetersPerSecond(4.999)), 4);
    }

    #[test]
    fn unknown_unit_code() {
        assert_eq!(
            convert(MetersPerSecond(1.0), 3),
            Err(UnitError::InvalidArgument(3))
        );
        assert_eq!(
            convert(MetersPerSecond(1.0), -1),
            Err(UnitError::InvalidArgument(-1))
        );
        assert_eq!(convert(MetersPerSecond(1.0), 1), Ok(3));
    }

    #[test]
    fn unit_codes_in_json() {
        let unit: SpeedUnit = serde_json::from_str("1").unwrap();
        assert_eq!(unit, SpeedUnit::Kmh);
        assert_eq!(serde_json::to_string(&SpeedUnit::Mps).unwrap(), "2");
        assert!(serde_json::from_str::<SpeedUnit>("7").is_err());
    }

    fn any_unit() -> impl Strategy<Value = SpeedUnit> {
        prop_oneof![
            Just(SpeedUnit::Mph),
            Just(SpeedUnit::Kmh),
            Just(SpeedUnit::Mps)
        ]
    }

    proptest! {
        #[test]
        fn convert_is_floor_of_scaled_speed(speed in 0.0f64..200.0, unit in any_unit()) {
            let expected = (speed * unit.factor()).floor() as i64;
            prop_assert_eq!(unit.convert(MetersPerSecond(speed)), expected);
        }

        #[test]
        fn convert_is_monotonic(a in 0.0f64..200.0, b in 0.0f64..200.0, unit in any_unit()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(unit.convert(MetersPerSecond(lo)) <= unit.convert(MetersPerSecond(hi)));
        }
    }
}
