//! Device configuration, `cfg.json`.
//!
//! The same file is shared with the microcontroller: it gets everything
//! except the keys only the Pi cares about.

use std::{fs, path::Path};

use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::ProtocolError,
    tz,
    types::units::SpeedUnit,
};

fn utc() -> Tz {
    Tz::UTC
}

/// Keys that are never sent to the microcontroller
pub const HOST_ONLY_KEYS: [&str; 2] = ["24H", "TMZ"];

macro_rules! flag {
    ($name:ident, $off:ident, $on:ident) => {
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub enum $name {
            #[default]
            $off,
            $on,
        }

        impl TryFrom<i64> for $name {
            type Error = String;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    0 => Ok($name::$off),
                    1 => Ok($name::$on),
                    other => Err(format!(
                        "Invalid {} flag: {other}, expected 0 or 1",
                        stringify!($name)
                    )),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                match value {
                    $name::$off => 0,
                    $name::$on => 1,
                }
            }
        }
    };
}

flag!(DateOrder, MonthFirst, DayFirst);
flag!(ClockFormat, TwelveHour, TwentyFourHour);

impl DateOrder {
    pub fn format(self) -> &'static str {
        match self {
            DateOrder::MonthFirst => "%m/%d",
            DateOrder::DayFirst => "%d-%m",
        }
    }
}

impl ClockFormat {
    pub fn format(self) -> &'static str {
        match self {
            ClockFormat::TwelveHour => "%I:%M%p",
            ClockFormat::TwentyFourHour => "%H:%M",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "UNT")]
    pub unit: SpeedUnit,
    #[serde(rename = "DTM", default)]
    pub date_order: DateOrder,
    #[serde(rename = "24H", default)]
    pub clock: ClockFormat,
    #[serde(rename = "TMZ")]
    pub timezone: String,
    /// `timezone`, parsed once on load
    #[serde(skip, default = "utc")]
    zone: Tz,

    /// Settings only the microcontroller firmware understands
    #[serde(flatten)]
    pub device: Map<String, Value>,
}

impl DeviceConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let text = fs::read_to_string(path)
            .with_context(|| format!("Read device config {}", path.display()))?;

        Self::from_json(&text).with_context(|| format!("Load device config {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let mut config: DeviceConfig =
            serde_json::from_str(text).context("Parse device config")?;

        // Fail now rather than on the first fix
        config.zone = tz::parse_zone(&config.timezone).context("Validate timezone")?;

        Ok(config)
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// The object sent in response to a config request
    pub fn wire_payload(&self) -> Result<Value, ProtocolError> {
        let mut value = serde_json::to_value(self).map_err(ProtocolError::Encode)?;

        if let Value::Object(map) = &mut value {
            for key in HOST_ONLY_KEYS {
                map.remove(key);
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const CONFIG: &str = r#"{"UNT": 1, "DTM": 1, "24H": 0, "TMZ": "America/Chicago", "BRT": 200, "PNL": [1, 2]}"#;

    #[test]
    fn parse_known_and_device_keys() {
        let config = DeviceConfig::from_json(CONFIG).unwrap();

        assert_eq!(config.unit, SpeedUnit::Kmh);
        assert_eq!(config.date_order, DateOrder::DayFirst);
        assert_eq!(config.clock, ClockFormat::TwelveHour);
        assert_eq!(config.zone(), chrono_tz::America::Chicago);
        assert_eq!(config.device.get("BRT"), Some(&json!(200)));
    }

    #[test]
    fn wire_payload_drops_host_only_keys() {
        let config = DeviceConfig::from_json(CONFIG).unwrap();

        assert_eq!(
            config.wire_payload().unwrap(),
            json!({"UNT": 1, "DTM": 1, "BRT": 200, "PNL": [1, 2]})
        );
    }

    #[test]
    fn bad_timezone_fails_fast() {
        let err = DeviceConfig::from_json(r#"{"UNT": 0, "TMZ": "Atlantis/Capital"}"#)
            .unwrap_err()
            .to_string();

        assert!(err.contains("timezone"), "{err}");
    }

    #[test]
    fn bad_unit_fails_fast() {
        assert!(DeviceConfig::from_json(r#"{"UNT": 5, "TMZ": "UTC"}"#).is_err());
        assert!(DeviceConfig::from_json(r#"{"UNT": 0, "DTM": 2, "TMZ": "UTC"}"#).is_err());
    }

    #[test]
    fn optional_flags_default() {
        let config = DeviceConfig::from_json(r#"{"UNT": 2, "TMZ": "UTC"}"#).unwrap();

        assert_eq!(config.date_order, DateOrder::MonthFirst);
        assert_eq!(config.clock, ClockFormat::TwelveHour);
        assert!(config.device.is_empty());
    }
}
