use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::peripheral::ssd1306::Ssd1306;

/// Settings for the Pi side of the bike computer, `bike_config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BikeConfig {
    /// Shared with the microcontroller
    pub device_config: PathBuf,
    #[serde(default = "default_tracking_dir")]
    pub tracking_dir: PathBuf,

    #[serde(default)]
    pub serial: SerialDefinition,
    #[serde(default)]
    pub gps: GpsDefinition,
    #[serde(default)]
    pub display: DisplayDefinition,
    #[serde(default)]
    pub link: LinkDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialDefinition {
    pub path: PathBuf,
    pub baud_rate: u32,
    pub stop_bits: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsDefinition {
    pub address: String,
    /// Start gpsd ourselves before connecting
    pub launch: Option<GpsdLaunch>,
    pub stale_after_ms: u64,
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsdLaunch {
    pub device: PathBuf,
    pub control_socket: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayDefinition {
    pub i2c_bus: u8,
    pub address: u16,
    pub refresh_hz: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkDefinition {
    pub tick_ms: u64,
}

impl BikeConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let text = fs::read_to_string(path)
            .with_context(|| format!("Read bike config {}", path.display()))?;

        Self::from_toml(&text).with_context(|| format!("Load bike config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: BikeConfig = toml::from_str(text).context("Parse bike config")?;

        let refresh_hz = config.display.refresh_hz;
        if !(refresh_hz.is_finite() && refresh_hz > 0.0) {
            bail!("display.refresh_hz must be a positive number, got {refresh_hz}");
        }
        if config.link.tick_ms == 0 {
            bail!("link.tick_ms must be at least 1");
        }

        Ok(config)
    }
}

impl GpsDefinition {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl LinkDefinition {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

fn default_tracking_dir() -> PathBuf {
    "tracking".into()
}

impl Default for SerialDefinition {
    fn default() -> Self {
        Self {
            path: "/dev/ttyACM0".into(),
            baud_rate: 115_200,
            stop_bits: 2,
        }
    }
}

impl Default for GpsDefinition {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:2947".to_owned(),
            launch: None,
            stale_after_ms: 5_000,
            read_timeout_ms: 500,
        }
    }
}

impl Default for DisplayDefinition {
    fn default() -> Self {
        Self {
            i2c_bus: Ssd1306::I2C_BUS,
            address: Ssd1306::I2C_ADDRESS,
            refresh_hz: 5.0,
        }
    }
}

impl Default for LinkDefinition {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = BikeConfig::from_toml(r#"device_config = "cfg.json""#).unwrap();

        assert_eq!(config.tracking_dir, PathBuf::from("tracking"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.gps.address, "127.0.0.1:2947");
        assert!(config.gps.launch.is_none());
        assert_eq!(config.gps.stale_after(), Duration::from_secs(5));
        assert_eq!(config.display.address, 0x3C);
        assert_eq!(config.link.tick(), Duration::from_millis(10));
    }

    #[test]
    fn full_config() {
        let config = BikeConfig::from_toml(
            r#"
            device_config = "/home/pi/bike/cfg.json"
            tracking_dir = "/home/pi/bike/tracking"

            [serial]
            path = "/dev/ttyUSB0"

            [gps]
            stale_after_ms = 3000
            launch = { device = "/dev/serial0", control_socket = "/var/run/gpsd.sock" }

            [display]
            refresh_hz = 4.0
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.path, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.serial.stop_bits, 2);
        assert_eq!(config.gps.stale_after(), Duration::from_secs(3));
        assert_eq!(
            config.gps.launch.unwrap().device,
            PathBuf::from("/dev/serial0")
        );
        assert_eq!(config.display.refresh_hz, 4.0);
        assert_eq!(config.display.i2c_bus, 1);
    }

    #[test]
    fn shipped_configs_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"));

        let config = BikeConfig::load(dir.join("bike_config.toml")).unwrap();
        let device = common::config::DeviceConfig::load(dir.join(&config.device_config)).unwrap();

        assert!(config.gps.launch.is_some());
        assert_eq!(device.timezone, "America/New_York");
    }

    #[test]
    fn bad_refresh_rate_is_rejected() {
        for rate in ["0.0", "-5.0", "nan", "inf"] {
            let text = format!("device_config = \"cfg.json\"\n[display]\nrefresh_hz = {rate}\n");

            let err = BikeConfig::from_toml(&text).unwrap_err().to_string();
            assert!(err.contains("refresh_hz"), "{rate}: {err}");
        }
    }

    #[test]
    fn zero_tick_is_rejected() {
        let text = "device_config = \"cfg.json\"\n[link]\ntick_ms = 0\n";

        assert!(BikeConfig::from_toml(text).is_err());
    }
}
