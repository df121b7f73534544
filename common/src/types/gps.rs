use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ProtocolError, tz, types::units::MetersPerSecond};

/// gpsd fix quality, `mode` in a TPV report
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum FixMode {
    #[default]
    Unknown,
    NoFix,
    Fix2d,
    Fix3d,
}

impl FixMode {
    pub fn has_fix(self) -> bool {
        matches!(self, FixMode::Fix2d | FixMode::Fix3d)
    }

    /// Character shown after `M:` on the OLED
    pub fn glyph(self) -> char {
        match self {
            FixMode::Fix2d => '2',
            FixMode::Fix3d => '3',
            FixMode::Unknown | FixMode::NoFix => 'D',
        }
    }
}

impl From<u8> for FixMode {
    fn from(value: u8) -> Self {
        match value {
            1 => FixMode::NoFix,
            2 => FixMode::Fix2d,
            3 => FixMode::Fix3d,
            _ => FixMode::Unknown,
        }
    }
}

impl From<FixMode> for u8 {
    fn from(value: FixMode) -> Self {
        match value {
            FixMode::Unknown => 0,
            FixMode::NoFix => 1,
            FixMode::Fix2d => 2,
            FixMode::Fix3d => 3,
        }
    }
}

/// One line of gpsd's JSON stream, only TPV is of interest
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "class")]
pub enum Report {
    #[serde(rename = "TPV")]
    Tpv(Tpv),
    #[serde(other)]
    Other,
}

impl Report {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        Ok(serde_json::from_str(line)?)
    }
}

/// Time-position-velocity report
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Tpv {
    #[serde(default)]
    pub mode: FixMode,
    pub time: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: Option<f64>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Latest report from the GPS, replaced wholesale on every TPV
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct GpsFix {
    pub mode: FixMode,
    pub position: Option<Position>,
    pub speed: MetersPerSecond,
    pub time: Option<DateTime<Utc>>,
}

impl From<&Tpv> for GpsFix {
    fn from(tpv: &Tpv) -> Self {
        let position = match (tpv.lat, tpv.lon) {
            (Some(latitude), Some(longitude)) => Some(Position {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let time = tpv.time.as_deref().and_then(|time| match tz::parse_utc(time, None) {
            Ok(time) => Some(time),
            Err(err) => {
                debug!("Dropping TPV time: {err}");
                None
            }
        });

        Self {
            mode: tpv.mode,
            position,
            speed: MetersPerSecond(tpv.speed.unwrap_or_default()),
            time,
        }
    }
}

impl GpsFix {
    /// Returns the fix only if it is usable for display and tracking
    pub fn valid(&self) -> Option<ValidFix> {
        if !self.mode.has_fix() {
            return None;
        }

        Some(ValidFix {
            mode: self.mode,
            position: self.position?,
            speed: self.speed,
            time: self.time?,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ValidFix {
    pub mode: FixMode,
    pub position: Position,
    pub speed: MetersPerSecond,
    pub time: DateTime<Utc>,
}

/// A fix tagged with the moment it was received, so readers can age it out
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StampedFix {
    pub fix: GpsFix,
    pub received: Instant,
}

impl StampedFix {
    pub fn new(fix: GpsFix, received: Instant) -> Self {
        Self { fix, received }
    }

    pub fn fresh(&self, now: Instant, max_age: Duration) -> Option<ValidFix> {
        if now.saturating_duration_since(self.received) > max_age {
            return None;
        }

        self.fix.valid()
    }
}
