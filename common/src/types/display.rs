use chrono::{DateTime, NaiveDateTime, Utc};

use super::{gps::FixMode, tracking::TrackingState, units::MetersPerSecond, units::SpeedUnit};

/// Everything the OLED needs for one frame.
///
/// Written by the link controller once per tick and read by the renderer at
/// its own pace.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DisplayState {
    pub speed: MetersPerSecond,
    pub unit: SpeedUnit,
    /// Wall clock time in the configured zone
    pub datetime: NaiveDateTime,
    pub mode: FixMode,
    pub track: TrackingState,
}

impl DisplayState {
    pub fn idle(unit: SpeedUnit) -> Self {
        Self {
            speed: MetersPerSecond(0.0),
            unit,
            datetime: DateTime::<Utc>::default().naive_utc(),
            mode: FixMode::Unknown,
            track: TrackingState::Stopped,
        }
    }
}
