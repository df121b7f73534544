use serde::{Deserialize, Serialize};

/// Ride tracking state, shown on the green LED and the OLED
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TrackingState {
    #[default]
    Stopped,
    Paused,
    Tracking,
}

impl TrackingState {
    /// 0 = off, 1 = blinking, 2 = on
    pub fn led(self) -> u8 {
        self.into()
    }

    /// Glyph drawn in the bottom right of the OLED
    pub fn glyph(self) -> &'static str {
        match self {
            TrackingState::Stopped => "",
            TrackingState::Paused => "P",
            TrackingState::Tracking => "T",
        }
    }
}

impl From<TrackingState> for u8 {
    fn from(value: TrackingState) -> Self {
        match value {
            TrackingState::Stopped => 0,
            TrackingState::Paused => 1,
            TrackingState::Tracking => 2,
        }
    }
}

impl TryFrom<u8> for TrackingState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TrackingState::Stopped),
            1 => Ok(TrackingState::Paused),
            2 => Ok(TrackingState::Tracking),
            other => Err(format!("Invalid tracking state: {other}")),
        }
    }
}

/// Red LED on the microcontroller's panel
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Fault {
    #[default]
    Ok,
    Reserved,
    NoFix,
}

impl From<Fault> for u8 {
    fn from(value: Fault) -> Self {
        match value {
            Fault::Ok => 0,
            Fault::Reserved => 1,
            Fault::NoFix => 2,
        }
    }
}

impl TryFrom<u8> for Fault {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Fault::Ok),
            1 => Ok(Fault::Reserved),
            2 => Ok(Fault::NoFix),
            other => Err(format!("Invalid fault indicator: {other}")),
        }
    }
}

/// `[trackingIndicator, faultIndicator]`
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leds(pub TrackingState, pub Fault);
