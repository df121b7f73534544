//! Newline delimited JSON spoken with the microcontroller over the UART

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{error::ProtocolError, types::tracking::Leds};

/// Longest line accepted from the microcontroller
pub const MAX_LINE: usize = 1024;

/// What the microcontroller asks for in `REQ`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Request {
    /// `REQ: 0`, reply with the device config
    Config,
    /// `REQ: 1`, reply with telemetry
    Telemetry,
}

impl Request {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Request::Config),
            1 => Some(Request::Telemetry),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct InboundFrame {
    pub button1: bool,
    pub button2: bool,
    pub request: Option<Request>,
}

#[derive(Deserialize)]
struct RawInbound {
    #[serde(rename = "BUTTON1", default)]
    button1: bool,
    #[serde(rename = "BUTTON2", default)]
    button2: bool,
    #[serde(rename = "REQ", default)]
    request: Option<i64>,
}

impl InboundFrame {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let raw: RawInbound = serde_json::from_str(line)?;

        let request = raw.request.and_then(|code| {
            let request = Request::from_code(code);
            if request.is_none() {
                debug!(code, "Ignoring unknown request");
            }
            request
        });

        Ok(Self {
            button1: raw.button1,
            button2: raw.button2,
            request,
        })
    }
}

/// `GPS` field of a telemetry frame
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpsPayload {
    /// `[lat, lon, speed, month, day, hour, minute]`, speed in the display unit
    Fix(f64, f64, i64, u32, u32, u32, u32),
    NoFix([i8; 6]),
}

impl GpsPayload {
    pub const NO_FIX: GpsPayload = GpsPayload::NoFix([-1; 6]);
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(rename = "GPS")]
    pub gps: GpsPayload,
    #[serde(rename = "LED")]
    pub led: Leds,
    #[serde(rename = "B1RCV")]
    pub button1_ack: bool,
    #[serde(rename = "B2RCV")]
    pub button2_ack: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Config(Value),
    Telemetry(Telemetry),
}

impl OutboundFrame {
    /// Serializes as a single newline terminated line
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut line = match self {
            OutboundFrame::Config(config) => serde_json::to_string(config),
            OutboundFrame::Telemetry(telemetry) => serde_json::to_string(telemetry),
        }
        .map_err(ProtocolError::Encode)?;

        line.push('\n');

        Ok(line)
    }
}

/// Splits a byte stream into lines
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    discarding: bool,
}

impl LineFramer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the next complete line without its terminator.
    ///
    /// Empty lines are skipped. A line longer than [`MAX_LINE`] is reported
    /// once and the rest of it dropped.
    pub fn next_line(&mut self) -> Option<Result<String, ProtocolError>> {
        loop {
            let Some(end) = self.buffer.iter().position(|it| *it == b'\n') else {
                if self.buffer.len() > MAX_LINE {
                    let len = self.buffer.len();
                    self.buffer.clear();

                    if !self.discarding {
                        self.discarding = true;
                        return Some(Err(ProtocolError::Oversized(len)));
                    }
                }

                return None;
            };

            let mut line = self.buffer.drain(..=end).collect::<Vec<_>>();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if self.discarding {
                // Tail of an oversized line
                self.discarding = false;
                continue;
            }

            if line.len() > MAX_LINE {
                return Some(Err(ProtocolError::Oversized(line.len())));
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Some(String::from_utf8(line).map_err(|_| ProtocolError::NotUtf8));
        }
    }
}
