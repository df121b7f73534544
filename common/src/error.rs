use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Invalid speed unit code: {0}, expected 0 (mph), 1 (km/h) or 2 (m/s)")]
    InvalidArgument(i64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    #[error("Invalid timezone: {0:?}")]
    InvalidTimezone(String),
    #[error("Could not parse timestamp {input:?}: {source}")]
    Parse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty line")]
    Empty,
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Line of {0} bytes exceeds the frame limit")]
    Oversized(usize),
    #[error("Line is not valid utf-8")]
    NotUtf8,
    #[error("Could not encode frame: {0}")]
    Encode(serde_json::Error),
}
