//! Conversion of GPS time (always UTC) to the rider's wall clock

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::TimeError;

pub fn parse_zone(name: &str) -> Result<Tz, TimeError> {
    name.parse::<Tz>()
        .map_err(|_| TimeError::InvalidTimezone(name.to_owned()))
}

pub fn localize(instant: DateTime<Utc>, zone: &str) -> Result<DateTime<Tz>, TimeError> {
    let zone = parse_zone(zone)?;

    Ok(localize_in(instant, zone))
}

/// Like [`localize`] with a zone that is already parsed
pub fn localize_in(instant: DateTime<Utc>, zone: Tz) -> DateTime<Tz> {
    instant.with_timezone(&zone)
}

/// Parses a timestamp that is assumed to be UTC.
///
/// Without a format the input must be RFC 3339, which is what gpsd sends.
/// With a format the input is read as a naive time and tagged as UTC.
pub fn parse_utc(text: &str, format: Option<&str>) -> Result<DateTime<Utc>, TimeError> {
    let parse_error = |source| TimeError::Parse {
        input: text.to_owned(),
        source,
    };

    match format {
        Some(format) => {
            let naive = NaiveDateTime::parse_from_str(text, format).map_err(parse_error)?;

            Ok(Utc.from_utc_datetime(&naive))
        }
        None => {
            let time = DateTime::parse_from_rfc3339(text).map_err(parse_error)?;

            Ok(time.with_timezone(&Utc))
        }
    }
}

pub fn localize_str(
    text: &str,
    format: Option<&str>,
    zone: &str,
) -> Result<DateTime<Tz>, TimeError> {
    // Check the zone first so a misconfiguration is reported even on bad input
    let zone = parse_zone(zone)?;
    let instant = parse_utc(text, format)?;

    Ok(localize_in(instant, zone))
}
