//! # HAR Frame Codec
//!
//! Decodes one line of raw serial text into a [`TelemetrySample`].
//!
//! Frame layout (ASCII, comma separated, newline terminated):
//!
//! ```text
//! $$HAR,<lat_e7>,<lon_e7>,<alt_mm>,<heading_e5>,<speed_e1>,<pdop_e1>,
//!       <pressure_e2>,<temp_e2>,<humidity_e3>,<reserved>,<battery>
//! ```
//!
//! The layout is fixed-position, not self-describing. Scale factors:
//!
//! | position | field       | scale      |
//! |----------|-------------|------------|
//! | 1, 2     | lat, lon    | ÷ 10,000,000 |
//! | 3        | altitude    | ÷ 1,000    |
//! | 4        | heading     | ÷ 100,000  |
//! | 5, 6     | speed, pdop | ÷ 10       |
//! | 7, 8     | pressure, temperature | ÷ 100 |
//! | 9        | humidity    | ÷ 1,000    |
//! | 10       | reserved    | passthrough, never parsed |
//! | 11       | battery     | unscaled   |

use thiserror::Error;

use super::sample::{CaptureTime, TelemetrySample};

/// Literal prefix identifying a telemetry frame
pub const FRAME_PREFIX: &str = "$$HAR";

/// Number of comma-separated fields in a frame, prefix included
pub const FRAME_FIELD_COUNT: usize = 12;

/// Decode failures, one per validation stage
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line does not carry the `$$HAR` prefix. Not an error condition
    /// for the pipeline: the tracker interleaves debug output with frames.
    #[error("line is not a telemetry frame")]
    NotATelemetryFrame,

    /// Prefixed line with the wrong number of positional fields
    #[error("expected {FRAME_FIELD_COUNT} fields, found {found}")]
    FieldCountMismatch { found: usize },

    /// A numeric field failed to parse as a finite base-10 number.
    /// Decoding stops at the first failing field.
    #[error("field {index} is not a finite number")]
    FieldParseFailure { index: usize },
}

/// Decode one raw line into a scaled telemetry sample.
///
/// Pure and deterministic: no I/O, no shared state. Identical input always
/// yields an identical sample (modulo `captured`) or an identical error.
///
/// # Errors
///
/// * [`DecodeError::NotATelemetryFrame`] if the prefix is missing
/// * [`DecodeError::FieldCountMismatch`] if the field count is not 12
/// * [`DecodeError::FieldParseFailure`] on the first non-numeric field
pub fn decode(line: &str, captured: CaptureTime) -> Result<TelemetrySample, DecodeError> {
    if !line.starts_with(FRAME_PREFIX) {
        return Err(DecodeError::NotATelemetryFrame);
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != FRAME_FIELD_COUNT {
        return Err(DecodeError::FieldCountMismatch {
            found: fields.len(),
        });
    }

    // Fields are validated in positional order so the reported index is
    // always the first failure.
    let latitude = numeric(&fields, 1)? / 10_000_000.0;
    let longitude = numeric(&fields, 2)? / 10_000_000.0;
    let altitude = numeric(&fields, 3)? / 1_000.0;
    let heading = numeric(&fields, 4)? / 100_000.0;
    let speed = numeric(&fields, 5)? / 10.0;
    let pdop = numeric(&fields, 6)? / 10.0;
    let pressure = numeric(&fields, 7)? / 100.0;
    let temperature = numeric(&fields, 8)? / 100.0;
    let humidity = numeric(&fields, 9)? / 1_000.0;
    let reserved = fields[10].to_string();
    let battery = numeric(&fields, 11)?;

    Ok(TelemetrySample {
        captured,
        latitude,
        longitude,
        altitude,
        heading,
        speed,
        pdop,
        pressure,
        temperature,
        humidity,
        reserved,
        battery,
    })
}

/// Parse one positional field as a finite number.
///
/// Signed and fractional values are accepted (the tracker sends battery
/// volts as a decimal fraction); NaN and infinities are rejected.
fn numeric(fields: &[&str], index: usize) -> Result<f64, DecodeError> {
    fields[index]
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(DecodeError::FieldParseFailure { index })
}
