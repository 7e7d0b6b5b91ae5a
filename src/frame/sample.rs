//! Decoded telemetry sample types.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Capture time of a raw line, taken when the line arrives off the wire.
///
/// The frame itself carries no timestamp, so the arrival time stands in for
/// it. The wall clock is what goes out on external interfaces; the monotonic
/// clock is for interval math that must not jump with NTP corrections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureTime {
    pub wall: DateTime<Utc>,
    pub mono: Instant,
}

impl CaptureTime {
    pub fn now() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    /// Wall-clock capture time as milliseconds since the Unix epoch
    pub fn epoch_millis(&self) -> i64 {
        self.wall.timestamp_millis()
    }
}

/// One fully decoded and scaled telemetry frame.
///
/// A sample only exists if every field of the frame parsed as a finite
/// number; the codec never emits partial samples. All values are already
/// scaled to physical units (see the scale table in [`super::codec`]).
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    /// Arrival time of the raw line this sample was decoded from
    pub captured: CaptureTime,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,

    /// Heading in degrees
    pub heading: f64,

    /// Ground speed, scaled by 1/10 (unit not documented by the tracker)
    pub speed: f64,

    /// Dilution of precision, scaled by 1/10 (opaque scaled scalar)
    pub pdop: f64,

    /// Barometric pressure in hectopascals
    pub pressure: f64,

    /// Temperature in degrees Celsius
    pub temperature: f64,

    /// Relative humidity in percent
    pub humidity: f64,

    /// Reserved field at position 10, carried through verbatim.
    /// No consumer interprets it; the tracker firmware never documented it.
    pub reserved: String,

    /// Battery voltage in volts (transmitted unscaled)
    pub battery: f64,
}
