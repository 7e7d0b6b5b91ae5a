//! # Frame Module
//!
//! Decoding of the `$$HAR` ASCII telemetry frame emitted by the balloon
//! tracker.
//!
//! This module handles:
//! - The fixed positional field layout and per-field unit scaling
//! - Validation (prefix, field count, numeric parsing)
//! - The immutable [`TelemetrySample`] value delivered to sinks

pub mod codec;
pub mod sample;

pub use codec::{decode, DecodeError, FRAME_FIELD_COUNT, FRAME_PREFIX};
pub use sample::{CaptureTime, TelemetrySample};
