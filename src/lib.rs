//! # HABET Telemetry Broker Library
//!
//! Ingest, decode and fan out the `$$HAR` telemetry stream from a HABET
//! high-altitude balloon tracker.
//!
//! This library provides the core pipeline: the serial line source with
//! reconnect/backoff, the frame codec with physical-unit scaling, and the
//! broker that delivers decoded samples to independent sinks over bounded
//! drop-oldest queues. Map rendering, charts and dashboards are thin
//! consumers of the snapshot handles the sinks publish.

pub mod broker;
pub mod config;
pub mod error;
pub mod frame;
pub mod serial;
pub mod sink;
