//! # DVR Simulator Telemetry
//!
//! Logging setup and Prometheus counters for simulation runs.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
