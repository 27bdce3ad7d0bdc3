//! Stream groups: the tuners that record and the outputs that play back.
//!
//! Both groups share one shape. Each stream owns a RAM buffer watched by a
//! controller that turns buffer fill into disk requests.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[validate(schema(function = validation::validate_stream_group))]
pub struct StreamGroupConfig {
    /// Number of streams in the group.
    pub count: usize,

    /// Stream bit rate (Mb/s).
    #[validate(range(exclusive_min = 0.0))]
    pub bitrate_mbps: f64,

    /// Mean packet size (Mb). Defaults to a tenth of the bit rate.
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub mean_packet_mb: Option<f64>,

    /// RAM buffer capacity per stream (kB).
    #[validate(range(exclusive_min = 0.0))]
    pub buffer_kb: f64,

    /// Fill level at which the controller issues a request (kB).
    #[validate(range(min = 0.0))]
    pub threshold_kb: f64,

    /// Controller polling period (ms).
    #[validate(range(exclusive_min = 0.0))]
    pub watch_interval_ms: f64,

    /// Idle time after which a request is issued regardless of fill (ms).
    #[validate(range(min = 0.0))]
    pub timeout_ms: f64,

    /// Largest request a controller issues (kB).
    #[validate(range(min = 0.0))]
    pub max_request_kb: f64,

    /// Deadline horizon at an empty (writes) or full (reads) buffer (ms).
    pub deadline_horizon_ms: f64,

    /// Request sizes are whole multiples of this (kB).
    #[validate(range(exclusive_min = 0.0))]
    pub sector_kb: f64,

    /// Requests target addresses drawn from `0..=address_span`.
    pub address_span: u64,

    /// Delay between a stream starting and its controller starting (ms).
    #[validate(range(min = 0.0))]
    pub controller_start_delay_ms: f64,

    /// Immediate underflow retries before an output stream idles for one packet.
    pub max_underflow_retries: u32,
}

impl StreamGroupConfig {
    /// Recording side defaults.
    pub fn tuners() -> Self {
        Self {
            count: 10,
            bitrate_mbps: 20.0,
            mean_packet_mb: None,
            buffer_kb: 8_000.0,
            threshold_kb: 2_048.0,
            watch_interval_ms: 100.0,
            timeout_ms: 1_000.0,
            max_request_kb: 2_048.0,
            deadline_horizon_ms: 1_000.0,
            sector_kb: 128.0,
            address_span: 100,
            controller_start_delay_ms: 100.0,
            max_underflow_retries: 100,
        }
    }

    /// Playback side defaults.
    pub fn outputs() -> Self {
        Self {
            count: 2,
            threshold_kb: 6_144.0,
            ..Self::tuners()
        }
    }

    pub fn mean_packet_mb(&self) -> f64 {
        self.mean_packet_mb.unwrap_or(self.bitrate_mbps / 10.0)
    }
}
