//! I/O scheduler tuning.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::run::SchedulingPolicy;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Interval between control-loop and device polls (ms).
    #[serde(default = "default_poll_interval")]
    #[validate(range(exclusive_min = 0.0))]
    pub poll_interval_ms: f64,

    /// Intake size that triggers a sort under the address policy.
    #[serde(default = "default_address_min_batch")]
    #[validate(range(min = 1))]
    pub address_min_batch: usize,

    /// Intake size that triggers a sort under the deadline policy.
    #[serde(default = "default_deadline_min_batch")]
    #[validate(range(min = 1))]
    pub deadline_min_batch: usize,

    /// Budget charged per admitted request by the deadline policy (ms).
    #[serde(default = "default_request_estimate")]
    #[validate(range(min = 0.0))]
    pub deadline_request_estimate_ms: f64,
}

fn default_poll_interval() -> f64 {
    100.0
}

fn default_address_min_batch() -> usize {
    5
}

fn default_deadline_min_batch() -> usize {
    1
}

fn default_request_estimate() -> f64 {
    50.0
}

impl SchedulerConfig {
    pub fn min_batch(&self, policy: SchedulingPolicy) -> usize {
        match policy {
            SchedulingPolicy::Address => self.address_min_batch,
            SchedulingPolicy::Deadline => self.deadline_min_batch,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            address_min_batch: default_address_min_batch(),
            deadline_min_batch: default_deadline_min_batch(),
            deadline_request_estimate_ms: default_request_estimate(),
        }
    }
}
