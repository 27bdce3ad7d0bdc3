//! Run-level parameters: seed, horizon and the dispatch policy under test.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Dispatch policy used by the I/O scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingPolicy {
    /// Whole intake sorted by ascending address.
    #[default]
    Address,
    /// Earliest-deadline admission under a time budget, then address order.
    Deadline,
}

impl SchedulingPolicy {
    pub const ALL: [SchedulingPolicy; 2] = [SchedulingPolicy::Address, SchedulingPolicy::Deadline];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingPolicy::Address => "address",
            SchedulingPolicy::Deadline => "deadline",
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "address" => Ok(SchedulingPolicy::Address),
            "deadline" => Ok(SchedulingPolicy::Deadline),
            other => Err(format!(
                "unknown scheduling policy '{other}' (expected 'address' or 'deadline')"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct RunConfig {
    /// Seed for the shared random source.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Virtual time at which the run stops (ms).
    #[serde(default = "default_max_sim_time")]
    #[validate(range(min = 1.0))]
    pub max_sim_time_ms: f64,

    #[serde(default)]
    pub policy: SchedulingPolicy,
}

fn default_seed() -> u64 {
    42
}

fn default_max_sim_time() -> f64 {
    500_000.0
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_sim_time_ms: default_max_sim_time(),
            policy: SchedulingPolicy::default(),
        }
    }
}
