//! Timing model of the platform: disk mechanics, cache, CPU, RAM bus and
//! the adaptive track-recalibration (ATR) stall.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Mechanical disk timing.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct DiskConfig {
    /// Seek cost per unit of address distance (ms).
    #[validate(range(min = 0.0))]
    pub track_move_ms: f64,

    /// Upper bound of the uniform rotational delay (ms).
    #[validate(range(min = 0.0))]
    pub max_rotate_ms: f64,

    /// Sustained media transfer rate (kB per ms).
    #[validate(range(exclusive_min = 0.0))]
    pub transfer_kb_per_ms: f64,

    /// Seek time cap for a full-stroke move (ms).
    #[validate(range(min = 0.0))]
    pub full_stroke_ms: f64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            track_move_ms: 1.63,
            max_rotate_ms: 10.0,
            transfer_kb_per_ms: 110.0,
            full_stroke_ms: 28.55,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CacheConfig {
    /// On-disk cache capacity (kB).
    #[validate(range(exclusive_min = 0.0))]
    pub capacity_kb: f64,

    /// Flush closed requests whenever the scheduler has nothing to hand out.
    /// Without it, controllers waiting on completions are only released by
    /// later admissions.
    #[serde(default = "default_flush_when_idle")]
    pub flush_when_idle: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_kb: 16_000.0,
            flush_when_idle: default_flush_when_idle(),
        }
    }
}

fn default_flush_when_idle() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CpuConfig {
    #[validate(range(min = 0.0))]
    pub ms_per_op: f64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self { ms_per_op: 0.01 }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct RamBusConfig {
    #[validate(range(min = 0.0))]
    pub ms_per_kb: f64,

    /// Fixed cost of every transfer (ms).
    #[validate(range(min = 0.0))]
    pub overhead_ms: f64,
}

impl Default for RamBusConfig {
    fn default() -> Self {
        Self {
            ms_per_kb: 0.00026,
            overhead_ms: 0.00007,
        }
    }
}

/// ATR stall model.
#[derive(Debug, Default, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct MaintenanceConfig {
    /// Percentage threshold the stall counter resets to.
    #[validate(range(max = 100))]
    pub base_chance: u32,
}
