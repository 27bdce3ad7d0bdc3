//! Cross-field validation shared by the configuration sections.

use validator::ValidationError;

use crate::streams::StreamGroupConfig;
use crate::SimulationConfig;

/// A watch threshold above the buffer capacity can never be reached.
pub fn validate_stream_group(group: &StreamGroupConfig) -> Result<(), ValidationError> {
    if group.threshold_kb > group.buffer_kb {
        return Err(ValidationError::new("threshold_exceeds_buffer"));
    }
    if group.max_request_kb < group.sector_kb {
        return Err(ValidationError::new("max_request_below_sector"));
    }
    Ok(())
}

/// Requests that must close before a full cache is flushed.
const FLUSH_BACKLOG: f64 = 3.0;

/// The cache must hold a flush backlog of the largest requests, or admission
/// can wait forever on reads that are never flushed.
pub fn validate_cache_fits_requests(config: &SimulationConfig) -> Result<(), ValidationError> {
    let largest = config
        .tuners
        .max_request_kb
        .max(config.outputs.max_request_kb);
    if largest * FLUSH_BACKLOG > config.cache.capacity_kb {
        return Err(ValidationError::new("request_exceeds_cache"));
    }
    Ok(())
}
