//! ## dvrsim-telemetry::logging
//! **Env-filtered `tracing` output**
//!
//! ### Expectations:
//! - `RUST_LOG` selects verbosity, `info` by default
//! - Every run is wrapped in a span carrying its seed and policy, so that
//!   interleaved output of a parallel sweep stays attributable
//!
//! ### Future:
//! - JSON output for machine consumption of incident logs

use tracing::{info_span, Span};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Later calls are no-ops.
    pub fn init() {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Span that scopes all log output of one simulation run.
    #[inline]
    pub fn run_span(seed: u64, policy: &str) -> Span {
        info_span!("simulation_run", seed, policy)
    }
}
