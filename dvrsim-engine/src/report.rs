//! End-of-run report and its state digest.
//!
//! The digest is a BLAKE3 hash of the YAML rendering of everything in the
//! report except the digest itself. Two runs with the same configuration and
//! seed must produce the same digest; `--validate-hash` relies on that.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use dvrsim_config::SchedulingPolicy;
use dvrsim_core::{RunSummary, SimTime};
use dvrsim_simulator::{BufferIncident, IncidentKind, Simulation, StreamKind};
use dvrsim_telemetry::MetricsRecorder;

use crate::error::EngineError;

/// Incidents kept verbatim in the report; the rest are only counted.
pub const INCIDENT_SAMPLE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    pub name: String,
    pub kind: StreamKind,
    pub occupancy_kb: f64,
    pub capacity_kb: f64,
    pub overflows: usize,
    pub underflows: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub requests_submitted: u64,
    pub requests_dispatched: u64,
    pub requests_serviced: u64,
    pub requests_completed: u64,
    pub batches_sorted: u64,
    pub flushes: u64,
    pub atr_stalls: u64,
    pub overflows: u64,
    pub underflows: u64,
}

impl From<&MetricsRecorder> for RunCounters {
    fn from(metrics: &MetricsRecorder) -> Self {
        Self {
            requests_submitted: metrics.requests_submitted.get(),
            requests_dispatched: metrics.requests_dispatched.get(),
            requests_serviced: metrics.requests_serviced.get(),
            requests_completed: metrics.requests_completed.get(),
            batches_sorted: metrics.batches_sorted.get(),
            flushes: metrics.flushes.get(),
            atr_stalls: metrics.atr_stalls.get(),
            overflows: metrics.overflows.get(),
            underflows: metrics.underflows.get(),
        }
    }
}

/// Disk and scheduler state at the end of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub head: u64,
    pub atr_threshold: u32,
    pub cache_used_kb: f64,
    pub cache_capacity_kb: f64,
    pub intake_queue: usize,
    pub dispatch_queue: usize,
}

/// Everything the digest covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub seed: u64,
    pub policy: SchedulingPolicy,
    pub final_time_ms: SimTime,
    pub events_processed: u64,
    pub live_processes: usize,
    pub pending_events: usize,
    pub device: DeviceState,
    pub counters: RunCounters,
    pub streams: Vec<StreamReport>,
    pub total_incidents: usize,
    pub incidents: Vec<BufferIncident>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    #[serde(flatten)]
    pub state: RunState,
    pub digest: String,
}

impl SimulationReport {
    /// Reads the final state out of a paused or finished simulation.
    pub fn collect(simulation: &Simulation, summary: RunSummary) -> Result<Self, EngineError> {
        let platform = simulation.platform();
        let diagnostics = &platform.diagnostics;
        let cache = simulation.hdd().cache().level();

        let streams = simulation
            .snapshot()
            .into_iter()
            .map(|s| StreamReport {
                overflows: diagnostics.count(&s.name, IncidentKind::Overflow),
                underflows: diagnostics.count(&s.name, IncidentKind::Underflow),
                name: s.name,
                kind: s.kind,
                occupancy_kb: s.occupancy_kb,
                capacity_kb: s.capacity_kb,
            })
            .collect();

        let state = RunState {
            seed: platform.config.run.seed,
            policy: platform.config.run.policy,
            final_time_ms: summary.now,
            events_processed: summary.events_processed,
            live_processes: summary.live_processes,
            pending_events: summary.pending_events,
            device: DeviceState {
                head: simulation.hdd().head(),
                atr_threshold: simulation.hdd().atr_threshold(),
                cache_used_kb: cache.amount(),
                cache_capacity_kb: cache.capacity(),
                intake_queue: simulation.scheduler().intake_len(),
                dispatch_queue: simulation.scheduler().dispatch_len(),
            },
            counters: RunCounters::from(&platform.metrics),
            streams,
            total_incidents: diagnostics.len(),
            incidents: diagnostics.first(INCIDENT_SAMPLE),
        };
        Self::seal(state)
    }

    /// Attaches the digest of `state`.
    pub fn seal(state: RunState) -> Result<Self, EngineError> {
        let canonical = serde_yaml::to_string(&state)?;
        let digest = hex::encode(blake3::hash(canonical.as_bytes()).as_bytes());
        Ok(Self { state, digest })
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Fails with [`EngineError::HashMismatch`] unless the digest equals `expected`.
    pub fn validate_hash(&self, expected: &str) -> Result<(), EngineError> {
        if self.digest.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(EngineError::HashMismatch {
                expected: expected.to_string(),
                actual: self.digest.clone(),
            })
        }
    }

    pub fn to_yaml(&self) -> Result<String, EngineError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes the YAML report into `dir` for later inspection.
    pub fn write_bug_report(&self, dir: &Path) -> Result<PathBuf, EngineError> {
        let path = dir.join(format!(
            "bug_report_{}_{}.yaml",
            self.state.policy, self.state.seed
        ));
        fs::write(&path, self.to_yaml()?)?;
        Ok(path)
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.state;
        writeln!(
            f,
            "policy {} / seed {}: {:.1} ms simulated, {} events",
            s.policy, s.seed, s.final_time_ms, s.events_processed
        )?;
        let c = &s.counters;
        writeln!(
            f,
            "requests: {} submitted, {} serviced, {} completed in {} batches; {} flushes, {} ATR stalls",
            c.requests_submitted,
            c.requests_serviced,
            c.requests_completed,
            c.batches_sorted,
            c.flushes,
            c.atr_stalls
        )?;
        writeln!(
            f,
            "cache: {:.0}/{:.0} kB, head at {}, {} queued, {} dispatched",
            s.device.cache_used_kb,
            s.device.cache_capacity_kb,
            s.device.head,
            s.device.intake_queue,
            s.device.dispatch_queue
        )?;
        for stream in &s.streams {
            writeln!(
                f,
                "  {:<12} {:>8.1}/{:.0} kB  overflows {:>5}  underflows {:>5}",
                stream.name,
                stream.occupancy_kb,
                stream.capacity_kb,
                stream.overflows,
                stream.underflows
            )?;
        }
        if s.total_incidents > s.incidents.len() {
            writeln!(
                f,
                "incidents: {} (first {} in YAML report)",
                s.total_incidents,
                s.incidents.len()
            )?;
        } else {
            writeln!(f, "incidents: {}", s.total_incidents)?;
        }
        write!(f, "digest: {}", self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvrsim_config::SimulationConfig;

    fn report(policy: SchedulingPolicy, seed: u64, until: SimTime) -> SimulationReport {
        let mut config = SimulationConfig::default();
        config.run.policy = policy;
        config.run.seed = seed;
        let mut simulation = Simulation::prepare(config, MetricsRecorder::new().unwrap());
        let summary = simulation.run_until(until);
        SimulationReport::collect(&simulation, summary).unwrap()
    }

    #[test]
    fn digest_is_reproducible() {
        let a = report(SchedulingPolicy::Address, 3, 10_000.0);
        let b = report(SchedulingPolicy::Address, 3, 10_000.0);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        a.validate_hash(b.digest()).unwrap();
        a.validate_hash(&b.digest().to_uppercase()).unwrap();
    }

    #[test]
    fn digest_depends_on_policy() {
        let a = report(SchedulingPolicy::Address, 3, 10_000.0);
        let d = report(SchedulingPolicy::Deadline, 3, 10_000.0);
        assert_ne!(a.digest(), d.digest());
    }

    #[test]
    fn mismatch_names_both_hashes() {
        let report = report(SchedulingPolicy::Deadline, 1, 1_000.0);
        let err = report.validate_hash("00ff").unwrap_err();
        match err {
            EngineError::HashMismatch { expected, actual } => {
                assert_eq!(expected, "00ff");
                assert_eq!(actual, report.digest());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stream_counts_match_incident_log() {
        let report = report(SchedulingPolicy::Address, 5, 20_000.0);
        let s = &report.state;
        assert_eq!(s.streams.len(), 12);
        let per_stream: usize = s.streams.iter().map(|r| r.overflows + r.underflows).sum();
        assert_eq!(per_stream, s.total_incidents);
        assert_eq!(
            s.counters.overflows + s.counters.underflows,
            s.total_incidents as u64
        );
        assert!(s.incidents.len() <= INCIDENT_SAMPLE);
        assert!(s.device.cache_used_kb <= s.device.cache_capacity_kb);
    }

    #[test]
    fn yaml_carries_digest_and_flattened_state() {
        let report = report(SchedulingPolicy::Deadline, 2, 1_000.0);
        let yaml = report.to_yaml().unwrap();
        assert!(yaml.contains("policy: deadline"));
        assert!(yaml.contains("seed: 2"));
        assert!(yaml.contains(&format!("digest: {}", report.digest())));

        let summary = report.to_string();
        assert!(summary.starts_with("policy deadline / seed 2"));
        assert!(summary.contains("Tuner #0"));
        assert!(summary.ends_with(report.digest()));
    }

    #[test]
    fn bug_report_lands_in_directory() {
        let dir = std::env::temp_dir().join("dvrsim-report-test");
        fs::create_dir_all(&dir).unwrap();
        let report = report(SchedulingPolicy::Address, 11, 500.0);
        let path = report.write_bug_report(&dir).unwrap();
        assert!(path.ends_with("bug_report_address_11.yaml"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains(report.digest()));
        fs::remove_file(path).unwrap();
    }
}
