// dvrsim-simulator/src/lib.rs

/*!
# DVR Storage Simulator

Models the storage path of a digital video recorder: tuners record into RAM
buffers, playback outputs drain them, and buffer controllers move the data to
and from a single hard disk through an I/O scheduler and the disk's cache. All
components run as processes on the `dvrsim-core` kernel, so one seed and one
configuration always reproduce the same run.

## Key Components:
- **Platform:** CPU and RAM bus resources, shared configuration and metrics.
- **Scheduler:** FIFO intake with address-ordered or deadline-aware batching.
- **HDD:** cache admission, disk service with ATR stalls, and flushing.
- **Controllers:** write/read request policies over a common watch loop.
- **Streams:** exponentially sized packets at a fixed bit rate.
*/

use dvrsim_config::SimulationConfig;
use dvrsim_core::{RunSummary, SimTime};
use dvrsim_telemetry::MetricsRecorder;
use tracing::info;

pub mod controller;
pub mod diagnostics;
pub mod hdd;
pub mod request;
pub mod scheduler;
pub mod stream;
pub mod system;

pub use controller::{BufferController, ReadPolicy, RequestLimits, RequestPolicy, WritePolicy};
pub use diagnostics::{BufferIncident, DiagnosticLog, IncidentKind};
pub use hdd::Hdd;
pub use request::IoRequest;
pub use scheduler::{Scheduler, SchedulerError, SchedulerStatus};
pub use stream::{Stream, StreamKind};
pub use system::{Cpu, Platform, ProcessingCost, RamBus};

/// Occupancy of one stream buffer at the end of a run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StreamSnapshot {
    pub name: String,
    pub kind: StreamKind,
    pub occupancy_kb: f64,
    pub capacity_kb: f64,
}

/// The fixed topology of one run: scheduler, HDD, tuners and outputs.
pub struct Simulation {
    platform: Platform,
    scheduler: Scheduler,
    hdd: Hdd,
    streams: Vec<Stream>,
    activated: bool,
}

impl Simulation {
    /// Builds every component; nothing runs until [`Simulation::activate`].
    pub fn prepare(config: SimulationConfig, metrics: MetricsRecorder) -> Self {
        let platform = Platform::new(config, metrics);
        let scheduler = Scheduler::new(&platform);
        let hdd = Hdd::new(&platform, &scheduler);

        let config = platform.config.clone();
        let tuners = (0..config.tuners.count)
            .map(|i| Stream::input(format!("Tuner #{i}"), &platform, &scheduler, &config.tuners));
        let outputs = (0..config.outputs.count).map(|i| {
            Stream::output(format!("Output #{i}"), &platform, &scheduler, &config.outputs)
        });
        let streams = tuners.chain(outputs).collect();

        Self {
            platform,
            scheduler,
            hdd,
            streams,
            activated: false,
        }
    }

    /// Spawns all processes at the current virtual time. Idempotent.
    pub fn activate(&mut self) {
        if self.activated {
            return;
        }
        self.activated = true;
        self.scheduler.activate();
        self.hdd.activate();
        for stream in &self.streams {
            stream.activate();
        }
        info!(
            policy = self.scheduler.policy_name(),
            seed = self.platform.config.run.seed,
            streams = self.streams.len(),
            "simulation activated"
        );
    }

    pub fn run_until(&mut self, until: SimTime) -> RunSummary {
        self.activate();
        let summary = self.platform.sim.run_until(until);
        info!(
            now = summary.now,
            events = summary.events_processed,
            "simulation paused"
        );
        summary
    }

    /// Runs to the configured horizon.
    pub fn run(&mut self) -> RunSummary {
        let until = self.platform.config.run.max_sim_time_ms;
        self.run_until(until)
    }

    pub fn now(&self) -> SimTime {
        self.platform.sim.now()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn hdd(&self) -> &Hdd {
        &self.hdd
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn snapshot(&self) -> Vec<StreamSnapshot> {
        self.streams
            .iter()
            .map(|stream| {
                let buffer = stream.controller().buffer();
                StreamSnapshot {
                    name: stream.name().to_string(),
                    kind: stream.kind(),
                    occupancy_kb: buffer.amount(),
                    capacity_kb: buffer.capacity(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvrsim_config::SchedulingPolicy;

    fn short_run(policy: SchedulingPolicy, seed: u64) -> (Simulation, RunSummary) {
        let mut config = SimulationConfig::default();
        config.run.policy = policy;
        config.run.seed = seed;
        let mut simulation = Simulation::prepare(config, MetricsRecorder::new().unwrap());
        let summary = simulation.run_until(20_000.0);
        (simulation, summary)
    }

    #[test]
    fn topology_matches_configuration() {
        let simulation = Simulation::prepare(
            SimulationConfig::default(),
            MetricsRecorder::new().unwrap(),
        );
        let snapshot = simulation.snapshot();
        assert_eq!(snapshot.len(), 12);
        assert_eq!(snapshot[0].name, "Tuner #0");
        assert_eq!(snapshot[10].name, "Output #0");
        assert_eq!(snapshot[11].kind, StreamKind::Output);
        assert!(snapshot.iter().all(|s| s.capacity_kb == 8_000.0));
    }

    #[test]
    fn runs_move_data_through_the_disk() {
        for policy in SchedulingPolicy::ALL {
            let (simulation, summary) = short_run(policy, 42);
            let metrics = &simulation.platform().metrics;
            assert_eq!(summary.now, 20_000.0);
            assert!(metrics.requests_completed.get() > 0, "{policy}");
            assert!(metrics.requests_serviced.get() > 0, "{policy}");
            assert!(metrics.batches_sorted.get() > 0, "{policy}");
            for stream in simulation.snapshot() {
                assert!(stream.occupancy_kb >= 0.0 && stream.occupancy_kb <= stream.capacity_kb);
            }
        }
    }

    #[test]
    fn default_pipeline_keeps_moving_data() {
        let mut simulation = Simulation::prepare(
            SimulationConfig::default(),
            MetricsRecorder::new().unwrap(),
        );
        let metrics = simulation.platform().metrics.clone();

        simulation.run_until(50_000.0);
        let completed = metrics.requests_completed.get();
        simulation.run_until(100_000.0);

        assert!(
            metrics.requests_completed.get() > completed + 100,
            "completions stalled at {completed}"
        );
        for stream in simulation.snapshot() {
            if stream.kind == StreamKind::Input {
                assert!(
                    stream.occupancy_kb < 0.9 * stream.capacity_kb,
                    "{} pinned at {} kB",
                    stream.name,
                    stream.occupancy_kb
                );
            }
        }
    }

    #[test]
    fn same_seed_same_run() {
        let (a, sa) = short_run(SchedulingPolicy::Deadline, 7);
        let (b, sb) = short_run(SchedulingPolicy::Deadline, 7);
        assert_eq!(sa, sb);
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(
            a.platform().diagnostics.snapshot(),
            b.platform().diagnostics.snapshot()
        );
    }

    #[test]
    fn activate_is_idempotent() {
        let mut simulation = Simulation::prepare(
            SimulationConfig::default(),
            MetricsRecorder::new().unwrap(),
        );
        simulation.activate();
        simulation.activate();
        // Scheduler, three HDD processes, and a stream plus controller each.
        let summary = simulation.run_until(0.0);
        assert_eq!(summary.live_processes, 4 + 2 * 12);
    }
}
