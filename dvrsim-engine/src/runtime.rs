// dvrsim-engine/src/runtime.rs

/*!
# Runtime Engine

Runs simulations for the frontends. A single run is synchronous: the kernel
is single-threaded and `!Send`, so each simulation is built, run and reported
on one thread. Sweeps fan independent runs out over tokio's blocking pool,
one seed and policy per task, and collect their reports.
*/

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument};

use dvrsim_config::{SchedulingPolicy, SimulationConfig};
use dvrsim_core::SimTime;
use dvrsim_simulator::Simulation;
use dvrsim_telemetry::{EventLogger, MetricsRecorder};

use crate::error::EngineError;
use crate::report::SimulationReport;

/// A finished run together with the metrics it recorded.
pub struct RunOutcome {
    pub report: SimulationReport,
    pub metrics: MetricsRecorder,
}

/// Builds, runs and reports one simulation on the calling thread.
///
/// `until` overrides `run.max_sim_time_ms` when given.
pub fn run_simulation(
    config: SimulationConfig,
    until: Option<SimTime>,
) -> Result<RunOutcome, EngineError> {
    let config = config.validated()?;
    let span = EventLogger::run_span(config.run.seed, config.run.policy.as_str());
    let _guard = span.enter();

    let until = until.unwrap_or(config.run.max_sim_time_ms);
    let metrics = MetricsRecorder::new()?;
    let mut simulation = Simulation::prepare(config, metrics.clone());
    let summary = simulation.run_until(until);
    let report = SimulationReport::collect(&simulation, summary)?;
    info!(
        digest = report.digest(),
        completed = report.state.counters.requests_completed,
        incidents = report.state.total_incidents,
        "simulation complete"
    );
    Ok(RunOutcome { report, metrics })
}

/// [`run_simulation`] on the blocking pool, for async frontends.
#[instrument(level = "info", name = "run_simulation_task", skip(config))]
pub async fn run_simulation_task(
    config: SimulationConfig,
    until: Option<SimTime>,
) -> Result<RunOutcome, EngineError> {
    tokio::task::spawn_blocking(move || run_simulation(config, until)).await?
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPlan {
    pub seeds: u64,
    pub start_seed: u64,
    /// Concurrent runs; 0 means one per CPU.
    pub jobs: usize,
}

impl SweepPlan {
    fn concurrency(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get().max(1)
        } else {
            self.jobs
        }
    }
}

/// One row of a sweep: the headline numbers of a single run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub seed: u64,
    pub policy: SchedulingPolicy,
    pub requests_completed: u64,
    pub atr_stalls: u64,
    pub overflows: u64,
    pub underflows: u64,
    pub digest: String,
}

impl From<&SimulationReport> for SweepRow {
    fn from(report: &SimulationReport) -> Self {
        let counters = &report.state.counters;
        Self {
            seed: report.state.seed,
            policy: report.state.policy,
            requests_completed: counters.requests_completed,
            atr_stalls: counters.atr_stalls,
            overflows: counters.overflows,
            underflows: counters.underflows,
            digest: report.digest.clone(),
        }
    }
}

/// Per-policy totals over all seeds of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyTotals {
    pub runs: usize,
    pub requests_completed: u64,
    pub overflows: u64,
    pub underflows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// Ordered by seed, then policy.
    pub rows: Vec<SweepRow>,
}

impl SweepReport {
    pub fn totals(&self, policy: SchedulingPolicy) -> PolicyTotals {
        self.rows
            .iter()
            .filter(|row| row.policy == policy)
            .fold(PolicyTotals::default(), |mut acc, row| {
                acc.runs += 1;
                acc.requests_completed += row.requests_completed;
                acc.overflows += row.overflows;
                acc.underflows += row.underflows;
                acc
            })
    }

    /// Fixed-width comparison table, one line per run plus totals.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:>6} {:<9} {:>10} {:>6} {:>10} {:>10}  digest\n",
            "seed", "policy", "completed", "stalls", "overflows", "underflows"
        );
        for row in &self.rows {
            out.push_str(&format!(
                "{:>6} {:<9} {:>10} {:>6} {:>10} {:>10}  {}\n",
                row.seed,
                row.policy.as_str(),
                row.requests_completed,
                row.atr_stalls,
                row.overflows,
                row.underflows,
                &row.digest[..row.digest.len().min(16)]
            ));
        }
        for policy in SchedulingPolicy::ALL {
            let totals = self.totals(policy);
            out.push_str(&format!(
                "{:>6} {:<9} {:>10} {:>6} {:>10} {:>10}\n",
                "total",
                policy.as_str(),
                totals.requests_completed,
                "",
                totals.overflows,
                totals.underflows
            ));
        }
        out
    }
}

/// Runs every policy for seeds `start_seed..start_seed + seeds`.
///
/// Each run gets its own copy of `config` with the seed and policy replaced.
/// The first failing run aborts the sweep.
#[instrument(level = "info", name = "sweep", skip(config))]
pub async fn sweep(config: SimulationConfig, plan: SweepPlan) -> Result<SweepReport, EngineError> {
    let config = config.validated()?;
    let permits = Arc::new(Semaphore::new(plan.concurrency()));
    let mut tasks = JoinSet::new();

    for seed in plan.start_seed..plan.start_seed.saturating_add(plan.seeds) {
        for policy in SchedulingPolicy::ALL {
            let mut config = config.clone();
            config.run.seed = seed;
            config.run.policy = policy;
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::Join(e.to_string()))?;
                let outcome = run_simulation_task(config, None).await?;
                Ok::<_, EngineError>(SweepRow::from(&outcome.report))
            });
        }
    }

    let mut rows = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        rows.push(joined??);
    }
    rows.sort_by_key(|row| (row.seed, row.policy.as_str()));
    info!(runs = rows.len(), "sweep complete");
    Ok(SweepReport { rows })
}
