//! # Platform resources
//!
//! The CPU and the RAM data bus are exclusive resources with a linear cost
//! model. Holding the resource is the caller's job: acquire, `hold` for the
//! cost of the work, release.
//!
//! `Platform` bundles what every component of one run shares.

use std::rc::Rc;

use dvrsim_config::{CpuConfig, RamBusConfig, SimulationConfig};
use dvrsim_core::{Resource, Sim, SimTime};
use dvrsim_telemetry::MetricsRecorder;

use crate::diagnostics::DiagnosticLog;
use crate::request::RequestIds;

/// Converts a workload into the time a resource is busy with it.
pub trait ProcessingCost {
    fn processing_time(&self, workload: f64) -> SimTime;
}

/// The host CPU. Workload is counted in operations.
#[derive(Clone, Debug)]
pub struct Cpu {
    resource: Resource,
    ms_per_op: f64,
}

impl Cpu {
    pub fn new(sim: &Sim, config: &CpuConfig) -> Self {
        Self {
            resource: Resource::new(sim, "CPU"),
            ms_per_op: config.ms_per_op,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl ProcessingCost for Cpu {
    fn processing_time(&self, ops: f64) -> SimTime {
        self.ms_per_op * ops
    }
}

/// The shared RAM data bus. Workload is counted in kB.
#[derive(Clone, Debug)]
pub struct RamBus {
    resource: Resource,
    ms_per_kb: f64,
    overhead_ms: f64,
}

impl RamBus {
    pub fn new(sim: &Sim, config: &RamBusConfig) -> Self {
        Self {
            resource: Resource::new(sim, "RAM bus"),
            ms_per_kb: config.ms_per_kb,
            overhead_ms: config.overhead_ms,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Moves `size_kb` over the bus, waiting for it if busy.
    pub async fn transfer(&self, size_kb: f64) {
        self.resource.occupy(self.processing_time(size_kb)).await;
    }
}

impl ProcessingCost for RamBus {
    fn processing_time(&self, size_kb: f64) -> SimTime {
        self.overhead_ms + size_kb * self.ms_per_kb
    }
}

/// Shared handles of one simulation run.
#[derive(Clone)]
pub struct Platform {
    pub sim: Sim,
    pub config: Rc<SimulationConfig>,
    pub cpu: Cpu,
    pub ram_bus: RamBus,
    pub metrics: MetricsRecorder,
    pub diagnostics: DiagnosticLog,
    pub request_ids: RequestIds,
}

impl Platform {
    pub fn new(config: SimulationConfig, metrics: MetricsRecorder) -> Self {
        let sim = Sim::new(config.run.seed);
        Self {
            cpu: Cpu::new(&sim, &config.cpu),
            ram_bus: RamBus::new(&sim, &config.ram_bus),
            config: Rc::new(config),
            metrics,
            diagnostics: DiagnosticLog::new(),
            request_ids: RequestIds::default(),
            sim,
        }
    }
}
