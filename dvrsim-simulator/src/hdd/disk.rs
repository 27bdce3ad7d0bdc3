//! Mechanical disk: seek, rotation and transfer timing, and the service
//! process that works through the cache's open requests.

use std::cell::RefCell;
use std::rc::Rc;

use dvrsim_config::DiskConfig;
use dvrsim_core::{Sim, SimTime};
use dvrsim_telemetry::MetricsRecorder;
use tracing::{debug, info};

use super::cache::Cache;
use super::maintenance::MaintenanceModel;

/// Head position and timing constants.
#[derive(Debug, Clone)]
pub struct DiskModel {
    config: DiskConfig,
    head: u64,
}

impl DiskModel {
    pub fn new(config: DiskConfig) -> Self {
        Self { config, head: 0 }
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    /// Seek time from the current head position, capped at a full stroke.
    pub fn seek_time(&self, address: u64) -> SimTime {
        let distance = self.head.abs_diff(address) as f64;
        (distance * self.config.track_move_ms).min(self.config.full_stroke_ms)
    }

    /// Service time for one request given the rotational delay drawn for it.
    /// Moves the head to `address`.
    pub fn service_time(&mut self, address: u64, size_kb: f64, rotation_ms: SimTime) -> SimTime {
        let seek = self.seek_time(address);
        self.head = address;
        rotation_ms + size_kb / self.config.transfer_kb_per_ms + seek
    }

    pub fn max_rotate_ms(&self) -> f64 {
        self.config.max_rotate_ms
    }
}

/// State owned by the disk service process.
pub(crate) struct DiskProcess {
    pub sim: Sim,
    pub cache: Cache,
    pub model: Rc<RefCell<DiskModel>>,
    pub maintenance: Rc<RefCell<MaintenanceModel>>,
    pub poll_interval: SimTime,
    pub metrics: MetricsRecorder,
}

impl DiskProcess {
    pub async fn run(self) {
        let rng = self.sim.rng().clone();
        loop {
            let Some(request) = self.cache.pop_open() else {
                self.sim.hold(self.poll_interval).await;
                continue;
            };

            let service = {
                let mut model = self.model.borrow_mut();
                let rotation = rng.uniform(0.0, model.max_rotate_ms());
                model.service_time(request.address, request.size_kb, rotation)
            };
            self.metrics.observe_service_time(service);
            self.sim.hold(service).await;
            self.metrics.requests_serviced.inc();
            debug!(id = request.id, kind = request.kind(), service_ms = service, "request serviced");

            if request.write {
                self.cache.level().get(request.size_kb).await;
            } else {
                self.cache.push_closed(request);
            }
            self.cache.service_done();

            let roll = rng.uniform_int(0, 99);
            let stall = self.maintenance.borrow_mut().after_request(roll);
            if let Some(stall) = stall {
                info!(stall_ms = stall, now = self.sim.now(), "ATR stall");
                self.metrics.atr_stalls.inc();
                self.sim.hold(stall).await;
            }
        }
    }
}
