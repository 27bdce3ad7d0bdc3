//! ## dvrsim-simulator::controller
//! **Buffer controllers**
//!
//! A controller watches one stream buffer and turns its fill level into disk
//! requests, one at a time. The [`RequestPolicy`] decides when a request is due
//! and how large it is; the watch loop is shared by both directions:
//!
//! 1. take the CPU and ask the policy whether to wait
//! 2. if not, build the request, pay its CPU cost and submit it
//! 3. wait for completion, then move the data between buffer and disk

use std::rc::Rc;

use dvrsim_config::StreamGroupConfig;
use dvrsim_core::{Level, Signal, Sim, SimTime};
use tracing::debug;

use crate::request::{IoRequest, RequestIds};
use crate::scheduler::Scheduler;
use crate::system::{Cpu, Platform, ProcessingCost};

/// CPU operations to build a request, before the per-sector part.
const REQUEST_BASE_OPS: f64 = 10.0;

/// Sizing and deadline limits shared by both policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestLimits {
    pub threshold_kb: f64,
    pub timeout_ms: SimTime,
    pub max_request_kb: f64,
    pub sector_kb: f64,
    pub horizon_ms: SimTime,
}

impl From<&StreamGroupConfig> for RequestLimits {
    fn from(config: &StreamGroupConfig) -> Self {
        Self {
            threshold_kb: config.threshold_kb,
            timeout_ms: config.timeout_ms,
            max_request_kb: config.max_request_kb,
            sector_kb: config.sector_kb,
            horizon_ms: config.deadline_horizon_ms,
        }
    }
}

impl RequestLimits {
    /// Largest whole number of sectors in `kb`, capped at the request limit.
    fn whole_sectors(&self, kb: f64) -> f64 {
        let sectors = (kb / self.sector_kb).floor().max(0.0);
        (sectors * self.sector_kb).min(self.max_request_kb)
    }
}

/// Trait for request policies.
pub trait RequestPolicy {
    fn is_write(&self) -> bool;

    /// `true` while no request is needed yet.
    fn should_defer(&self, buffer: &Level, idle_ms: SimTime) -> bool;

    fn request_size(&self, buffer: &Level) -> f64;

    fn deadline(&self, buffer: &Level, now: SimTime) -> SimTime;

    /// Buffer fill at start-up.
    fn initial_fill(&self, capacity_kb: f64) -> f64;
}

/// Drains a recording buffer to disk.
#[derive(Debug, Clone, Copy)]
pub struct WritePolicy {
    limits: RequestLimits,
}

impl WritePolicy {
    pub fn new(limits: RequestLimits) -> Self {
        Self { limits }
    }
}

impl RequestPolicy for WritePolicy {
    fn is_write(&self) -> bool {
        true
    }

    fn should_defer(&self, buffer: &Level, idle_ms: SimTime) -> bool {
        buffer.amount() < self.limits.threshold_kb && idle_ms < self.limits.timeout_ms
    }

    fn request_size(&self, buffer: &Level) -> f64 {
        self.limits.whole_sectors(buffer.amount())
    }

    // The emptier the buffer, the more time before it overflows.
    fn deadline(&self, buffer: &Level, now: SimTime) -> SimTime {
        now + self.limits.horizon_ms * buffer.free_space() / buffer.capacity()
    }

    fn initial_fill(&self, _capacity_kb: f64) -> f64 {
        0.0
    }
}

/// Refills a playback buffer from disk.
#[derive(Debug, Clone, Copy)]
pub struct ReadPolicy {
    limits: RequestLimits,
}

impl ReadPolicy {
    pub fn new(limits: RequestLimits) -> Self {
        Self { limits }
    }
}

impl RequestPolicy for ReadPolicy {
    fn is_write(&self) -> bool {
        false
    }

    fn should_defer(&self, buffer: &Level, idle_ms: SimTime) -> bool {
        buffer.amount() >= self.limits.threshold_kb && idle_ms < self.limits.timeout_ms
    }

    fn request_size(&self, buffer: &Level) -> f64 {
        self.limits.whole_sectors(buffer.free_space())
    }

    // The fuller the buffer, the more time before it underflows.
    fn deadline(&self, buffer: &Level, now: SimTime) -> SimTime {
        now + self.limits.horizon_ms * buffer.amount() / buffer.capacity()
    }

    fn initial_fill(&self, capacity_kb: f64) -> f64 {
        capacity_kb / 2.0
    }
}

/// Watches one buffer and keeps at most one request in flight for it.
#[derive(Clone)]
pub struct BufferController {
    name: Rc<str>,
    sim: Sim,
    cpu: Cpu,
    scheduler: Scheduler,
    request_ids: RequestIds,
    buffer: Level,
    policy: Rc<dyn RequestPolicy>,
    complete: Signal,
    watch_interval: SimTime,
    address_span: u64,
    sector_kb: f64,
}

impl BufferController {
    pub fn new(
        name: impl Into<String>,
        platform: &Platform,
        scheduler: &Scheduler,
        group: &StreamGroupConfig,
        policy: Rc<dyn RequestPolicy>,
    ) -> Self {
        let name: Rc<str> = Rc::from(name.into());
        let sim = &platform.sim;
        let buffer = Level::new(
            sim,
            format!("{name} buffer"),
            group.buffer_kb,
            policy.initial_fill(group.buffer_kb),
        );
        Self {
            complete: Signal::new(sim, format!("{name} request complete")),
            name,
            sim: sim.clone(),
            cpu: platform.cpu.clone(),
            scheduler: scheduler.clone(),
            request_ids: platform.request_ids.clone(),
            buffer,
            policy,
            watch_interval: group.watch_interval_ms,
            address_span: group.address_span,
            sector_kb: group.sector_kb,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &Level {
        &self.buffer
    }

    pub async fn run(self) {
        let rng = self.sim.rng().clone();
        let mut idle: SimTime = 0.0;
        loop {
            self.cpu.resource().acquire().await;
            if self.policy.should_defer(&self.buffer, idle) {
                self.cpu.resource().release();
                self.sim.hold(self.watch_interval).await;
                idle += self.watch_interval;
                continue;
            }
            idle = 0.0;

            let now = self.sim.now();
            let size_kb = self.policy.request_size(&self.buffer);
            let request = IoRequest::new(
                self.request_ids.next_id(),
                size_kb,
                rng.uniform_int(0, self.address_span),
                self.policy.is_write(),
                self.policy.deadline(&self.buffer, now),
                now,
                self.name.clone(),
                self.complete.clone(),
            );
            debug!(
                controller = %self.name,
                id = request.id,
                kind = request.kind(),
                size_kb,
                deadline = request.deadline,
                "request created"
            );
            let ops = REQUEST_BASE_OPS + size_kb / self.sector_kb;
            self.sim.hold(self.cpu.processing_time(ops)).await;
            self.cpu.resource().release();

            self.scheduler.add(request);
            self.complete.wait().await;

            if self.policy.is_write() {
                self.buffer.get(size_kb).await;
            } else {
                self.buffer.put(size_kb).await;
            }
            debug!(controller = %self.name, size_kb, "request completed");
        }
    }
}
