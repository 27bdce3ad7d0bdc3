//! ## dvrsim-simulator::hdd::cache
//! **Disk cache admission and flushing**
//!
//! A request moves through the cache in three stages:
//! - *open*: admitted, its size reserved in the cache buffer, waiting for the disk
//! - *closed*: ready to hand back to its controller. Writes close on admission;
//!   reads close once the disk has serviced them
//! - *complete*: flushed over the RAM bus and signalled to the controller
//!
//! Cache space of a write is returned when the disk finishes it. Cache space
//! of a read is returned when it is flushed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dvrsim_core::{Level, Signal, Sim, SimTime};
use dvrsim_telemetry::MetricsRecorder;
use tracing::debug;

use crate::request::IoRequest;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::system::RamBus;

/// Closed requests needed before a full cache forces a flush.
pub const FLUSH_BACKLOG: usize = 3;

#[derive(Debug, Default)]
struct Stages {
    open: VecDeque<IoRequest>,
    closed: VecDeque<IoRequest>,
    /// Popped by the disk and not yet finished.
    in_service: usize,
}

/// Shared cache state: the space buffer, the stage queues and the flush
/// handshake signals.
#[derive(Clone, Debug)]
pub struct Cache {
    level: Level,
    stages: Rc<RefCell<Stages>>,
    flush_now: Signal,
    flush_complete: Signal,
}

impl Cache {
    pub fn new(sim: &Sim, capacity_kb: f64) -> Self {
        Self {
            level: Level::new(sim, "HDD cache", capacity_kb, 0.0),
            stages: Rc::new(RefCell::new(Stages::default())),
            flush_now: Signal::new(sim, "flush now"),
            flush_complete: Signal::new(sim, "flush complete"),
        }
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn open_len(&self) -> usize {
        self.stages.borrow().open.len()
    }

    pub fn closed_len(&self) -> usize {
        self.stages.borrow().closed.len()
    }

    pub(crate) fn pop_open(&self) -> Option<IoRequest> {
        let mut stages = self.stages.borrow_mut();
        let request = stages.open.pop_front()?;
        stages.in_service += 1;
        Some(request)
    }

    /// Called by the disk once a popped request has been written or closed.
    pub(crate) fn service_done(&self) {
        let mut stages = self.stages.borrow_mut();
        stages.in_service = stages.in_service.saturating_sub(1);
    }

    pub(crate) fn push_closed(&self, request: IoRequest) {
        self.stages.borrow_mut().closed.push_back(request);
    }

    /// A flush is due once the closed backlog is long enough, or as soon as
    /// closed requests pin space and the disk has nothing left to service.
    fn flush_due(&self) -> bool {
        let stages = self.stages.borrow();
        let closed = stages.closed.len();
        let disk_idle = stages.open.is_empty() && stages.in_service == 0;
        closed >= FLUSH_BACKLOG || (closed > 0 && disk_idle)
    }

    fn pop_closed(&self) -> Option<IoRequest> {
        self.stages.borrow_mut().closed.pop_front()
    }

    /// Reserves space and stages an admitted request.
    async fn admit(&self, request: IoRequest) {
        self.level.put(request.size_kb).await;
        let mut stages = self.stages.borrow_mut();
        if request.write {
            stages.closed.push_back(request.clone());
        }
        stages.open.push_back(request);
    }
}

/// Pulls requests from the scheduler into the cache.
pub(crate) struct CacheFill {
    pub sim: Sim,
    pub cache: Cache,
    pub scheduler: Scheduler,
    pub poll_interval: SimTime,
    pub flush_when_idle: bool,
}

impl CacheFill {
    pub async fn run(self) {
        loop {
            let request = match self.scheduler.next_request() {
                Ok(request) => request,
                Err(SchedulerError::EmptyQueue) => {
                    if self.flush_when_idle && self.cache.closed_len() > 0 {
                        self.cache.flush_now.signal();
                    }
                    self.sim.hold(self.poll_interval).await;
                    continue;
                }
            };

            while request.size_kb > self.cache.level.free_space() {
                if self.cache.flush_due() {
                    self.cache.flush_now.signal();
                    self.cache.flush_complete.wait().await;
                } else {
                    self.sim.hold(self.poll_interval).await;
                }
            }
            debug!(id = request.id, kind = request.kind(), "admitted to cache");
            self.cache.admit(request).await;
        }
    }
}

/// Hands closed requests back to their controllers.
pub(crate) struct CacheFlush {
    pub cache: Cache,
    pub ram_bus: RamBus,
    pub metrics: MetricsRecorder,
}

impl CacheFlush {
    pub async fn run(self) {
        loop {
            self.cache.flush_now.wait().await;
            let mut flushed = 0usize;
            while let Some(request) = self.cache.pop_closed() {
                self.ram_bus.transfer(request.size_kb).await;
                if !request.write {
                    self.cache.level.get(request.size_kb).await;
                }
                request.complete();
                self.metrics.requests_completed.inc();
                flushed += 1;
            }
            self.metrics.flushes.inc();
            debug!(flushed, "cache flushed");
            self.cache.flush_complete.signal();
        }
    }
}
