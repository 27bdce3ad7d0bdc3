//! ## dvrsim-simulator::scheduler
//! **I/O request scheduler**
//!
//! Controllers drop requests into a FIFO intake queue. A background control
//! process periodically cuts a batch from the intake with the configured
//! [`DispatchPolicy`], paying CPU time for the sort, and publishes it as the
//! dispatch queue that the cache drains one request at a time.
//!
//! ### Key Submodules:
//! - `policy`: address-ordered and deadline-aware batch planning

pub mod policy;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use dvrsim_core::{Sim, SimTime};
use dvrsim_telemetry::MetricsRecorder;

use crate::request::IoRequest;
use crate::system::{Cpu, Platform, ProcessingCost};

pub use policy::{policy_for, AddressPolicy, BatchPlan, DeadlinePolicy, DispatchPolicy};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// Nothing is ready for dispatch; poll again later.
    #[error("dispatch queue is empty")]
    EmptyQueue,
}

/// `Idle` while the dispatch queue holds requests, `Sorting` once it runs dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Idle,
    Sorting,
}

#[derive(Debug, Default)]
struct Queues {
    intake: VecDeque<IoRequest>,
    dispatch: VecDeque<IoRequest>,
}

#[derive(Clone)]
pub struct Scheduler {
    sim: Sim,
    cpu: Cpu,
    policy: Rc<dyn DispatchPolicy>,
    poll_interval: SimTime,
    metrics: MetricsRecorder,
    queues: Rc<RefCell<Queues>>,
}

impl Scheduler {
    pub fn new(platform: &Platform) -> Self {
        let config = &platform.config;
        Self::with_policy(
            platform,
            Rc::from(policy_for(config.run.policy, &config.scheduler)),
        )
    }

    pub fn with_policy(platform: &Platform, policy: Rc<dyn DispatchPolicy>) -> Self {
        Self {
            sim: platform.sim.clone(),
            cpu: platform.cpu.clone(),
            policy,
            poll_interval: platform.config.scheduler.poll_interval_ms,
            metrics: platform.metrics.clone(),
            queues: Rc::new(RefCell::new(Queues::default())),
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Appends to the intake queue. Never blocks.
    pub fn add(&self, request: IoRequest) {
        debug!(id = request.id, kind = request.kind(), origin = %request.origin, "request submitted");
        self.metrics.requests_submitted.inc();
        self.queues.borrow_mut().intake.push_back(request);
    }

    /// Pops the head of the dispatch queue.
    pub fn next_request(&self) -> Result<IoRequest, SchedulerError> {
        self.queues
            .borrow_mut()
            .dispatch
            .pop_front()
            .ok_or(SchedulerError::EmptyQueue)
    }

    pub fn status(&self) -> SchedulerStatus {
        if self.queues.borrow().dispatch.is_empty() {
            SchedulerStatus::Sorting
        } else {
            SchedulerStatus::Idle
        }
    }

    pub fn intake_len(&self) -> usize {
        self.queues.borrow().intake.len()
    }

    pub fn dispatch_len(&self) -> usize {
        self.queues.borrow().dispatch.len()
    }

    #[cfg(test)]
    pub(crate) fn drain_intake(&self) -> Vec<IoRequest> {
        self.queues.borrow_mut().intake.drain(..).collect()
    }

    /// Spawns the control process.
    pub fn activate(&self) {
        let scheduler = self.clone();
        self.sim.spawn("Scheduler", async move { scheduler.control_loop().await });
    }

    async fn control_loop(self) {
        loop {
            let ready = {
                let queues = self.queues.borrow();
                queues.dispatch.is_empty() && queues.intake.len() >= self.policy.min_batch()
            };
            if !ready {
                self.sim.hold(self.poll_interval).await;
                continue;
            }

            self.cpu.resource().acquire().await;
            let plan = {
                let mut queues = self.queues.borrow_mut();
                self.policy.plan(&mut queues.intake, self.sim.now())
            };
            self.sim
                .hold(self.cpu.processing_time(plan.operations))
                .await;

            let dispatched = plan.batch.len();
            self.queues.borrow_mut().dispatch.extend(plan.batch);
            self.metrics.batches_sorted.inc();
            self.metrics.requests_dispatched.inc_by(dispatched as u64);
            debug!(
                policy = self.policy.name(),
                dispatched,
                remaining = self.intake_len(),
                "batch sorted"
            );
            self.cpu.resource().release();
        }
    }
}
