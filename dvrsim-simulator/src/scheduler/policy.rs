//! Dispatch policies: how a batch is cut from the intake queue and ordered.

use std::collections::VecDeque;

use dvrsim_config::{SchedulerConfig, SchedulingPolicy};
use dvrsim_core::SimTime;

use crate::request::IoRequest;

/// A batch ready for the dispatch queue, plus the CPU work it took to plan.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub batch: Vec<IoRequest>,
    pub operations: f64,
}

/// Trait for dispatch policies.
pub trait DispatchPolicy {
    fn name(&self) -> &'static str;

    /// Intake size at which the control loop starts a sort.
    fn min_batch(&self) -> usize;

    /// Removes the next batch from `intake`, in dispatch order.
    fn plan(&self, intake: &mut VecDeque<IoRequest>, now: SimTime) -> BatchPlan;
}

/// Moves the whole intake, ordered by ascending address.
#[derive(Debug, Clone, Copy)]
pub struct AddressPolicy {
    min_batch: usize,
}

impl AddressPolicy {
    pub fn new(min_batch: usize) -> Self {
        Self { min_batch }
    }
}

impl DispatchPolicy for AddressPolicy {
    fn name(&self) -> &'static str {
        "address"
    }

    fn min_batch(&self) -> usize {
        self.min_batch
    }

    fn plan(&self, intake: &mut VecDeque<IoRequest>, _now: SimTime) -> BatchPlan {
        let mut batch: Vec<IoRequest> = intake.drain(..).collect();
        batch.sort_by_key(|r| r.address);
        BatchPlan {
            operations: batch.len() as f64,
            batch,
        }
    }
}

/// Admits requests in deadline order while the tightest deadline leaves
/// budget for them, then orders the admitted set by address.
///
/// The budget is `head.deadline - now`, charged `request_estimate_ms` per
/// admitted request. The request that drives it below zero is still admitted
/// and closes the batch.
#[derive(Debug, Clone, Copy)]
pub struct DeadlinePolicy {
    min_batch: usize,
    request_estimate_ms: f64,
}

impl DeadlinePolicy {
    pub fn new(min_batch: usize, request_estimate_ms: f64) -> Self {
        Self {
            min_batch,
            request_estimate_ms,
        }
    }
}

impl DispatchPolicy for DeadlinePolicy {
    fn name(&self) -> &'static str {
        "deadline"
    }

    fn min_batch(&self) -> usize {
        self.min_batch
    }

    fn plan(&self, intake: &mut VecDeque<IoRequest>, now: SimTime) -> BatchPlan {
        intake
            .make_contiguous()
            .sort_by(|a, b| a.deadline.total_cmp(&b.deadline));

        let Some(head) = intake.pop_front() else {
            return BatchPlan::default();
        };
        let mut budget = head.deadline - now - self.request_estimate_ms;
        let mut admitted = vec![head];
        while budget >= 0.0 {
            let Some(next) = intake.pop_front() else {
                break;
            };
            admitted.push(next);
            budget -= self.request_estimate_ms;
        }

        admitted.sort_by_key(|r| r.address);
        let n = admitted.len() as f64;
        BatchPlan {
            batch: admitted,
            operations: n * n,
        }
    }
}

pub fn policy_for(policy: SchedulingPolicy, config: &SchedulerConfig) -> Box<dyn DispatchPolicy> {
    match policy {
        SchedulingPolicy::Address => Box::new(AddressPolicy::new(config.address_min_batch)),
        SchedulingPolicy::Deadline => Box::new(DeadlinePolicy::new(
            config.deadline_min_batch,
            config.deadline_request_estimate_ms,
        )),
    }
}
