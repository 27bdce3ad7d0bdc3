//! Exclusive, capacity-one resources with FIFO-fair hand-off.
//!
//! Releasing a contended resource transfers ownership straight to the
//! longest-waiting process, so a late arrival can never overtake the queue.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::{trace, warn};

use crate::sim::{ProcessId, Sim};
use crate::time::SimTime;

#[derive(Debug, Default)]
struct ResourceState {
    holder: Option<ProcessId>,
    waiters: VecDeque<ProcessId>,
    acquisitions: u64,
}

/// Handle to a shared resource such as a bus or a CPU.
#[derive(Clone, Debug)]
pub struct Resource {
    name: Rc<str>,
    sim: Sim,
    state: Rc<RefCell<ResourceState>>,
}

impl Resource {
    pub fn new(sim: &Sim, name: impl Into<String>) -> Self {
        Self {
            name: Rc::from(name.into()),
            sim: sim.clone(),
            state: Rc::new(RefCell::new(ResourceState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Suspends the calling process until it holds the resource.
    pub fn acquire(&self) -> Acquire {
        Acquire {
            resource: self.clone(),
            queued: false,
        }
    }

    /// Gives the resource up. Must be called by the current holder.
    pub fn release(&self) {
        let caller = self.sim.current_process();
        let mut state = self.state.borrow_mut();
        if caller.is_none() || state.holder != caller {
            warn!(
                resource = %self.name,
                "release by a process that does not hold the resource"
            );
            return;
        }
        let next = state.waiters.pop_front();
        state.holder = next;
        if next.is_some() {
            state.acquisitions += 1;
        }
        drop(state);
        if let Some(next) = next {
            trace!(resource = %self.name, process = %next, "handing over");
            self.sim.schedule(next, self.sim.now());
        }
    }

    /// Acquires the resource, holds it for `duration`, then releases it.
    pub async fn occupy(&self, duration: SimTime) {
        self.acquire().await;
        self.sim.hold(duration).await;
        self.release();
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().holder.is_some()
    }

    pub fn holder(&self) -> Option<ProcessId> {
        self.state.borrow().holder
    }

    pub fn queue_len(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    /// Number of grants made so far.
    pub fn acquisitions(&self) -> u64 {
        self.state.borrow().acquisitions
    }
}

/// Future returned by [`Resource::acquire`].
#[must_use = "futures do nothing unless awaited"]
pub struct Acquire {
    resource: Resource,
    queued: bool,
}

impl Future for Acquire {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let Some(me) = self.resource.sim.current_process() else {
            warn!(resource = %self.resource.name, "acquire polled outside of a process");
            return Poll::Pending;
        };
        let resource = self.resource.clone();
        let mut state = resource.state.borrow_mut();
        if state.holder == Some(me) {
            return Poll::Ready(());
        }
        if state.holder.is_none() && state.waiters.is_empty() {
            state.holder = Some(me);
            state.acquisitions += 1;
            return Poll::Ready(());
        }
        if !self.queued {
            state.waiters.push_back(me);
            self.queued = true;
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    #[test]
    fn grants_in_request_order() {
        let sim = Sim::new(3);
        let bus = Resource::new(&sim, "bus");
        let log = Rc::new(RefCell::new(Vec::new()));

        for (name, start) in [("first", 0.0), ("second", 1.0), ("third", 2.0)] {
            let (s, bus, log) = (sim.clone(), bus.clone(), log.clone());
            sim.spawn_at(
                name,
                async move {
                    bus.acquire().await;
                    log.borrow_mut().push((name, s.now()));
                    s.hold(10.0).await;
                    bus.release();
                },
                start,
            );
        }

        sim.run_until(100.0);
        assert_eq!(
            *log.borrow(),
            vec![("first", 0.0), ("second", 10.0), ("third", 20.0)]
        );
        assert_eq!(bus.acquisitions(), 3);
        assert!(!bus.is_busy());
    }

    #[test]
    fn occupy_serializes_users() {
        let sim = Sim::new(3);
        let cpu = Resource::new(&sim, "cpu");
        let done = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let (s, cpu, done) = (sim.clone(), cpu.clone(), done.clone());
            sim.spawn("user", async move {
                cpu.occupy(4.0).await;
                done.borrow_mut().push(s.now());
            });
        }
        sim.run_until(50.0);
        assert_eq!(*done.borrow(), vec![4.0, 8.0, 12.0]);
    }

    #[test]
    fn queue_length_reflects_waiters() {
        let sim = Sim::new(3);
        let bus = Resource::new(&sim, "bus");
        for _ in 0..3 {
            let (s, bus) = (sim.clone(), bus.clone());
            sim.spawn("user", async move {
                bus.acquire().await;
                s.hold(5.0).await;
                bus.release();
            });
        }
        sim.run_until(0.0);
        assert!(bus.is_busy());
        assert_eq!(bus.queue_len(), 2);
        sim.run_until(5.0);
        assert_eq!(bus.queue_len(), 1);
    }

    #[test]
    fn release_by_non_holder_is_ignored() {
        let sim = Sim::new(3);
        let bus = Resource::new(&sim, "bus");
        let (s, holder_bus) = (sim.clone(), bus.clone());
        let holder = sim.spawn("holder", async move {
            holder_bus.acquire().await;
            s.hold(10.0).await;
            holder_bus.release();
        });
        let intruder_bus = bus.clone();
        sim.spawn_at("intruder", async move { intruder_bus.release() }, 1.0);

        sim.run_until(2.0);
        assert_eq!(bus.holder(), Some(holder));
        sim.run_until(20.0);
        assert_eq!(bus.holder(), None);
    }

    proptest! {
        #[test]
        fn grants_follow_arrival_with_one_holder(
            users in prop::collection::vec((0u32..40, 1u32..8), 1..24)
        ) {
            let sim = Sim::new(11);
            let cpu = Resource::new(&sim, "cpu");
            let granted = Rc::new(RefCell::new(Vec::new()));
            let holding = Rc::new(Cell::new(0u32));
            let max_holding = Rc::new(Cell::new(0u32));

            for (index, &(arrival, hold)) in users.iter().enumerate() {
                let (s, cpu, granted) = (sim.clone(), cpu.clone(), granted.clone());
                let (holding, max_holding) = (holding.clone(), max_holding.clone());
                sim.spawn_at(
                    "user",
                    async move {
                        cpu.acquire().await;
                        holding.set(holding.get() + 1);
                        max_holding.set(max_holding.get().max(holding.get()));
                        granted.borrow_mut().push(index);
                        s.hold(f64::from(hold)).await;
                        holding.set(holding.get() - 1);
                        cpu.release();
                    },
                    f64::from(arrival),
                );
            }
            sim.run_until(1_000.0);

            // Equal arrival times resume in spawn order.
            let mut expected: Vec<usize> = (0..users.len()).collect();
            expected.sort_by_key(|&i| users[i].0);
            prop_assert_eq!(&*granted.borrow(), &expected);
            prop_assert_eq!(max_holding.get(), 1);
            prop_assert!(!cpu.is_busy());
            prop_assert_eq!(cpu.acquisitions(), users.len() as u64);
        }
    }
}
