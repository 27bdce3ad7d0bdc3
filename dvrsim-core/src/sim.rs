//! ## dvrsim-core::sim
//! **Cooperative simulation kernel**
//!
//! `Sim` owns the virtual clock, the event queue and the suspended bodies of
//! every live process. A process body is an `async` block; the kernel polls it
//! whenever one of its queued resumptions comes due. Suspension primitives
//! (`hold`, `Resource::acquire`, `Level::put`/`get`, `Signal::wait`) record the
//! current [`ProcessId`] with whatever they block on and re-queue it through
//! [`Sim::schedule`] once the wait may have cleared.
//!
//! The kernel is single-threaded: exactly one body is being polled at any time,
//! so no locking is needed around shared simulation objects.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use tracing::{debug, trace, warn};

use crate::events::{EventQueue, ScheduledResume};
use crate::rng::SimRng;
use crate::time::{SimTime, VirtualClock};

/// Identifier of a simulated process. Never reused within one kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(usize);

impl ProcessId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ProcessSlot {
    name: String,
    /// `None` while the body is being polled.
    body: Option<LocalBoxFuture<'static, ()>>,
}

#[derive(Default)]
struct Kernel {
    queue: EventQueue,
    next_sequence: u64,
    processes: Vec<Option<ProcessSlot>>,
    current: Option<ProcessId>,
    events_processed: u64,
}

/// Snapshot returned by [`Sim::run_until`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub now: SimTime,
    pub events_processed: u64,
    pub live_processes: usize,
    pub pending_events: usize,
}

/// Handle to the simulation kernel. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Sim {
    kernel: Rc<RefCell<Kernel>>,
    clock: VirtualClock,
    rng: SimRng,
}

impl Sim {
    /// Creates an empty kernel at time zero with a seeded random source.
    pub fn new(seed: u64) -> Self {
        Self {
            kernel: Rc::new(RefCell::new(Kernel::default())),
            clock: VirtualClock::new(0.0),
            rng: SimRng::new(seed),
        }
    }

    /// Current virtual time in milliseconds.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn rng(&self) -> &SimRng {
        &self.rng
    }

    /// The process whose body is currently being polled, if any.
    pub fn current_process(&self) -> Option<ProcessId> {
        self.kernel.borrow().current
    }

    /// Registers a process and schedules its first resumption at `now`.
    pub fn spawn<F>(&self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawn_at(name, body, self.now())
    }

    /// Registers a process and schedules its first resumption at `at`.
    pub fn spawn_at<F>(&self, name: impl Into<String>, body: F, at: SimTime) -> ProcessId
    where
        F: Future<Output = ()> + 'static,
    {
        let name = name.into();
        let pid = {
            let mut kernel = self.kernel.borrow_mut();
            let pid = ProcessId(kernel.processes.len());
            kernel.processes.push(Some(ProcessSlot {
                name: name.clone(),
                body: Some(body.boxed_local()),
            }));
            pid
        };
        debug!(process = %pid, %name, at, "process created");
        self.schedule(pid, at);
        pid
    }

    /// Queues a resumption of `process` at `resume_at`.
    ///
    /// Instants before `now` are clamped to `now`. Resumptions of finished
    /// processes are dropped.
    pub fn schedule(&self, process: ProcessId, resume_at: SimTime) {
        let at = resume_at.max(self.now());
        let mut kernel = self.kernel.borrow_mut();
        if !matches!(kernel.processes.get(process.0), Some(Some(_))) {
            trace!(%process, "ignoring resumption of finished process");
            return;
        }
        let sequence = kernel.next_sequence;
        kernel.next_sequence += 1;
        kernel
            .queue
            .schedule(ScheduledResume::new(at, sequence, process));
    }

    /// Suspends the calling process for `duration` milliseconds.
    pub fn hold(&self, duration: SimTime) -> Hold {
        Hold {
            sim: self.clone(),
            duration,
            wake_at: None,
        }
    }

    /// Dispatches the earliest queued resumption.
    ///
    /// Returns `true` if more resumptions remain queued.
    pub fn step(&self) -> bool {
        let Some(entry) = self.kernel.borrow_mut().queue.pop_earliest() else {
            return false;
        };
        self.clock.advance_to(entry.time());
        let pid = entry.process();

        let body = {
            let mut kernel = self.kernel.borrow_mut();
            kernel.events_processed += 1;
            let body = kernel
                .processes
                .get_mut(pid.0)
                .and_then(Option::as_mut)
                .and_then(|slot| slot.body.take());
            if body.is_some() {
                kernel.current = Some(pid);
            }
            body
        };
        let Some(mut body) = body else {
            trace!(process = %pid, "discarding stale resumption");
            return !self.kernel.borrow().queue.is_empty();
        };

        trace!(process = %pid, now = entry.time(), "resuming");
        let mut cx = Context::from_waker(noop_waker_ref());
        let poll = body.as_mut().poll(&mut cx);

        let mut kernel = self.kernel.borrow_mut();
        kernel.current = None;
        match poll {
            Poll::Ready(()) => {
                if let Some(slot) = kernel.processes.get_mut(pid.0).and_then(Option::take) {
                    debug!(process = %pid, name = %slot.name, "process finished");
                }
            }
            Poll::Pending => {
                if let Some(Some(slot)) = kernel.processes.get_mut(pid.0) {
                    slot.body = Some(body);
                }
            }
        }
        !kernel.queue.is_empty()
    }

    /// Processes events until the queue empties or the next event lies after
    /// `max_time`. When later events remain, the clock is left at `max_time`.
    pub fn run_until(&self, max_time: SimTime) -> RunSummary {
        loop {
            let next = self.kernel.borrow().queue.peek_time();
            match next {
                Some(t) if t <= max_time => {
                    self.step();
                }
                _ => break,
            }
        }
        if !self.kernel.borrow().queue.is_empty() {
            self.clock.advance_to(max_time);
        }
        self.summary()
    }

    pub fn summary(&self) -> RunSummary {
        let kernel = self.kernel.borrow();
        RunSummary {
            now: self.now(),
            events_processed: kernel.events_processed,
            live_processes: kernel.processes.iter().flatten().count(),
            pending_events: kernel.queue.len(),
        }
    }

    pub fn is_alive(&self, process: ProcessId) -> bool {
        matches!(self.kernel.borrow().processes.get(process.0), Some(Some(_)))
    }

    pub fn process_name(&self, process: ProcessId) -> Option<String> {
        self.kernel
            .borrow()
            .processes
            .get(process.0)
            .and_then(Option::as_ref)
            .map(|slot| slot.name.clone())
    }

    pub fn pending_events(&self) -> usize {
        self.kernel.borrow().queue.len()
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Sim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kernel = self.kernel.borrow();
        f.debug_struct("Sim")
            .field("now", &self.now())
            .field("pending_events", &kernel.queue.len())
            .field("events_processed", &kernel.events_processed)
            .finish()
    }
}

/// Future returned by [`Sim::hold`].
#[must_use = "futures do nothing unless awaited"]
pub struct Hold {
    sim: Sim,
    duration: SimTime,
    wake_at: Option<SimTime>,
}

impl Future for Hold {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let now = self.sim.now();
        match self.wake_at {
            Some(at) if now >= at => Poll::Ready(()),
            Some(_) => Poll::Pending,
            None => {
                let at = now + self.duration.max(0.0);
                self.wake_at = Some(at);
                match self.sim.current_process() {
                    Some(pid) => self.sim.schedule(pid, at),
                    None => warn!("hold polled outside of a simulation process"),
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tracing_test::traced_test;

    fn recorder<T>() -> Rc<RefCell<Vec<T>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn hold_resumes_after_duration() {
        let sim = Sim::new(1);
        let seen = recorder();
        let (s, log) = (sim.clone(), seen.clone());
        sim.spawn("sleeper", async move {
            s.hold(5.0).await;
            log.borrow_mut().push(s.now());
            s.hold(2.5).await;
            log.borrow_mut().push(s.now());
        });

        let summary = sim.run_until(100.0);
        assert_eq!(*seen.borrow(), vec![5.0, 7.5]);
        assert_eq!(summary.live_processes, 0);
        assert_eq!(summary.pending_events, 0);
        // Queue drained before the bound: the clock stays at the last event.
        assert_eq!(summary.now, 7.5);
    }

    #[test]
    fn same_time_resumptions_run_in_scheduling_order() {
        let sim = Sim::new(1);
        let order = recorder();
        for name in ["a", "b", "c", "d"] {
            let (s, log) = (sim.clone(), order.clone());
            sim.spawn(name, async move {
                s.hold(10.0).await;
                log.borrow_mut().push(name);
            });
        }
        sim.run_until(10.0);
        assert_eq!(*order.borrow(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn run_until_stops_at_bound_and_can_continue() {
        let sim = Sim::new(1);
        let ticks = recorder();
        let (s, log) = (sim.clone(), ticks.clone());
        sim.spawn("ticker", async move {
            loop {
                s.hold(10.0).await;
                log.borrow_mut().push(s.now());
            }
        });

        let summary = sim.run_until(35.0);
        assert_eq!(*ticks.borrow(), vec![10.0, 20.0, 30.0]);
        assert_eq!(summary.now, 35.0);
        assert_eq!(summary.pending_events, 1);
        assert_eq!(summary.live_processes, 1);

        sim.run_until(50.0);
        assert_eq!(*ticks.borrow(), vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn spawn_at_delays_first_resumption() {
        let sim = Sim::new(1);
        let seen = recorder();
        let (s, log) = (sim.clone(), seen.clone());
        sim.spawn_at(
            "late",
            async move {
                log.borrow_mut().push(s.now());
            },
            100.0,
        );
        sim.run_until(1_000.0);
        assert_eq!(*seen.borrow(), vec![100.0]);
    }

    #[test]
    fn negative_hold_resumes_at_current_instant() {
        let sim = Sim::new(1);
        let seen = recorder();
        let (s, log) = (sim.clone(), seen.clone());
        sim.spawn("p", async move {
            s.hold(3.0).await;
            s.hold(-10.0).await;
            log.borrow_mut().push(s.now());
        });
        sim.run_until(10.0);
        assert_eq!(*seen.borrow(), vec![3.0]);
    }

    #[test]
    fn processes_can_spawn_processes() {
        let sim = Sim::new(1);
        let seen = recorder();
        let (s, log) = (sim.clone(), seen.clone());
        sim.spawn("parent", async move {
            s.hold(1.0).await;
            let (child_sim, child_log) = (s.clone(), log.clone());
            s.spawn("child", async move {
                child_sim.hold(4.0).await;
                child_log.borrow_mut().push(("child", child_sim.now()));
            });
            log.borrow_mut().push(("parent", s.now()));
        });
        sim.run_until(10.0);
        assert_eq!(*seen.borrow(), vec![("parent", 1.0), ("child", 5.0)]);
    }

    #[test]
    fn finished_processes_are_not_alive() {
        let sim = Sim::new(1);
        let s = sim.clone();
        let pid = sim.spawn("short", async move {
            s.hold(1.0).await;
        });
        assert!(sim.is_alive(pid));
        assert_eq!(sim.process_name(pid).as_deref(), Some("short"));
        sim.run_until(5.0);
        assert!(!sim.is_alive(pid));
        assert_eq!(sim.process_name(pid), None);

        // Resumptions of finished processes are dropped.
        sim.schedule(pid, 6.0);
        assert_eq!(sim.pending_events(), 0);
    }

    #[traced_test]
    #[test]
    fn logs_process_lifecycle() {
        let sim = Sim::new(1);
        sim.spawn("logged", async {});
        sim.run_until(1.0);
        assert!(logs_contain("process created"));
        assert!(logs_contain("process finished"));
    }
}
