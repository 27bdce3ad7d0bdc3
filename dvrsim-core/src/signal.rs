//! Broadcast notifications between processes.
//!
//! `signal()` resumes every process currently waiting. A signal raised while
//! nobody waits is latched: the next `wait()` returns at once and clears it.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::{trace, warn};

use crate::sim::{ProcessId, Sim};

#[derive(Debug, Default)]
struct SignalState {
    waiters: Vec<ProcessId>,
    generation: u64,
    latched: bool,
    raised: u64,
}

#[derive(Clone, Debug)]
pub struct Signal {
    name: Rc<str>,
    sim: Sim,
    state: Rc<RefCell<SignalState>>,
}

impl Signal {
    pub fn new(sim: &Sim, name: impl Into<String>) -> Self {
        Self {
            name: Rc::from(name.into()),
            sim: sim.clone(),
            state: Rc::new(RefCell::new(SignalState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wait(&self) -> Wait {
        Wait {
            signal: self.clone(),
            generation: None,
        }
    }

    /// Resumes all current waiters, or latches if there are none.
    pub fn signal(&self) {
        let woken = {
            let mut state = self.state.borrow_mut();
            state.raised += 1;
            if state.waiters.is_empty() {
                state.latched = true;
                return;
            }
            state.generation += 1;
            std::mem::take(&mut state.waiters)
        };
        trace!(signal = %self.name, waiters = woken.len(), "raised");
        let now = self.sim.now();
        for process in woken {
            self.sim.schedule(process, now);
        }
    }

    pub fn waiting(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    pub fn is_latched(&self) -> bool {
        self.state.borrow().latched
    }

    /// Number of times `signal()` was called.
    pub fn times_raised(&self) -> u64 {
        self.state.borrow().raised
    }
}

/// Future returned by [`Signal::wait`].
#[must_use = "futures do nothing unless awaited"]
pub struct Wait {
    signal: Signal,
    generation: Option<u64>,
}

impl Future for Wait {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let signal = self.signal.clone();
        let mut state = signal.state.borrow_mut();
        if let Some(generation) = self.generation {
            return if state.generation > generation {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }
        if state.latched {
            state.latched = false;
            return Poll::Ready(());
        }
        let Some(me) = signal.sim.current_process() else {
            warn!(signal = %signal.name, "wait polled outside of a process");
            return Poll::Pending;
        };
        state.waiters.push(me);
        self.generation = Some(state.generation);
        Poll::Pending
    }
}
