//! ## dvrsim-core::level
//! **Capacity-bounded continuous buffers**
//!
//! A `Level` holds a quantity between zero and its capacity. `put(x)` blocks
//! while the buffer cannot take `x` more, `get(x)` blocks while it holds less
//! than `x`. Each side is served strictly in arrival order: a request that does
//! not fit holds back everything queued behind it on the same side.
//!
//! Every committed transfer re-examines the head of both queues and resumes
//! the ones that now fit. A resumed waiter re-checks its condition when it
//! runs, because another process may have changed the amount in between.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::{trace, warn};

use crate::sim::{ProcessId, Sim};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Put,
    Get,
}

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    process: ProcessId,
    amount: f64,
    notified: bool,
}

#[derive(Debug)]
struct LevelState {
    amount: f64,
    putters: VecDeque<Waiter>,
    getters: VecDeque<Waiter>,
    next_ticket: u64,
}

impl LevelState {
    fn queue_mut(&mut self, direction: Direction) -> &mut VecDeque<Waiter> {
        match direction {
            Direction::Put => &mut self.putters,
            Direction::Get => &mut self.getters,
        }
    }

    fn fits(&self, direction: Direction, amount: f64, capacity: f64) -> bool {
        match direction {
            Direction::Put => self.amount + amount <= capacity,
            Direction::Get => self.amount >= amount,
        }
    }

    /// Marks the head of each queue as notified if its request now fits.
    fn collect_wakeups(&mut self, capacity: f64) -> Vec<ProcessId> {
        let mut wake = Vec::new();
        for direction in [Direction::Put, Direction::Get] {
            let current = self.amount;
            let Some(head) = self.queue_mut(direction).front_mut() else {
                continue;
            };
            let fits = match direction {
                Direction::Put => current + head.amount <= capacity,
                Direction::Get => current >= head.amount,
            };
            if fits && !head.notified {
                head.notified = true;
                wake.push(head.process);
            }
        }
        wake
    }
}

/// Handle to a shared buffer. Cheap to clone; all clones share state.
#[derive(Clone, Debug)]
pub struct Level {
    name: Rc<str>,
    capacity: f64,
    sim: Sim,
    state: Rc<RefCell<LevelState>>,
}

impl Level {
    /// Creates a buffer holding `initial`, clamped into `[0, capacity]`.
    pub fn new(sim: &Sim, name: impl Into<String>, capacity: f64, initial: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            name: Rc::from(name.into()),
            capacity,
            sim: sim.clone(),
            state: Rc::new(RefCell::new(LevelState {
                amount: initial.clamp(0.0, capacity),
                putters: VecDeque::new(),
                getters: VecDeque::new(),
                next_ticket: 0,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn amount(&self) -> f64 {
        self.state.borrow().amount
    }

    pub fn free_space(&self) -> f64 {
        self.capacity - self.amount()
    }

    pub fn putters_waiting(&self) -> usize {
        self.state.borrow().putters.len()
    }

    pub fn getters_waiting(&self) -> usize {
        self.state.borrow().getters.len()
    }

    /// Adds `amount` once it fits. Negative amounts count as zero.
    pub fn put(&self, amount: f64) -> Transfer {
        if amount > self.capacity {
            warn!(level = %self.name, amount, capacity = self.capacity, "put can never fit");
        }
        self.transfer(Direction::Put, amount)
    }

    /// Removes `amount` once available. Negative amounts count as zero.
    pub fn get(&self, amount: f64) -> Transfer {
        self.transfer(Direction::Get, amount)
    }

    fn transfer(&self, direction: Direction, amount: f64) -> Transfer {
        Transfer {
            level: self.clone(),
            direction,
            amount: amount.max(0.0),
            ticket: None,
        }
    }
}

/// Future returned by [`Level::put`] and [`Level::get`].
#[must_use = "futures do nothing unless awaited"]
pub struct Transfer {
    level: Level,
    direction: Direction,
    amount: f64,
    ticket: Option<u64>,
}

impl Future for Transfer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let level = self.level.clone();
        let Some(me) = level.sim.current_process() else {
            warn!(level = %level.name, "transfer polled outside of a process");
            return Poll::Pending;
        };
        let (direction, amount) = (self.direction, self.amount);

        let mut state = level.state.borrow_mut();
        let ticket = match self.ticket {
            Some(ticket) => ticket,
            None => {
                let ticket = state.next_ticket;
                state.next_ticket += 1;
                state.queue_mut(direction).push_back(Waiter {
                    ticket,
                    process: me,
                    amount,
                    notified: false,
                });
                self.ticket = Some(ticket);
                ticket
            }
        };

        let at_front = state.queue_mut(direction).front().map(|w| w.ticket) == Some(ticket);
        if at_front && state.fits(direction, amount, level.capacity) {
            state.queue_mut(direction).pop_front();
            match direction {
                Direction::Put => state.amount += amount,
                Direction::Get => state.amount -= amount,
            }
            trace!(level = %level.name, ?direction, amount, now_holding = state.amount, "committed");
            let wake = state.collect_wakeups(level.capacity);
            drop(state);
            let now = level.sim.now();
            for process in wake {
                level.sim.schedule(process, now);
            }
            return Poll::Ready(());
        }

        if let Some(waiter) = state
            .queue_mut(direction)
            .iter_mut()
            .find(|w| w.ticket == ticket)
        {
            waiter.notified = false;
        }
        Poll::Pending
    }
}
