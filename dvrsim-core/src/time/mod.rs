//! ## dvrsim-core::time
//! **Virtual clock**
//!
//! Simulated time is a floating-point number of milliseconds. Only the kernel
//! moves the clock, and only forward, when it dispatches the next queued
//! resumption.

use std::cell::Cell;
use std::rc::Rc;

/// Simulated time in milliseconds.
pub type SimTime = f64;

/// A shared, monotonically non-decreasing virtual clock.
///
/// Cloning the clock yields another handle to the same instant.
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    now_ms: Rc<Cell<SimTime>>,
}

impl VirtualClock {
    /// Creates a new virtual clock starting at `start` milliseconds.
    pub fn new(start: SimTime) -> Self {
        Self {
            now_ms: Rc::new(Cell::new(start)),
        }
    }

    /// Returns the current virtual time in milliseconds.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now_ms.get()
    }

    /// Moves the clock to `t`. Instants in the past are ignored.
    #[inline]
    pub fn advance_to(&self, t: SimTime) -> SimTime {
        if t > self.now_ms.get() {
            self.now_ms.set(t);
        }
        self.now_ms.get()
    }
}
