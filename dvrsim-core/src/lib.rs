//! # dvrsim-core
//!
//! Discrete-event simulation kernel for the DVR storage simulator.
//! Built around a single-threaded, cooperative executor: exactly one process
//! runs at a time, and it runs until it reaches its next suspension point.
//!
//! ### Expectations:
//! - Deterministic: same seed and same activation order produce the same run
//! - Events scheduled for the same instant resume in scheduling order
//! - The virtual clock never moves backward
//!
//! ### Key Submodules:
//! - `time`: `VirtualClock` in floating-point milliseconds
//! - `events`: min-time event queue with FIFO tie-break
//! - `sim`: the `Sim` kernel handle, process lifecycle and `hold`
//! - `resource`: FIFO-fair exclusive resources
//! - `level`: capacity-bounded blocking buffers
//! - `signal`: one-shot broadcast events
//! - `rng`: seeded random source shared by every component
//!
//! ### Future:
//! - Per-process statistics (time blocked vs. time running)

pub mod events;
pub mod level;
pub mod resource;
pub mod rng;
pub mod signal;
pub mod sim;
pub mod time;

pub mod prelude {
    pub use crate::level::Level;
    pub use crate::resource::Resource;
    pub use crate::rng::SimRng;
    pub use crate::signal::Signal;
    pub use crate::sim::{ProcessId, RunSummary, Sim};
    pub use crate::time::{SimTime, VirtualClock};
}

pub use level::Level;
pub use resource::Resource;
pub use rng::SimRng;
pub use signal::Signal;
pub use sim::{Hold, ProcessId, RunSummary, Sim};
pub use time::{SimTime, VirtualClock};
