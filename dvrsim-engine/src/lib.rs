//! ## dvrsim-engine
//! **Running and reporting simulations**
//!
//! Shared by every frontend: validates the configuration, runs the model on a
//! dedicated thread, and reduces the final state to a [`SimulationReport`]
//! whose digest pins the run down for regression checks.
//!
//! ### Key Submodules:
//! - `runtime`: single runs and parallel seed sweeps
//! - `report`: report structure, digest, YAML and text rendering
//! - `error`: [`EngineError`]

mod error;
pub mod report;
pub mod runtime;

pub use error::EngineError;
pub use report::{RunCounters, SimulationReport, StreamReport};
pub use runtime::{
    run_simulation, run_simulation_task, sweep, RunOutcome, SweepPlan, SweepReport, SweepRow,
};
