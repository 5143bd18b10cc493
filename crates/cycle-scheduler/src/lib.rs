//! Periodic Cycle Scheduler
//!
//! Gates each control-loop iteration on a free-running hardware counter.
//! Overruns are reported through the status word, never treated as fatal.

mod scheduler;
mod timer;

pub use scheduler::{CycleOutcome, CycleScheduler, SchedulerConfig, SchedulerError};
pub use timer::{CycleTimer, MockTimer, OverrunFlag};
