//! Translation of allocation goals into actuator commands.

/// Discrete pump run-time recommendations.
pub mod scheduler;
/// Continuous gate and pump openings with flood override.
pub mod solver;

pub use scheduler::{MIN_RUN_SECONDS, PumpSchedule, Scheduler, recommend};
pub use solver::{Regime, SolveOutcome, Solver};
