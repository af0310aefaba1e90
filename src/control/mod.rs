//! Control-cycle driver, stepped continuous control, and cycle reports.

/// Cycle timing.
pub mod clock;
pub mod engine;
pub mod hydraulic_run;
/// Goal and pump recommendation records.
pub mod records;
pub mod report;
pub mod types;

pub use clock::Clock;
pub use engine::Engine;
pub use hydraulic_run::{ContinuousGroup, HydraulicRun, PointAction, StepReport};
pub use report::{CycleReport, RunSummary};
pub use types::{CycleResult, FailedWrite, StationStatus};
