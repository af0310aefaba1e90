//! Market-based control engine for combined sewer networks.

/// Discrete pump scheduling and continuous opening solver.
pub mod actuation;
#[cfg(feature = "api")]
pub mod api;
pub mod assets;
pub mod config;
/// Control-cycle driver, stepped continuous run, and reports.
pub mod control;
pub mod error;
pub mod hydraulics;
pub mod io;
pub mod market;
pub mod telemetry;
