//! Hydraulic-model collaborator: solved network state, model tables, and the
//! control/downstream points defined on top of them.

pub mod model;
pub mod points;
pub mod replay;
pub mod tables;

pub use model::{HydraulicProvider, HydraulicSnapshot, LinkState, NodeState, UnitSystem};
pub use points::{
    ActuatorKind, ControlPoint, ControlPointConfig, DownstreamPoint, DownstreamPointConfig,
    ElementKind,
};
pub use replay::{ReplayError, ReplayProvider};
pub use tables::{CurveFamily, ModelTables, Shape};
