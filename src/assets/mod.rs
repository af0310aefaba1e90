//! Measured sewer assets: pump stations, CSO basins, and sewer meters.

pub mod cso_basin;
/// Pump stations and their pumps.
pub mod pump_station;
pub mod registry;
/// Circular-conduit level/flow meters.
pub mod sewer_meter;
pub mod types;

pub use cso_basin::CsoBasin;
pub use pump_station::{Pump, PumpRecommendation, PumpStation};
pub use registry::{Asset, AssetRegistry};
pub use sewer_meter::SewerMeter;
pub use types::{AssetCore, AssetKind, FieldReading, MeasuredAsset, Normalization};
