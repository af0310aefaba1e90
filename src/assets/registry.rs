use std::collections::BTreeMap;

use crate::assets::cso_basin::CsoBasin;
use crate::assets::pump_station::PumpStation;
use crate::assets::sewer_meter::SewerMeter;
use crate::assets::types::{AssetCore, AssetKind, MeasuredAsset};
use crate::error::ControlError;
use crate::telemetry::TelemetrySource;

/// Tagged asset variant; dispatches the measured-asset capability to the
/// concrete type so per-variant overrides stay in effect.
#[derive(Debug, Clone)]
pub enum Asset {
    PumpStation(PumpStation),
    CsoBasin(CsoBasin),
    SewerMeter(SewerMeter),
}

impl Asset {
    pub fn as_station(&self) -> Option<&PumpStation> {
        match self {
            Self::PumpStation(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_station_mut(&mut self) -> Option<&mut PumpStation> {
        match self {
            Self::PumpStation(s) => Some(s),
            _ => None,
        }
    }
}

impl MeasuredAsset for Asset {
    fn core(&self) -> &AssetCore {
        match self {
            Self::PumpStation(a) => a.core(),
            Self::CsoBasin(a) => a.core(),
            Self::SewerMeter(a) => a.core(),
        }
    }

    fn core_mut(&mut self) -> &mut AssetCore {
        match self {
            Self::PumpStation(a) => a.core_mut(),
            Self::CsoBasin(a) => a.core_mut(),
            Self::SewerMeter(a) => a.core_mut(),
        }
    }

    fn kind(&self) -> AssetKind {
        match self {
            Self::PumpStation(a) => a.kind(),
            Self::CsoBasin(a) => a.kind(),
            Self::SewerMeter(a) => a.kind(),
        }
    }

    fn cost_field(&self) -> &str {
        match self {
            Self::PumpStation(a) => a.cost_field(),
            Self::CsoBasin(a) => a.cost_field(),
            Self::SewerMeter(a) => a.cost_field(),
        }
    }

    fn fill_fraction(&self, field: &str) -> Option<f64> {
        match self {
            Self::PumpStation(a) => a.fill_fraction(field),
            Self::CsoBasin(a) => a.fill_fraction(field),
            Self::SewerMeter(a) => a.fill_fraction(field),
        }
    }
}

impl From<PumpStation> for Asset {
    fn from(s: PumpStation) -> Self {
        Self::PumpStation(s)
    }
}

impl From<CsoBasin> for Asset {
    fn from(b: CsoBasin) -> Self {
        Self::CsoBasin(b)
    }
}

impl From<SewerMeter> for Asset {
    fn from(m: SewerMeter) -> Self {
        Self::SewerMeter(m)
    }
}

/// Every asset of one control cycle, keyed by site name.
///
/// Built fresh from configuration at the start of a cycle and dropped at its end.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: BTreeMap<String, Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an asset, replacing any previous asset with the same name.
    pub fn insert(&mut self, asset: impl Into<Asset>) {
        let asset = asset.into();
        self.assets.insert(asset.name().to_string(), asset);
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Asset> {
        self.assets.get_mut(name)
    }

    pub fn station(&self, name: &str) -> Option<&PumpStation> {
        self.get(name).and_then(Asset::as_station)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Pump stations in name order.
    pub fn stations(&self) -> impl Iterator<Item = &PumpStation> {
        self.assets.values().filter_map(Asset::as_station)
    }

    pub fn stations_mut(&mut self) -> impl Iterator<Item = &mut PumpStation> {
        self.assets.values_mut().filter_map(Asset::as_station_mut)
    }

    /// Refreshes every asset; missing samples are collected, never fatal.
    pub fn refresh_all(&mut self, source: &dyn TelemetrySource) -> Vec<ControlError> {
        self.assets
            .values_mut()
            .flat_map(|a| a.refresh(source))
            .collect()
    }

    pub fn normalize_all(&mut self) {
        for a in self.assets.values_mut() {
            a.normalize();
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
