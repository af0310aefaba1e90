//! Common types and the measured-asset capability shared by every asset variant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::ControlError;
use crate::telemetry::TelemetrySource;

/// Latest state of one declared telemetry field.
///
/// `raw` and `timestamp` come from the telemetry refresh; `normalized` is
/// appended by [`MeasuredAsset::normalize`] for normalization fields only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldReading {
    pub timestamp: Option<DateTime<Utc>>,
    pub raw: Option<f64>,
    pub normalized: Option<f64>,
}

/// Converts a raw level or elevation into a dimensionless fill fraction:
/// `(raw - invert) / max_depth`.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub field: String,
    pub invert: f64,
    pub max_depth: f64,
}

impl Normalization {
    pub fn new(field: impl Into<String>, invert: f64, max_depth: f64) -> Self {
        Self {
            field: field.into(),
            invert,
            max_depth,
        }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        (raw - self.invert) / self.max_depth
    }
}

/// Asset category tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    PumpStation,
    CsoBasin,
    SewerMeter,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PumpStation => "pump_station",
            Self::CsoBasin => "cso_basin",
            Self::SewerMeter => "sewer_meter",
        }
    }
}

/// Identity, declared fields, and normalization rules common to all assets.
#[derive(Debug, Clone)]
pub struct AssetCore {
    /// Site name as tagged in the telemetry store.
    pub name: String,
    /// Telemetry measure the site reports under (e.g. `FREUD`, `CSO_BASIN`).
    pub measure: String,
    pub fields: BTreeMap<String, FieldReading>,
    pub normalizations: Vec<Normalization>,
}

impl AssetCore {
    pub fn new(
        name: impl Into<String>,
        measure: impl Into<String>,
        fields: &[String],
        normalizations: Vec<Normalization>,
    ) -> Self {
        let mut map: BTreeMap<String, FieldReading> = fields
            .iter()
            .map(|f| (f.clone(), FieldReading::default()))
            .collect();
        for n in &normalizations {
            map.entry(n.field.clone()).or_default();
        }
        Self {
            name: name.into(),
            measure: measure.into(),
            fields: map,
            normalizations,
        }
    }

    /// Pulls the latest sample for every declared field.
    ///
    /// Fields without a sample keep their previous state and are returned as
    /// `MissingData` errors; the remaining fields are still refreshed.
    pub fn refresh(&mut self, source: &dyn TelemetrySource) -> Vec<ControlError> {
        let mut missing = Vec::new();
        for (field, reading) in self.fields.iter_mut() {
            match source.get_latest(&self.name, &self.measure, field) {
                Ok(sample) => {
                    reading.timestamp = Some(sample.timestamp);
                    reading.raw = Some(sample.value);
                    reading.normalized = None;
                }
                Err(e) => {
                    warn!(asset = %self.name, field = %field, "telemetry refresh failed: {e}");
                    missing.push(ControlError::MissingData {
                        asset: self.name.clone(),
                        measure: self.measure.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
        missing
    }

    /// Appends the normalized value to every normalization field holding a raw sample.
    pub fn apply_normalizations(&mut self) {
        for n in &self.normalizations {
            if let Some(reading) = self.fields.get_mut(&n.field) {
                reading.normalized = reading.raw.map(|raw| n.apply(raw));
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldReading> {
        self.fields.get(name)
    }

    pub fn raw(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|r| r.raw)
    }

    pub fn normalized(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(|r| r.normalized)
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.fields.get(name).and_then(|r| r.timestamp)
    }
}

/// Capability shared by every measured asset: refresh from telemetry,
/// normalize raw levels, and price a downstream constraint.
///
/// Variants override only the equations that differ from the defaults.
pub trait MeasuredAsset {
    fn core(&self) -> &AssetCore;

    fn core_mut(&mut self) -> &mut AssetCore;

    fn kind(&self) -> AssetKind;

    /// Field priced when a group names this asset as its downstream
    /// constraint without naming a field.
    fn cost_field(&self) -> &str;

    fn name(&self) -> &str {
        &self.core().name
    }

    /// Populates declared fields from the latest telemetry snapshot.
    fn refresh(&mut self, source: &dyn TelemetrySource) -> Vec<ControlError> {
        self.core_mut().refresh(source)
    }

    /// Computes normalized values for the asset's normalization fields.
    fn normalize(&mut self) {
        self.core_mut().apply_normalizations();
    }

    /// Demand contribution of `field`: its normalized value clamped to `>= 0`.
    /// A field with no normalized value contributes nothing.
    fn demand(&self, field: &str) -> f64 {
        self.core().normalized(field).unwrap_or(0.0).max(0.0)
    }

    /// Downstream cost `(normalized - set_point) * weight`, with a sub-invert
    /// (negative) or missing normalized value replaced by `0.0`.
    fn downstream_cost(&self, field: &str, set_point: f64, weight: f64) -> f64 {
        (self.demand(field) - set_point) * weight
    }

    /// Fraction of the asset's storage in use as seen through `field`.
    ///
    /// `None` when the reading is missing or below the invert, which callers
    /// treat as fully available capacity.
    fn fill_fraction(&self, field: &str) -> Option<f64> {
        self.core().normalized(field).filter(|v| *v >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemoryTelemetry;
    use chrono::TimeZone;

    struct Plain(AssetCore);

    impl MeasuredAsset for Plain {
        fn core(&self) -> &AssetCore {
            &self.0
        }
        fn core_mut(&mut self) -> &mut AssetCore {
            &mut self.0
        }
        fn kind(&self) -> AssetKind {
            AssetKind::PumpStation
        }

        fn cost_field(&self) -> &str {
            "WET_WELL_1"
        }
    }

    fn plain() -> Plain {
        Plain(AssetCore::new(
            "FRE",
            "FREUD",
            &["STATION_FLOWRATE".to_string()],
            vec![Normalization::new("WET_WELL_1", 13.0, 75.4)],
        ))
    }

    #[test]
    fn normalization_field_is_declared_implicitly() {
        let a = plain();
        assert!(a.core().field("WET_WELL_1").is_some());
        assert!(a.core().field("STATION_FLOWRATE").is_some());
    }

    #[test]
    fn refresh_then_normalize() {
        let t = Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap();
        let mut store = MemoryTelemetry::new();
        store.insert("FRE", "FREUD", "WET_WELL_1", t, 50.7);
        store.insert("FRE", "FREUD", "STATION_FLOWRATE", t, 120.0);

        let mut a = plain();
        let missing = a.refresh(&store);
        assert!(missing.is_empty());
        a.normalize();

        let n = a.core().normalized("WET_WELL_1").unwrap_or_default();
        assert!((n - 0.5).abs() < 1e-9);
        assert_eq!(a.core().normalized("STATION_FLOWRATE"), None);
        assert_eq!(a.core().timestamp("WET_WELL_1"), Some(t));
    }

    #[test]
    fn missing_field_is_reported_and_left_empty() {
        let t = Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap();
        let mut store = MemoryTelemetry::new();
        store.insert("FRE", "FREUD", "STATION_FLOWRATE", t, 120.0);

        let mut a = plain();
        let missing = a.refresh(&store);
        assert_eq!(missing.len(), 1);
        assert!(matches!(&missing[0], ControlError::MissingData { field, .. } if field == "WET_WELL_1"));
        a.normalize();
        assert_eq!(a.core().raw("WET_WELL_1"), None);
        assert_eq!(a.demand("WET_WELL_1"), 0.0);
    }

    #[test]
    fn sub_invert_reading_costs_as_zero() {
        let t = Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap();
        let mut store = MemoryTelemetry::new();
        store.insert("FRE", "FREUD", "WET_WELL_1", t, 5.0);
        store.insert("FRE", "FREUD", "STATION_FLOWRATE", t, 0.0);

        let mut a = plain();
        a.refresh(&store);
        a.normalize();
        assert!(a.core().normalized("WET_WELL_1").unwrap_or_default() < 0.0);
        assert_eq!(a.demand("WET_WELL_1"), 0.0);
        let cost = a.downstream_cost("WET_WELL_1", 0.5, 2.0);
        assert!((cost + 1.0).abs() < 1e-12);
        assert_eq!(a.fill_fraction("WET_WELL_1"), None);
    }
}
