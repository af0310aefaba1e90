use std::collections::BTreeMap;

use serde::Serialize;

use crate::assets::types::{AssetCore, AssetKind, MeasuredAsset, Normalization};

/// Run-time recommendation for one pump, valid for the current cycle only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpRecommendation {
    /// Commanded run time over the interval (s), before the minimum-run filter.
    pub seconds: f64,
    /// `true` when the run time reaches the minimum-run threshold.
    pub on: bool,
    /// Run time in whole minutes (two digits) when on, empty otherwise.
    pub display: String,
}

/// A single pump inside a station.
#[derive(Debug, Clone)]
pub struct Pump {
    /// Pump identifier; also the name of its running-status telemetry field.
    pub name: String,
    /// Rated flow rate (volume per second).
    pub flow_rate: f64,
    /// Group whose volume goal this pump works off.
    pub group: u32,
    pub recommendation: Option<PumpRecommendation>,
}

impl Pump {
    /// # Panics
    ///
    /// Panics if `flow_rate` is not positive.
    pub fn new(name: impl Into<String>, flow_rate: f64, group: u32) -> Self {
        assert!(flow_rate > 0.0, "pump flow_rate must be > 0");
        Self {
            name: name.into(),
            flow_rate,
            group,
            recommendation: None,
        }
    }

    /// Two-letter service prefix (`ST` storm, `SN` sanitary).
    pub fn service(&self) -> &str {
        self.name.get(..2).unwrap_or(&self.name)
    }
}

/// A pump station: one or more wet wells drained by an ordered list of pumps.
///
/// Pump order is priority order for the discrete scheduler.
#[derive(Debug, Clone)]
pub struct PumpStation {
    core: AssetCore,
    pub pumps: Vec<Pump>,
    pub wet_wells: usize,
}

impl PumpStation {
    /// Creates a station normalizing `WET_WELL_1..=WET_WELL_n` with the
    /// matching `invert`/`depth_max` pairs.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `wet_wells` invert or depth pairs are given.
    pub fn new(
        name: impl Into<String>,
        measure: impl Into<String>,
        fields: &[String],
        invert: &[f64],
        depth_max: &[f64],
        wet_wells: usize,
        pumps: Vec<Pump>,
    ) -> Self {
        assert!(wet_wells >= 1);
        assert!(invert.len() >= wet_wells && depth_max.len() >= wet_wells);

        let normalizations = (0..wet_wells)
            .map(|i| Normalization::new(format!("WET_WELL_{}", i + 1), invert[i], depth_max[i]))
            .collect();
        let mut all_fields = fields.to_vec();
        for p in &pumps {
            if !all_fields.contains(&p.name) {
                all_fields.push(p.name.clone());
            }
        }

        Self {
            core: AssetCore::new(name, measure, &all_fields, normalizations),
            pumps,
            wet_wells,
        }
    }

    /// Groups served by at least one pump, in first-seen order.
    pub fn groups(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for p in &self.pumps {
            if !out.contains(&p.group) {
                out.push(p.group);
            }
        }
        out
    }

    /// Number of pumps currently reported running, per service prefix.
    pub fn running_by_service(&self) -> BTreeMap<String, u32> {
        let mut running = BTreeMap::new();
        for p in &self.pumps {
            let on = self.core.raw(&p.name).is_some_and(|v| v > 0.5);
            *running.entry(p.service().to_string()).or_insert(0) += u32::from(on);
        }
        running
    }

    /// Number of pumps recommended on this cycle, per service prefix.
    pub fn recommended_by_service(&self) -> BTreeMap<String, u32> {
        let mut recommended = BTreeMap::new();
        for p in &self.pumps {
            let on = p.recommendation.as_ref().is_some_and(|r| r.on);
            *recommended.entry(p.service().to_string()).or_insert(0) += u32::from(on);
        }
        recommended
    }

    /// Number of open gates among status fields `{prefix}1..={count}`.
    pub fn gates_open(&self, prefix: &str, count: usize) -> u32 {
        (1..=count)
            .filter(|i| {
                self.core
                    .raw(&format!("{prefix}{i}"))
                    .is_some_and(|v| v > 0.5)
            })
            .count() as u32
    }
}

impl MeasuredAsset for PumpStation {
    fn core(&self) -> &AssetCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AssetCore {
        &mut self.core
    }

    fn kind(&self) -> AssetKind {
        AssetKind::PumpStation
    }

    fn cost_field(&self) -> &str {
        "WET_WELL_1"
    }
}
