//! TOML-based network configuration and preset definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::actuation::MIN_RUN_SECONDS;
use crate::assets::{AssetRegistry, CsoBasin, Normalization, Pump, PumpStation, SewerMeter};
use crate::error::ControlError;
use crate::hydraulics::{
    ControlPoint, ControlPointConfig, DownstreamPoint, DownstreamPointConfig, ModelTables,
    UnitSystem,
};
use crate::market::{CapacitySpec, CostTerm, Group, Participant, VolumeRule};

/// Telemetry snapshot shipped with the `demo` preset.
pub const DEMO_TELEMETRY_CSV: &str = include_str!("../scenarios/demo_telemetry.csv");

/// Top-level network configuration parsed from TOML.
///
/// Load from TOML with [`NetworkConfig::from_toml_file`] or use
/// [`NetworkConfig::demo`] for the built-in east-side network.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Control interval and run-time threshold.
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub pump_stations: Vec<PumpStationConfig>,
    #[serde(default)]
    pub cso_basins: Vec<CsoBasinConfig>,
    #[serde(default)]
    pub sewer_meters: Vec<SewerMeterConfig>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    /// Continuous control inside a stepped hydraulic simulation.
    #[serde(default)]
    pub hydraulics: Option<HydraulicsConfig>,
}

/// Control-cycle timing and dry-run parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Length of one control interval in seconds (must be > 0).
    pub interval_s: f64,
    /// Minimum pump run time recommended as "on" (s).
    pub min_run_s: f64,
    /// Seed for telemetry noise on dry runs.
    pub seed: u64,
    /// Standard deviation of the noise added to level readings (0 disables).
    pub noise_std: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            interval_s: 600.0,
            min_run_s: MIN_RUN_SECONDS,
            seed: 42,
            noise_std: 0.0,
        }
    }
}

/// One pump in priority order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PumpConfig {
    pub name: String,
    /// Rated flow (volume/s, must be > 0).
    pub flow_rate: f64,
    /// Group whose goal the pump works off.
    pub group: u32,
}

/// Pump station parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PumpStationConfig {
    pub name: String,
    /// Telemetry measure the station reports under.
    pub measure: String,
    /// Extra raw fields to refresh (flow rates, gate statuses).
    #[serde(default)]
    pub fields: Vec<String>,
    /// Wet-well invert elevations, one per wet well.
    pub invert: Vec<f64>,
    /// Wet-well full depths, one per wet well.
    pub depth_max: Vec<f64>,
    #[serde(default = "default_wet_wells")]
    pub wet_wells: usize,
    /// Gate status fields are `<gate_prefix>1..=<gate_count>`.
    #[serde(default)]
    pub gate_prefix: Option<String>,
    #[serde(default)]
    pub gate_count: usize,
    /// Pumps in priority order.
    #[serde(default)]
    pub pumps: Vec<PumpConfig>,
}

fn default_wet_wells() -> usize {
    1
}

/// One independently normalized basin chamber.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChamberConfig {
    pub field: String,
    pub invert: f64,
    pub max_depth: f64,
}

/// CSO basin parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsoBasinConfig {
    pub name: String,
    #[serde(default = "default_basin_measure")]
    pub measure: String,
    #[serde(default)]
    pub fields: Vec<String>,
    pub chambers: Vec<ChamberConfig>,
    #[serde(default = "default_cost_field")]
    pub cost_field: String,
}

fn default_basin_measure() -> String {
    "CSO_BASIN".into()
}

fn default_cost_field() -> String {
    "BASIN_LEVEL".into()
}

/// Sewer meter parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SewerMeterConfig {
    pub name: String,
    #[serde(default = "default_meter_measure")]
    pub measure: String,
    #[serde(default)]
    pub fields: Vec<String>,
    pub diameter: f64,
    pub length: f64,
    #[serde(default = "default_level_field")]
    pub level_field: String,
}

fn default_meter_measure() -> String {
    "SEWER_METER".into()
}

fn default_level_field() -> String {
    "LEVEL".into()
}

/// Group membership, downstream cost term, and capacity source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub id: u32,
    pub participants: Vec<Participant>,
    pub downstream: CostTerm,
    pub capacity: CapacitySpec,
}

/// Continuous-control context for a stepped hydraulic run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HydraulicsConfig {
    #[serde(default)]
    pub units: UnitSystem,
    /// Added to model elevations before flood checks.
    #[serde(default)]
    pub datum_offset: f64,
    /// Seconds between control decisions (must be > 0).
    pub control_step_s: f64,
    /// `false` runs an uncontrolled baseline: goals are computed, never applied.
    #[serde(default = "default_true")]
    pub control: bool,
    #[serde(default)]
    pub tables: ModelTables,
    #[serde(default)]
    pub control_points: Vec<ControlPointConfig>,
    #[serde(default)]
    pub downstream_points: Vec<DownstreamPointConfig>,
}

fn default_true() -> bool {
    true
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"groups[0].participants"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn err(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError {
        field: field.into(),
        message: message.into(),
    }
}

fn participant(asset: &str, field: &str, location: &str, weight: f64) -> Participant {
    Participant {
        asset: asset.into(),
        field: field.into(),
        location: location.into(),
        weight,
    }
}

fn pumps(prefix: &str, count: usize, flow_rate: f64, group: u32) -> Vec<PumpConfig> {
    (1..=count)
        .map(|i| PumpConfig {
            name: format!("{prefix}{i}"),
            flow_rate,
            group,
        })
        .collect()
}

impl NetworkConfig {
    /// Returns the east-side demo network: Conner, Freud and Fairview pump
    /// stations, the Conner Creek CSO basin, and the Jeffersonian sewer meter,
    /// competing in three groups.
    pub fn demo() -> Self {
        let mut con_pumps = pumps("ST", 2, 100.0, 1);
        con_pumps.extend(pumps("SN", 2, 5.0, 2));

        Self {
            control: ControlConfig::default(),
            pump_stations: vec![
                PumpStationConfig {
                    name: "CON".into(),
                    measure: "CONNER".into(),
                    fields: vec!["STATION_FLOWRATE".into()],
                    invert: vec![44.5, 55.0],
                    depth_max: vec![50.0, 40.0],
                    wet_wells: 2,
                    gate_prefix: None,
                    gate_count: 0,
                    pumps: con_pumps,
                },
                PumpStationConfig {
                    name: "FRE".into(),
                    measure: "FREUD".into(),
                    fields: vec!["STATION_FLOWRATE".into()],
                    invert: vec![13.0],
                    depth_max: vec![75.4],
                    wet_wells: 1,
                    gate_prefix: None,
                    gate_count: 0,
                    pumps: pumps("ST", 2, 60.0, 1),
                },
                PumpStationConfig {
                    name: "FVW".into(),
                    measure: "FAIRVIEW".into(),
                    fields: vec!["STATION_FLOWRATE".into()],
                    invert: vec![0.0],
                    depth_max: vec![37.0],
                    wet_wells: 1,
                    gate_prefix: Some("SWR_GATE_".into()),
                    gate_count: 2,
                    pumps: pumps("SN", 3, 30.0, 3),
                },
            ],
            cso_basins: vec![CsoBasinConfig {
                name: "CONNERS_CREEK".into(),
                measure: "CSO_BASIN".into(),
                fields: vec![],
                chambers: vec![
                    ChamberConfig {
                        field: "FOREBAY_LEVEL".into(),
                        invert: 76.3,
                        max_depth: 17.5,
                    },
                    ChamberConfig {
                        field: "BASIN_LEVEL".into(),
                        invert: 78.0,
                        max_depth: 22.0,
                    },
                ],
                cost_field: "BASIN_LEVEL".into(),
            }],
            sewer_meters: vec![SewerMeterConfig {
                name: "DT_S_8_DRI@JEFFERSONIAN_APT".into(),
                measure: "SEWER_METER".into(),
                fields: vec!["FLOW".into()],
                diameter: 11.0,
                length: 1796.0,
                level_field: "LEVEL".into(),
            }],
            groups: vec![
                GroupConfig {
                    id: 1,
                    participants: vec![
                        participant("CON", "WET_WELL_2", "ST", 0.097),
                        participant("FRE", "WET_WELL_1", "ST", 0.029),
                        participant("CONNERS_CREEK", "BASIN_LEVEL", "FORE_1", 0.684),
                    ],
                    downstream: CostTerm {
                        asset: "CONNERS_CREEK".into(),
                        field: None,
                        set_point: 0.062,
                        weight: 0.588,
                    },
                    capacity: CapacitySpec {
                        asset: "CONNERS_CREEK".into(),
                        field: "BASIN_LEVEL".into(),
                        max_volume: 22.0 * 192_041.8,
                        outflow_field: None,
                        volume: VolumeRule::Headroom,
                    },
                },
                GroupConfig {
                    id: 2,
                    participants: vec![
                        participant("CONNERS_CREEK", "BASIN_LEVEL", "BASIN", 0.419),
                        participant("CONNERS_CREEK", "FOREBAY_LEVEL", "FORE_2", 1.0),
                        participant("CON", "WET_WELL_1", "SN", 0.651),
                    ],
                    downstream: CostTerm {
                        asset: "FVW".into(),
                        field: Some("WET_WELL_1".into()),
                        set_point: 0.802,
                        weight: 0.721,
                    },
                    capacity: CapacitySpec {
                        asset: "FVW".into(),
                        field: "WET_WELL_1".into(),
                        max_volume: 37.0 * 1000.0,
                        outflow_field: Some("STATION_FLOWRATE".into()),
                        volume: VolumeRule::Headroom,
                    },
                },
                GroupConfig {
                    id: 3,
                    participants: vec![participant("FVW", "WET_WELL_1", "SN", 0.459)],
                    downstream: CostTerm {
                        asset: "DT_S_8_DRI@JEFFERSONIAN_APT".into(),
                        field: Some("LEVEL".into()),
                        set_point: 0.921,
                        weight: 0.373,
                    },
                    capacity: CapacitySpec {
                        asset: "DT_S_8_DRI@JEFFERSONIAN_APT".into(),
                        field: "LEVEL".into(),
                        max_volume: PI * 5.5 * 5.5 * 1796.0,
                        outflow_field: Some("FLOW".into()),
                        volume: VolumeRule::FlowTimesInterval,
                    },
                },
            ],
            hydraulics: None,
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo"];

    /// Loads a network from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "demo" => Ok(Self::demo()),
            _ => Err(err(
                "preset",
                format!("unknown preset \"{name}\", available: {}", Self::PRESETS.join(", ")),
            )),
        }
    }

    /// Telemetry snapshot bundled with a preset, if any.
    pub fn preset_telemetry(name: &str) -> Option<&'static str> {
        match name {
            "demo" => Some(DEMO_TELEMETRY_CSV),
            _ => None,
        }
    }

    /// Parses a network from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| err("config", format!("cannot read \"{}\": {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses a network from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| err("toml", e.to_string()))
    }

    /// Validates all sections and returns every violation found.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.control.interval_s <= 0.0 {
            errors.push(err("control.interval_s", "must be > 0"));
        }
        if self.control.min_run_s < 0.0 {
            errors.push(err("control.min_run_s", "must be >= 0"));
        }
        if self.control.noise_std < 0.0 {
            errors.push(err("control.noise_std", "must be >= 0"));
        }

        let mut names = BTreeSet::new();
        let mut declare = |name: &str, path: String, errors: &mut Vec<ConfigError>| {
            if !names.insert(name.to_string()) {
                errors.push(err(path, format!("duplicate asset name \"{name}\"")));
            }
        };

        for (i, s) in self.pump_stations.iter().enumerate() {
            let p = format!("pump_stations[{i}]");
            declare(&s.name, format!("{p}.name"), &mut errors);
            if s.wet_wells == 0 {
                errors.push(err(format!("{p}.wet_wells"), "must be >= 1"));
            }
            if s.invert.len() < s.wet_wells {
                errors.push(err(format!("{p}.invert"), "needs one entry per wet well"));
            }
            if s.depth_max.len() < s.wet_wells {
                errors.push(err(format!("{p}.depth_max"), "needs one entry per wet well"));
            }
            if s.depth_max.iter().any(|d| *d <= 0.0) {
                errors.push(err(format!("{p}.depth_max"), "must be > 0"));
            }
            for (j, pump) in s.pumps.iter().enumerate() {
                if pump.flow_rate <= 0.0 {
                    errors.push(err(format!("{p}.pumps[{j}].flow_rate"), "must be > 0"));
                }
                let serves = self.groups.iter().any(|g| {
                    g.id == pump.group && g.participants.iter().any(|q| q.asset == s.name)
                });
                if !serves {
                    errors.push(err(
                        format!("{p}.pumps[{j}].group"),
                        format!("station \"{}\" is not a participant of group {}", s.name, pump.group),
                    ));
                }
            }
        }

        for (i, b) in self.cso_basins.iter().enumerate() {
            let p = format!("cso_basins[{i}]");
            declare(&b.name, format!("{p}.name"), &mut errors);
            if b.chambers.is_empty() {
                errors.push(err(format!("{p}.chambers"), "must not be empty"));
            }
            for (j, c) in b.chambers.iter().enumerate() {
                if c.max_depth <= 0.0 {
                    errors.push(err(format!("{p}.chambers[{j}].max_depth"), "must be > 0"));
                }
            }
        }

        for (i, m) in self.sewer_meters.iter().enumerate() {
            let p = format!("sewer_meters[{i}]");
            declare(&m.name, format!("{p}.name"), &mut errors);
            if m.diameter <= 0.0 {
                errors.push(err(format!("{p}.diameter"), "must be > 0"));
            }
            if m.length < 0.0 {
                errors.push(err(format!("{p}.length"), "must be >= 0"));
            }
        }

        let mut ids = BTreeSet::new();
        let mut seats: BTreeMap<(String, String), u32> = BTreeMap::new();
        for (i, g) in self.groups.iter().enumerate() {
            let p = format!("groups[{i}]");
            if !ids.insert(g.id) {
                errors.push(err(format!("{p}.id"), format!("duplicate group id {}", g.id)));
            }
            if g.participants.is_empty() {
                errors.push(err(format!("{p}.participants"), "must not be empty"));
            }
            for (j, q) in g.participants.iter().enumerate() {
                if !names.contains(&q.asset) {
                    errors.push(err(
                        format!("{p}.participants[{j}].asset"),
                        format!("unknown asset \"{}\"", q.asset),
                    ));
                }
                if q.weight < 0.0 {
                    errors.push(err(format!("{p}.participants[{j}].weight"), "must be >= 0"));
                }
                let key = (q.asset.clone(), q.location.clone());
                if let Some(other) = seats.insert(key, g.id) {
                    errors.push(err(
                        format!("{p}.participants[{j}]"),
                        format!("{}/{} already bids in group {other}", q.asset, q.location),
                    ));
                }
            }
            if !names.contains(&g.downstream.asset) {
                errors.push(err(
                    format!("{p}.downstream.asset"),
                    format!("unknown asset \"{}\"", g.downstream.asset),
                ));
            }
            if !names.contains(&g.capacity.asset) {
                errors.push(err(
                    format!("{p}.capacity.asset"),
                    format!("unknown asset \"{}\"", g.capacity.asset),
                ));
            }
            if g.capacity.max_volume <= 0.0 {
                errors.push(err(format!("{p}.capacity.max_volume"), "must be > 0"));
            }
        }

        if let Some(h) = &self.hydraulics {
            errors.extend(h.validate());
        }

        errors
    }

    /// Builds the assets of one control cycle with empty field state.
    ///
    /// Call only on a configuration that passed [`validate`](Self::validate).
    pub fn build_assets(&self) -> AssetRegistry {
        let mut reg = AssetRegistry::new();
        for s in &self.pump_stations {
            let mut fields = s.fields.clone();
            if let Some(prefix) = &s.gate_prefix {
                fields.extend((1..=s.gate_count).map(|i| format!("{prefix}{i}")));
            }
            let pumps = s
                .pumps
                .iter()
                .map(|p| Pump::new(p.name.clone(), p.flow_rate, p.group))
                .collect();
            let station = PumpStation::new(
                s.name.clone(),
                s.measure.clone(),
                &fields,
                &s.invert,
                &s.depth_max,
                s.wet_wells,
                pumps,
            );
            reg.insert(station);
        }
        for b in &self.cso_basins {
            let chambers = b
                .chambers
                .iter()
                .map(|c| Normalization::new(c.field.clone(), c.invert, c.max_depth))
                .collect();
            reg.insert(CsoBasin::new(
                b.name.clone(),
                b.measure.clone(),
                &b.fields,
                chambers,
                b.cost_field.clone(),
            ));
        }
        for m in &self.sewer_meters {
            reg.insert(SewerMeter::new(
                m.name.clone(),
                m.measure.clone(),
                &m.fields,
                m.diameter,
                m.length,
                m.level_field.clone(),
            ));
        }
        reg
    }

    /// Builds the competition groups in configured order.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidGroup`] for a group without participants.
    pub fn build_groups(&self) -> Result<Vec<Group>, ControlError> {
        self.groups
            .iter()
            .map(|g| {
                Group::new(
                    g.id,
                    g.participants.clone(),
                    g.downstream.clone(),
                    g.capacity.clone(),
                )
            })
            .collect()
    }

    /// `(asset, field)` pairs holding level readings: every normalized field
    /// plus each meter's level field.
    pub fn level_fields(&self) -> BTreeSet<(String, String)> {
        let mut out = BTreeSet::new();
        for s in &self.pump_stations {
            for i in 1..=s.wet_wells {
                out.insert((s.name.clone(), format!("WET_WELL_{i}")));
            }
        }
        for b in &self.cso_basins {
            for c in &b.chambers {
                out.insert((b.name.clone(), c.field.clone()));
            }
        }
        for m in &self.sewer_meters {
            out.insert((m.name.clone(), m.level_field.clone()));
        }
        out
    }
}

impl HydraulicsConfig {
    /// Validates timing, points, and group pairing.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.control_step_s <= 0.0 {
            errors.push(err("hydraulics.control_step_s", "must be > 0"));
        }
        for (i, c) in self.control_points.iter().enumerate() {
            if let Err(e) = ControlPoint::resolve(c, &self.tables) {
                errors.push(err(format!("hydraulics.control_points[{i}]"), e.to_string()));
            }
        }
        let mut downstream_groups = BTreeSet::new();
        for (i, d) in self.downstream_points.iter().enumerate() {
            if let Err(e) = DownstreamPoint::resolve(d, &self.tables) {
                errors.push(err(format!("hydraulics.downstream_points[{i}]"), e.to_string()));
            }
            if !downstream_groups.insert(d.group) {
                errors.push(err(
                    format!("hydraulics.downstream_points[{i}].group"),
                    format!("group {} already has a downstream point", d.group),
                ));
            }
        }
        let control_groups: BTreeSet<u32> = self.control_points.iter().map(|c| c.group).collect();
        for g in control_groups.difference(&downstream_groups) {
            errors.push(err(
                "hydraulics.downstream_points",
                format!("group {g} has control points but no downstream point"),
            ));
        }
        for g in downstream_groups.difference(&control_groups) {
            errors.push(err(
                "hydraulics.control_points",
                format!("group {g} has a downstream point but no control points"),
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_preset_valid() {
        let cfg = NetworkConfig::demo();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "demo errors: {errors:?}");
    }

    #[test]
    fn demo_toml_matches_preset() {
        let cfg = NetworkConfig::from_toml_str(include_str!("../scenarios/demo.toml")).unwrap();
        assert_eq!(cfg, NetworkConfig::demo());
    }

    #[test]
    fn from_preset_unknown() {
        let e = NetworkConfig::from_preset("west_side").unwrap_err();
        assert_eq!(e.field, "preset");
        assert!(e.message.contains("demo"));
        assert!(NetworkConfig::preset_telemetry("west_side").is_none());
    }

    #[test]
    fn demo_telemetry_parses() {
        let csv = NetworkConfig::preset_telemetry("demo").unwrap();
        assert!(csv.starts_with("asset,measure,field,timestamp,value"));
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let cfg = NetworkConfig::from_toml_str(
            r#"
            [[sewer_meters]]
            name = "M1"
            diameter = 4.0
            length = 100.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.control.interval_s, 600.0);
        assert_eq!(cfg.control.min_run_s, 180.0);
        assert_eq!(cfg.sewer_meters[0].measure, "SEWER_METER");
        assert_eq!(cfg.sewer_meters[0].level_field, "LEVEL");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn unknown_field_rejected() {
        let e = NetworkConfig::from_toml_str("[control]\ninterval = 300\n").unwrap_err();
        assert_eq!(e.field, "toml");
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut cfg = NetworkConfig::demo();
        cfg.control.interval_s = 0.0;
        cfg.groups[2].participants.clear();
        cfg.groups[1].downstream.asset = "NOWHERE".into();
        cfg.pump_stations[0].pumps[0].flow_rate = 0.0;

        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"control.interval_s".to_string()));
        assert!(fields.contains(&"groups[2].participants".to_string()));
        assert!(fields.contains(&"groups[1].downstream.asset".to_string()));
        assert!(fields.contains(&"pump_stations[0].pumps[0].flow_rate".to_string()));
        // FVW pumps serve group 3, which lost its only participant
        assert!(fields.contains(&"pump_stations[2].pumps[0].group".to_string()));
    }

    #[test]
    fn duplicate_seat_across_groups_rejected() {
        let mut cfg = NetworkConfig::demo();
        let seat = cfg.groups[0].participants[0].clone();
        cfg.groups[1].participants.push(seat);
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "groups[1].participants[3]"));
    }

    #[test]
    fn duplicate_asset_name_rejected() {
        let mut cfg = NetworkConfig::demo();
        cfg.sewer_meters[0].name = "CON".into();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sewer_meters[0].name"));
    }

    #[test]
    fn build_groups_rejects_empty_group() {
        let mut cfg = NetworkConfig::demo();
        cfg.groups[0].participants.clear();
        assert!(matches!(
            cfg.build_groups(),
            Err(ControlError::InvalidGroup { group: 1, .. })
        ));
    }

    #[test]
    fn build_assets_declares_gate_fields() {
        let reg = NetworkConfig::demo().build_assets();
        assert_eq!(reg.len(), 5);
        let fvw = reg.station("FVW").unwrap();
        use crate::assets::MeasuredAsset;
        assert!(fvw.core().field("SWR_GATE_2").is_some());
        assert_eq!(fvw.pumps.len(), 3);
    }

    #[test]
    fn level_fields_cover_normalized_fields() {
        let levels = NetworkConfig::demo().level_fields();
        assert!(levels.contains(&("CON".to_string(), "WET_WELL_2".to_string())));
        assert!(levels.contains(&("CONNERS_CREEK".to_string(), "FOREBAY_LEVEL".to_string())));
        assert!(levels.contains(&("DT_S_8_DRI@JEFFERSONIAN_APT".to_string(), "LEVEL".to_string())));
        assert!(!levels.contains(&("FVW".to_string(), "STATION_FLOWRATE".to_string())));
    }

    #[test]
    fn hydraulics_groups_need_downstream_points() {
        let cfg = NetworkConfig::from_toml_str(
            r#"
            [hydraulics]
            control_step_s = 300.0

            [hydraulics.tables.storages.ST1]
            max_depth = 10.0
            curve = { shape = "FUNCTIONAL", a = 0.0, b = 0.0, c = 100.0 }

            [hydraulics.tables.orifices.OR1]
            cd = 0.65
            xsection = { shape = "RECT_CLOSED", geom1 = 4.0, geom2 = 5.0 }

            [[hydraulics.control_points]]
            name = "OR1"
            kind = "orifice"
            upstream = "ST1"
            upstream_kind = "storage"
            u_param = 1.0
            flood_elevation = 12.0
            location = "GATE"
            group = 1
            "#,
        )
        .unwrap();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("no downstream point"));
    }
}
