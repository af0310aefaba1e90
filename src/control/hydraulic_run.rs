//! Market-based control of gates and pumps inside a stepped hydraulic run.
//!
//! Each control step every continuous group clears with its control points as
//! bidders and its downstream point as seller; goals go through the solver and,
//! in controlled runs, back into the model as target settings.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::actuation::{Regime, Solver};
use crate::config::{ConfigError, HydraulicsConfig};
use crate::error::ControlError;
use crate::hydraulics::{ControlPoint, DownstreamPoint, HydraulicProvider, HydraulicSnapshot};
use crate::market::allocator::volume_headroom;
use crate::market::{clearing_price, purchasing_power};

/// Control points competing for one downstream element.
#[derive(Debug, Clone)]
pub struct ContinuousGroup {
    pub id: u32,
    pub points: Vec<ControlPoint>,
    pub downstream: DownstreamPoint,
}

/// Solved state of one control point after a control step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointAction {
    pub name: String,
    pub group: u32,
    pub goal_flow: f64,
    pub action: f64,
    pub flooding: bool,
    pub regime: Regime,
}

/// Everything one routing step produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub elapsed_s: f64,
    /// Empty on routing steps between control decisions.
    pub actions: Vec<PointAction>,
    pub issues: Vec<ControlError>,
}

/// Stepped continuous-control run over a [`HydraulicProvider`].
#[derive(Debug, Clone)]
pub struct HydraulicRun {
    solver: Solver,
    control_step_s: f64,
    control: bool,
    groups: Vec<ContinuousGroup>,
    next_control_s: f64,
    steps: usize,
    control_steps: usize,
}

impl HydraulicRun {
    /// Resolves every point against the model tables and pairs it with its group.
    ///
    /// # Errors
    ///
    /// Returns every configuration violation found.
    pub fn from_config(cfg: &HydraulicsConfig) -> Result<Self, Vec<ConfigError>> {
        let mut errors = cfg.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut downstream: BTreeMap<u32, DownstreamPoint> = BTreeMap::new();
        for (i, d) in cfg.downstream_points.iter().enumerate() {
            match DownstreamPoint::resolve(d, &cfg.tables) {
                Ok(p) => {
                    downstream.insert(p.group, p);
                }
                Err(e) => errors.push(ConfigError {
                    field: format!("hydraulics.downstream_points[{i}]"),
                    message: e.to_string(),
                }),
            }
        }
        let mut points: BTreeMap<u32, Vec<ControlPoint>> = BTreeMap::new();
        for (i, c) in cfg.control_points.iter().enumerate() {
            match ControlPoint::resolve(c, &cfg.tables) {
                Ok(p) => points.entry(p.group).or_default().push(p),
                Err(e) => errors.push(ConfigError {
                    field: format!("hydraulics.control_points[{i}]"),
                    message: e.to_string(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let groups = downstream
            .into_iter()
            .map(|(id, downstream)| ContinuousGroup {
                id,
                points: points.remove(&id).unwrap_or_default(),
                downstream,
            })
            .collect();

        Ok(Self {
            solver: Solver::new(cfg.units, cfg.datum_offset),
            control_step_s: cfg.control_step_s,
            control: cfg.control,
            groups,
            next_control_s: 0.0,
            steps: 0,
            control_steps: 0,
        })
    }

    pub fn groups(&self) -> &[ContinuousGroup] {
        &self.groups
    }

    pub fn control_point(&self, name: &str) -> Option<&ControlPoint> {
        self.groups.iter().flat_map(|g| &g.points).find(|p| p.name == name)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn control_steps(&self) -> usize {
        self.control_steps
    }

    /// Flood overrides applied so far, over all control points.
    pub fn flood_count(&self) -> u64 {
        self.groups
            .iter()
            .flat_map(|g| &g.points)
            .map(|p| p.flood_count)
            .sum()
    }

    /// Advances the provider one routing step and controls when due.
    ///
    /// Returns `None` once the provider is exhausted.
    pub fn step(&mut self, provider: &mut dyn HydraulicProvider) -> Option<StepReport> {
        if !provider.advance() {
            return None;
        }
        let step = self.steps;
        self.steps += 1;
        let elapsed_s = provider.elapsed_s();
        let mut report = StepReport {
            step,
            elapsed_s,
            actions: Vec::new(),
            issues: Vec::new(),
        };
        if elapsed_s + 1e-9 < self.next_control_s {
            return Some(report);
        }
        self.next_control_s = elapsed_s + self.control_step_s;
        self.control_steps += 1;

        let snapshot = provider.snapshot().clone();
        for group in &mut self.groups {
            if let Err(e) = control_group(
                &self.solver,
                self.control_step_s,
                group,
                &snapshot,
                &mut report,
            ) {
                warn!(group = group.id, "group not controlled this step: {e}");
                report.issues.push(e);
            }
        }
        if self.control {
            for a in &report.actions {
                provider.set_target_setting(&a.name, a.action);
            }
        }
        debug!(step, elapsed_s, actions = report.actions.len(), "control step");
        Some(report)
    }

    /// Steps until the provider is exhausted and returns the flood count.
    pub fn run(&mut self, provider: &mut dyn HydraulicProvider) -> u64 {
        while self.step(provider).is_some() {}
        let floods = self.flood_count();
        info!(
            steps = self.steps,
            control_steps = self.control_steps,
            floods,
            controlled = self.control,
            "hydraulic run finished"
        );
        floods
    }

    /// One-line run summary: flood count, output name, then each group's
    /// upstream and downstream parameters.
    ///
    /// With `derivative` the downstream ds-weights, gamma and set-point
    /// derivative are included too.
    pub fn metadata_line(&self, out_name: &str, derivative: bool) -> String {
        let mut items = vec![self.flood_count().to_string(), out_name.to_string()];
        for g in &self.groups {
            items.push(format!("Group{}", g.id));
            items.push("UP".into());
            for p in &g.points {
                items.push(p.name.clone());
                items.push(p.u_param.to_string());
                if derivative {
                    items.push(p.ds_param.to_string());
                }
            }
            let d = &g.downstream;
            items.push("DOWN".into());
            items.push(d.name.clone());
            items.push(d.epsilon.to_string());
            items.push(d.set_point.to_string());
            if derivative {
                items.push(d.gamma.to_string());
                items.push(d.set_derivative.to_string());
            }
        }
        items.join(",")
    }
}

fn control_group(
    solver: &Solver,
    control_step_s: f64,
    group: &mut ContinuousGroup,
    snapshot: &HydraulicSnapshot,
    report: &mut StepReport,
) -> Result<(), ControlError> {
    let ds = &group.downstream;
    let cost = ds.cost(snapshot)?;
    let fill = ds.fill(snapshot)?;
    let flow_available = volume_headroom(Some(fill), ds.max_volume) / control_step_s;

    let mut wealth = Vec::with_capacity(group.points.len());
    for p in &group.points {
        let demand = match p.normalized_depth(snapshot) {
            Ok(d) => d.max(0.0),
            Err(e) => {
                report.issues.push(e);
                0.0
            }
        };
        wealth.push(demand * p.u_param);
    }
    let price = clearing_price(&wealth, cost);
    let power = purchasing_power(&wealth, price);
    debug!(group = group.id, price, cost, flow_available, "continuous group cleared");

    for (p, power) in group.points.iter_mut().zip(power) {
        let goal = flow_available * power;
        match solver.solve(p, goal, snapshot) {
            Ok(outcome) => {
                if let Some(issue) = outcome.issue {
                    report.issues.push(issue);
                }
                report.actions.push(PointAction {
                    name: p.name.clone(),
                    group: group.id,
                    goal_flow: goal,
                    action: outcome.action,
                    flooding: outcome.flooding,
                    regime: outcome.regime,
                });
            }
            Err(e) => report.issues.push(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydraulics::model::{LinkState, NodeState};
    use crate::hydraulics::points::{ActuatorKind, ControlPointConfig, DownstreamPointConfig, ElementKind};
    use crate::hydraulics::tables::{
        CurveFamily, Junction, ModelTables, Orifice, PumpCurve, Shape, Storage, StorageCurve,
        XSection,
    };
    use crate::hydraulics::{ReplayProvider, UnitSystem};

    fn tables() -> ModelTables {
        let mut t = ModelTables::default();
        t.junctions.insert("J1".into(), Junction { max_depth: 10.0 });
        t.storages.insert(
            "ST1".into(),
            Storage {
                max_depth: 10.0,
                curve: StorageCurve::Functional { a: 0.0, b: 0.0, c: 1000.0 },
            },
        );
        t.storages.insert(
            "OUT".into(),
            Storage {
                max_depth: 20.0,
                curve: StorageCurve::Functional { a: 0.0, b: 0.0, c: 5000.0 },
            },
        );
        t.orifices.insert(
            "OR1".into(),
            Orifice {
                xsection: XSection {
                    shape: Shape::RectClosed,
                    geom1: 2.0,
                    geom2: 2.0,
                    geom3: 0.0,
                    geom4: 0.0,
                    barrels: 1,
                },
                offset: 0.0,
                cd: 0.65,
            },
        );
        t.pumps.insert(
            "P1".into(),
            PumpCurve {
                family: CurveFamily::DepthLookup,
                points: vec![[0.0, 0.0], [2.0, 10.0], [4.0, 20.0]],
            },
        );
        t
    }

    fn config(control: bool) -> HydraulicsConfig {
        HydraulicsConfig {
            units: UnitSystem::Us,
            datum_offset: 0.0,
            control_step_s: 60.0,
            control,
            tables: tables(),
            control_points: vec![
                ControlPointConfig {
                    name: "OR1".into(),
                    kind: ActuatorKind::Orifice,
                    initial_action: 1.0,
                    upstream: "ST1".into(),
                    upstream_kind: ElementKind::Storage,
                    u_param: 1.0,
                    ds_param: 0.5,
                    flood_elevation: 100.0,
                    location: "NORTH".into(),
                    group: 1,
                },
                ControlPointConfig {
                    name: "P1".into(),
                    kind: ActuatorKind::Pump,
                    initial_action: 0.0,
                    upstream: "J1".into(),
                    upstream_kind: ElementKind::Junction,
                    u_param: 0.2,
                    ds_param: 0.0,
                    flood_elevation: 100.0,
                    location: "SOUTH".into(),
                    group: 1,
                },
            ],
            downstream_points: vec![DownstreamPointConfig {
                name: "OUT".into(),
                kind: ElementKind::Storage,
                epsilon: 0.5,
                gamma: 0.0,
                max_depth: 20.0,
                set_point: 0.3,
                set_derivative: 0.0,
                location: "PLANT".into(),
                group: 1,
            }],
        }
    }

    fn frame(st1_depth: f64, j1_depth: f64) -> HydraulicSnapshot {
        let mut s = HydraulicSnapshot::default();
        let node = |depth, invert| NodeState {
            depth,
            invert_elevation: invert,
        };
        s.nodes.insert("ST1".into(), node(st1_depth, 10.0));
        s.nodes.insert("J1".into(), node(j1_depth, 10.0));
        s.nodes.insert("OUT".into(), node(2.0, 0.0));
        s.links.insert(
            "OR1".into(),
            LinkState {
                inlet_node: "ST1".into(),
                outlet_node: "OUT".into(),
                current_setting: 1.0,
                depth: 0.0,
                flow: 0.0,
            },
        );
        s.links.insert(
            "P1".into(),
            LinkState {
                inlet_node: "J1".into(),
                outlet_node: "OUT".into(),
                current_setting: 0.0,
                depth: 0.0,
                flow: 0.0,
            },
        );
        s
    }

    #[test]
    fn control_steps_follow_interval() {
        let mut run = HydraulicRun::from_config(&config(true)).unwrap();
        let frames = (0..4).map(|_| frame(6.0, 3.0)).collect();
        let mut provider = ReplayProvider::new(frames, 30.0);
        while run.step(&mut provider).is_some() {}
        assert_eq!(run.steps(), 4);
        // elapsed 30, 60, 90, 120; control at 30 and 90
        assert_eq!(run.control_steps(), 2);
        assert_eq!(provider.applied().len(), 4);
    }

    #[test]
    fn uncontrolled_run_applies_nothing() {
        let mut run = HydraulicRun::from_config(&config(false)).unwrap();
        let mut provider = ReplayProvider::new(vec![frame(6.0, 3.0)], 60.0);
        let report = run.step(&mut provider).unwrap();
        assert_eq!(report.actions.len(), 2);
        assert!(provider.applied().is_empty());
    }

    #[test]
    fn higher_bidder_gets_flow() {
        let mut run = HydraulicRun::from_config(&config(true)).unwrap();
        let mut provider = ReplayProvider::new(vec![frame(6.0, 3.0)], 60.0);
        let report = run.step(&mut provider).unwrap();
        // wealth: OR1 0.6, P1 0.06; cost (0.1 - 0.3) * 0.5 = -0.1
        // price (0.66 - 0.1) / 3 = 0.18667
        let or1 = report.actions.iter().find(|a| a.name == "OR1").unwrap();
        let p1 = report.actions.iter().find(|a| a.name == "P1").unwrap();
        assert!(or1.goal_flow > 0.0);
        assert_eq!(p1.goal_flow, 0.0);
        assert_eq!(p1.action, 0.0);
        assert!((0.0..=1.0).contains(&or1.action));
    }

    #[test]
    fn flood_override_counts_per_step() {
        let mut cfg = config(true);
        cfg.control_points[1].flood_elevation = 12.0;
        let mut run = HydraulicRun::from_config(&cfg).unwrap();
        let frames = (0..3).map(|_| frame(6.0, 3.0)).collect();
        let mut provider = ReplayProvider::new(frames, 60.0);
        assert_eq!(run.run(&mut provider), 3);
        let p1 = run.control_point("P1").unwrap();
        assert_eq!(p1.action, 1.0);
        assert!(p1.flooding);
        assert_eq!(p1.flood_count, 3);
    }

    #[test]
    fn missing_downstream_isolated() {
        let mut run = HydraulicRun::from_config(&config(true)).unwrap();
        let mut f = frame(6.0, 3.0);
        f.nodes.remove("OUT");
        let mut provider = ReplayProvider::new(vec![f], 60.0);
        let report = run.step(&mut provider).unwrap();
        assert!(report.actions.is_empty());
        assert!(matches!(report.issues[0], ControlError::UnknownElement { .. }));
    }

    #[test]
    fn metadata() {
        let run = HydraulicRun::from_config(&config(true)).unwrap();
        assert_eq!(
            run.metadata_line("run1.out", false),
            "0,run1.out,Group1,UP,OR1,1,P1,0.2,DOWN,OUT,0.5,0.3"
        );
        assert_eq!(
            run.metadata_line("run1.out", true),
            "0,run1.out,Group1,UP,OR1,1,0.5,P1,0.2,0,DOWN,OUT,0.5,0.3,0,0"
        );
    }

    #[test]
    fn unresolved_point_is_config_error() {
        let mut cfg = config(true);
        cfg.control_points[0].name = "OR9".into();
        let errors = HydraulicRun::from_config(&cfg).unwrap_err();
        assert!(errors[0].field.starts_with("hydraulics.control_points[0]"));
    }

    #[test]
    fn downstream_without_participants_is_config_error() {
        let mut cfg = config(true);
        let mut orphan = cfg.downstream_points[0].clone();
        orphan.group = 7;
        cfg.downstream_points.push(orphan);
        let errors = HydraulicRun::from_config(&cfg).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "hydraulics.control_points");
        assert!(errors[0].message.contains("group 7"));
    }
}
