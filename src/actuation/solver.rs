//! Continuous opening solver for gates, orifices, and pumps.
//!
//! Every branch ends with the action clamped to `[0, 1]`; the flood check
//! runs last and overrides whatever the hydraulics produced.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ControlError;
use crate::hydraulics::model::{HydraulicSnapshot, NodeState, UnitSystem};
use crate::hydraulics::points::{Actuator, ControlPoint, element_head};
use crate::hydraulics::tables::{CurveFamily, Orifice, PumpCurve};

/// Smallest effective head (model length units) that can drive flow.
pub const MIN_HEAD: f64 = 0.1;

/// Hydraulic regime that produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Effective head below [`MIN_HEAD`] or an unsubmerged crest.
    NoHead,
    /// Downstream head above upstream head; gate held closed.
    ReverseFlow,
    /// Partially submerged inlet, weir equation.
    Weir,
    /// Submerged inlet discharging above the downstream level.
    FreeOrifice,
    /// Submerged inlet and outlet.
    SubmergedOrifice,
    Pump,
    /// No equation for the configured geometry or curve.
    Unsupported,
}

/// Result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub action: f64,
    pub flooding: bool,
    pub regime: Regime,
    /// Configuration gap that forced the action to zero, if any.
    pub issue: Option<ControlError>,
}

/// Converts flow goals into opening fractions.
#[derive(Debug, Clone, Copy)]
pub struct Solver {
    pub gravity: f64,
    /// Added to water-surface elevations before comparing with flood elevations.
    pub datum_offset: f64,
}

impl Solver {
    pub fn new(units: UnitSystem, datum_offset: f64) -> Self {
        Self {
            gravity: units.gravity(),
            datum_offset,
        }
    }

    /// Computes the action that passes `desired_flow` through `cp` and stores
    /// it on the point, along with the flood flag and counter.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownElement`] if the snapshot lacks the
    /// controlled link, its end nodes, or the upstream reference element.
    pub fn solve(
        &self,
        cp: &mut ControlPoint,
        desired_flow: f64,
        snapshot: &HydraulicSnapshot,
    ) -> Result<SolveOutcome, ControlError> {
        let link = snapshot.link(&cp.name).ok_or_else(|| ControlError::UnknownElement {
            control_point: cp.name.clone(),
            kind: "link",
            element: cp.name.clone(),
        })?;
        let node = |id: &str| {
            snapshot.node(id).ok_or_else(|| ControlError::UnknownElement {
                control_point: cp.name.clone(),
                kind: "node",
                element: id.to_string(),
            })
        };
        let up = node(&link.inlet_node)?;
        let down = node(&link.outlet_node)?;

        let (action, regime, issue) = match &cp.actuator {
            Actuator::Orifice(orifice) => {
                let (action, regime) =
                    orifice_action(orifice, link.current_setting, up, down, desired_flow, self.gravity);
                let flowing = matches!(
                    regime,
                    Regime::Weir | Regime::FreeOrifice | Regime::SubmergedOrifice
                );
                if orifice.xsection.shape.is_rectangular() || !flowing {
                    (action, regime, None)
                } else {
                    let issue = ControlError::UnsupportedGeometry {
                        control_point: cp.name.clone(),
                        shape: orifice.xsection.shape.as_str().to_string(),
                    };
                    (0.0, Regime::Unsupported, Some(issue))
                }
            }
            Actuator::Pump(curve) => match pump_capacity(curve, up, down) {
                Some(capacity) => (pump_action(desired_flow, capacity), Regime::Pump, None),
                None => {
                    let issue = ControlError::UnsupportedPumpCurve {
                        control_point: cp.name.clone(),
                        family: curve.family.as_str().to_string(),
                    };
                    (0.0, Regime::Unsupported, Some(issue))
                }
            },
        };
        if let Some(e) = &issue {
            warn!("{e}; action set to 0");
        }

        let mut action = if action.is_nan() { 0.0 } else { action.clamp(0.0, 1.0) };

        let elevation = element_head(&cp.name, &cp.upstream, cp.upstream_kind, snapshot)?;
        let flooding = elevation + self.datum_offset > cp.flood_elevation;
        if flooding {
            action = 1.0;
            cp.flood_count += 1;
            warn!(
                control_point = %cp.name,
                elevation,
                flood_elevation = cp.flood_elevation,
                "flood override, opening fully"
            );
        }

        debug!(control_point = %cp.name, desired_flow, action, ?regime, "solved");
        cp.goal_flow = desired_flow;
        cp.action = action;
        cp.flooding = flooding;

        Ok(SolveOutcome {
            action,
            flooding,
            regime,
            issue,
        })
    }
}

/// Opening fraction of a gate passing `desired_flow`, before clamping.
///
/// `setting` is the current opening fraction; the inlet submergence against
/// the current crown selects between weir and orifice equations.
pub fn orifice_action(
    orifice: &Orifice,
    setting: f64,
    up: &NodeState,
    down: &NodeState,
    desired_flow: f64,
    gravity: f64,
) -> (f64, Regime) {
    let h1 = up.head();
    let h2 = down.head();
    let current_height = setting * orifice.xsection.geom1;
    let h_mid = current_height / 2.0 + (up.invert_elevation + down.invert_elevation) / 2.0;
    let crest = up.invert_elevation + orifice.offset;

    let f = if h1 < current_height {
        let span = current_height - crest;
        if span == 0.0 { 0.0 } else { (h1 - crest) / span }
    } else {
        1.0
    };

    let (head, regime) = if f < 1.0 {
        (h1 - crest, Regime::Weir)
    } else if h2 < h_mid {
        (h1 - h_mid, Regime::FreeOrifice)
    } else {
        (h1 - h2, Regime::SubmergedOrifice)
    };

    if head < MIN_HEAD || f <= 0.0 {
        return (0.0, Regime::NoHead);
    }
    if h2 > h1 {
        return (0.0, Regime::ReverseFlow);
    }

    let velocity = orifice.cd * (2.0 * gravity * head).sqrt();
    let area = match regime {
        Regime::Weir => desired_flow / (velocity * 2.0 / 3.0),
        _ => desired_flow / velocity,
    };
    let full = orifice.full_area();
    let action = if full > 0.0 { area / full } else { 0.0 };
    (action, regime)
}

/// Full-open flow of a pump at the current state, or `None` for curve
/// families without a capacity rule.
pub fn pump_capacity(curve: &PumpCurve, up: &NodeState, down: &NodeState) -> Option<f64> {
    let mut points = curve.points.clone();
    points.sort_by(|a, b| a[0].total_cmp(&b[0]));

    match curve.family {
        CurveFamily::DepthLookup => {
            let depth = up.depth;
            let flow = points
                .iter()
                .rev()
                .find(|p| p[0] <= depth)
                .or(points.first())
                .map_or(0.0, |p| p[1]);
            Some(flow)
        }
        CurveFamily::HeadInterpolated => {
            let (Some(first), Some(last)) = (points.first(), points.last()) else {
                return Some(0.0);
            };
            let head = (down.head() - up.head()).clamp(first[0], last[0]);
            Some(interpolate(&points, head))
        }
        CurveFamily::VolumeStep | CurveFamily::DepthContinuous => None,
    }
}

/// Pump speed fraction delivering `desired_flow` given its full-open capacity.
pub fn pump_action(desired_flow: f64, capacity: f64) -> f64 {
    if desired_flow == 0.0 || capacity <= 0.0 {
        0.0
    } else {
        desired_flow / capacity
    }
}

/// Piecewise-linear interpolation over points sorted by `x`; `x` must lie in range.
fn interpolate(points: &[[f64; 2]], x: f64) -> f64 {
    for w in points.windows(2) {
        let [x0, y0] = w[0];
        let [x1, y1] = w[1];
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    points.last().map_or(0.0, |p| p[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydraulics::model::LinkState;
    use crate::hydraulics::points::{ActuatorKind, ControlPointConfig, ElementKind};
    use crate::hydraulics::tables::ModelTables;

    const EPS: f64 = 1e-9;

    fn tables() -> ModelTables {
        toml::from_str(
            r#"
            [storages.ST1]
            max_depth = 10.0
            curve = { shape = "FUNCTIONAL", a = 0.0, b = 0.0, c = 100.0 }

            [orifices.OR1]
            cd = 0.65
            xsection = { shape = "RECT_CLOSED", geom1 = 4.0, geom2 = 5.0 }

            [orifices.OR2]
            cd = 0.65
            xsection = { shape = "CIRCULAR", geom1 = 4.0 }

            [pumps.P2]
            family = "PUMP2"
            points = [[2.0, 5.0], [0.0, 1.0], [6.0, 9.0]]

            [pumps.P3]
            family = "PUMP3"
            points = [[0.0, 20.0], [10.0, 10.0], [20.0, 0.0]]

            [pumps.P4]
            family = "PUMP4"
            points = [[0.0, 20.0]]
            "#,
        )
        .unwrap()
    }

    fn snapshot(h_up: f64, h_down: f64, setting: f64) -> HydraulicSnapshot {
        let mut s = HydraulicSnapshot::default();
        s.nodes.insert("ST1".into(), NodeState { depth: h_up, invert_elevation: 0.0 });
        s.nodes.insert("J1".into(), NodeState { depth: h_down, invert_elevation: 0.0 });
        for id in ["OR1", "OR2", "P2", "P3", "P4"] {
            s.links.insert(
                id.into(),
                LinkState {
                    inlet_node: "ST1".into(),
                    outlet_node: "J1".into(),
                    current_setting: setting,
                    depth: 0.0,
                    flow: 0.0,
                },
            );
        }
        s
    }

    fn point(name: &str, kind: ActuatorKind, flood_elevation: f64) -> ControlPoint {
        let cfg = ControlPointConfig {
            name: name.into(),
            kind,
            initial_action: 0.0,
            upstream: "ST1".into(),
            upstream_kind: ElementKind::Storage,
            u_param: 1.0,
            ds_param: 0.0,
            flood_elevation,
            location: name.into(),
            group: 1,
        };
        ControlPoint::resolve(&cfg, &tables()).unwrap()
    }

    fn solver() -> Solver {
        Solver::new(UnitSystem::Us, 0.0)
    }

    #[test]
    fn submerged_orifice_equation() {
        // crown at 2.0, h1 = 8 >= crown -> f = 1; h2 = 3 >= h_mid (1.0) -> H = 5
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 10.0, &snapshot(8.0, 3.0, 0.5)).unwrap();
        let expected = 10.0 / (0.65 * (2.0 * 32.2 * 5.0_f64).sqrt()) / 20.0;
        assert_eq!(out.regime, Regime::SubmergedOrifice);
        assert!((out.action - expected).abs() < EPS);
        assert_eq!(cp.action, out.action);
        assert!(!out.flooding);
    }

    #[test]
    fn free_orifice_uses_midpoint_head() {
        // crown 2.0, h_mid 1.0, h2 = 0.5 < h_mid -> H = 8 - 1
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 10.0, &snapshot(8.0, 0.5, 0.5)).unwrap();
        let expected = 10.0 / (0.65 * (2.0 * 32.2 * 7.0_f64).sqrt()) / 20.0;
        assert_eq!(out.regime, Regime::FreeOrifice);
        assert!((out.action - expected).abs() < EPS);
    }

    #[test]
    fn weir_equation_below_crown() {
        // fully open crown at 4.0; h1 = 3 -> f = 0.75, H = 3
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 10.0, &snapshot(3.0, 0.0, 1.0)).unwrap();
        let expected = 10.0 / (0.65 * (2.0 * 32.2 * 3.0_f64).sqrt() * 2.0 / 3.0) / 20.0;
        assert_eq!(out.regime, Regime::Weir);
        assert!((out.action - expected).abs() < EPS);
    }

    #[test]
    fn reverse_flow_closes_gate() {
        // weir regime with usable head (H = 3) but tailwater above headwater
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 10.0, &snapshot(3.0, 5.0, 1.0)).unwrap();
        assert_eq!(out.regime, Regime::ReverseFlow);
        assert_eq!(out.action, 0.0);

        let out = solver().solve(&mut cp, 10.0, &snapshot(5.0, 6.0, 0.5)).unwrap();
        assert_eq!(out.action, 0.0);
    }

    #[test]
    fn tiny_head_closes_gate() {
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 10.0, &snapshot(0.05, 0.0, 1.0)).unwrap();
        assert_eq!(out.regime, Regime::NoHead);
        assert_eq!(out.action, 0.0);
    }

    #[test]
    fn large_goal_is_clamped() {
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 1e6, &snapshot(8.0, 3.0, 0.5)).unwrap();
        assert_eq!(out.action, 1.0);
        let out = solver().solve(&mut cp, -5.0, &snapshot(8.0, 3.0, 0.5)).unwrap();
        assert_eq!(out.action, 0.0);
    }

    #[test]
    fn circular_orifice_is_unsupported() {
        let mut cp = point("OR2", ActuatorKind::Orifice, 100.0);
        let out = solver().solve(&mut cp, 10.0, &snapshot(8.0, 3.0, 0.5)).unwrap();
        assert_eq!(out.action, 0.0);
        assert_eq!(out.regime, Regime::Unsupported);
        assert!(matches!(out.issue, Some(ControlError::UnsupportedGeometry { .. })));
    }

    #[test]
    fn depth_lookup_pump() {
        let curve = &tables().pumps["P2"];
        let at = |d: f64| NodeState { depth: d, invert_elevation: 0.0 };
        assert_eq!(pump_capacity(curve, &at(3.0), &at(0.0)), Some(5.0));
        assert_eq!(pump_capacity(curve, &at(2.0), &at(0.0)), Some(5.0));
        assert_eq!(pump_capacity(curve, &at(7.0), &at(0.0)), Some(9.0));
        assert_eq!(pump_capacity(curve, &at(-1.0), &at(0.0)), Some(1.0));

        let mut cp = point("P2", ActuatorKind::Pump, 100.0);
        let out = solver().solve(&mut cp, 2.5, &snapshot(3.0, 0.0, 1.0)).unwrap();
        assert_eq!(out.regime, Regime::Pump);
        assert!((out.action - 0.5).abs() < EPS);
    }

    #[test]
    fn head_interpolated_pump() {
        // head = h2 - h1 = 5 -> capacity 15
        let mut cp = point("P3", ActuatorKind::Pump, 100.0);
        let out = solver().solve(&mut cp, 7.5, &snapshot(1.0, 6.0, 1.0)).unwrap();
        assert!((out.action - 0.5).abs() < EPS);

        // head beyond the curve clamps to its last point (capacity 0)
        let out = solver().solve(&mut cp, 7.5, &snapshot(1.0, 40.0, 1.0)).unwrap();
        assert_eq!(out.action, 0.0);
    }

    #[test]
    fn zero_goal_idles_pump() {
        let mut cp = point("P3", ActuatorKind::Pump, 100.0);
        let out = solver().solve(&mut cp, 0.0, &snapshot(1.0, 6.0, 1.0)).unwrap();
        assert_eq!(out.action, 0.0);
    }

    #[test]
    fn unsupported_pump_family() {
        let mut cp = point("P4", ActuatorKind::Pump, 100.0);
        let out = solver().solve(&mut cp, 5.0, &snapshot(1.0, 6.0, 1.0)).unwrap();
        assert_eq!(out.action, 0.0);
        assert!(matches!(
            out.issue,
            Some(ControlError::UnsupportedPumpCurve { ref family, .. }) if family == "PUMP4"
        ));
    }

    #[test]
    fn flood_override_forces_full_open_and_counts() {
        let mut cp = point("OR1", ActuatorKind::Orifice, 7.5);
        let snap = snapshot(5.0, 6.0, 0.5);
        for i in 1..=3 {
            let out = solver().solve(&mut cp, 0.0, &snapshot(7.6, 6.0, 0.5)).unwrap();
            assert_eq!(out.action, 1.0);
            assert!(out.flooding);
            assert_eq!(cp.flood_count, i);
        }
        let out = solver().solve(&mut cp, 10.0, &snap).unwrap();
        assert!(!out.flooding);
        assert_eq!(out.action, 0.0);
        assert_eq!(cp.flood_count, 3);
    }

    #[test]
    fn datum_offset_shifts_flood_check() {
        let mut cp = point("OR1", ActuatorKind::Orifice, 7.5);
        let s = Solver::new(UnitSystem::Us, 1.0);
        let out = s.solve(&mut cp, 0.0, &snapshot(7.0, 0.0, 0.5)).unwrap();
        assert!(out.flooding);
    }

    #[test]
    fn missing_link_is_reported() {
        let mut cp = point("OR1", ActuatorKind::Orifice, 100.0);
        let err = solver().solve(&mut cp, 1.0, &HydraulicSnapshot::default()).unwrap_err();
        assert!(matches!(err, ControlError::UnknownElement { kind: "link", .. }));
    }
}
