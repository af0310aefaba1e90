//! Continuous actuators and the downstream elements that bound them.

use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::hydraulics::model::HydraulicSnapshot;
use crate::hydraulics::tables::{ModelTables, Orifice, PumpCurve};

/// Kind of model element a point references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Junction,
    Storage,
    Link,
}

impl ElementKind {
    pub fn is_node(self) -> bool {
        matches!(self, Self::Junction | Self::Storage)
    }

    fn label(self) -> &'static str {
        if self.is_node() { "node" } else { "link" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    Pump,
    Orifice,
}

/// Control point as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlPointConfig {
    /// Controlled link.
    pub name: String,
    pub kind: ActuatorKind,
    #[serde(default)]
    pub initial_action: f64,
    /// Element whose level is the point's demand and flood reference.
    pub upstream: String,
    pub upstream_kind: ElementKind,
    /// Bid weight of the point within its group.
    pub u_param: f64,
    /// Derivative weight, reported in run metadata only.
    #[serde(default)]
    pub ds_param: f64,
    pub flood_elevation: f64,
    pub location: String,
    pub group: u32,
}

/// Downstream element as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownstreamPointConfig {
    pub name: String,
    pub kind: ElementKind,
    pub epsilon: f64,
    #[serde(default)]
    pub gamma: f64,
    pub max_depth: f64,
    pub set_point: f64,
    #[serde(default)]
    pub set_derivative: f64,
    pub location: String,
    pub group: u32,
}

/// Actuator parameters resolved from the model tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Actuator {
    Orifice(Orifice),
    Pump(PumpCurve),
}

/// A continuously controlled gate or pump.
///
/// `flood_count` only grows, and only lives as long as the hydraulic run
/// that owns the point.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint {
    pub name: String,
    pub actuator: Actuator,
    pub upstream: String,
    pub upstream_kind: ElementKind,
    pub u_param: f64,
    pub ds_param: f64,
    pub flood_elevation: f64,
    pub location: String,
    pub group: u32,
    /// Depth at which the upstream element counts as full.
    pub max_depth: f64,
    pub max_volume: f64,
    pub action: f64,
    pub flooding: bool,
    pub flood_count: u64,
    pub goal_flow: f64,
}

fn unknown(point: &str, kind: &'static str, element: &str) -> ControlError {
    ControlError::UnknownElement {
        control_point: point.to_string(),
        kind,
        element: element.to_string(),
    }
}

/// `(max_depth, max_volume)` of a referenced element.
fn element_capacity(
    point: &str,
    element: &str,
    kind: ElementKind,
    tables: &ModelTables,
) -> Result<(f64, f64), ControlError> {
    match kind {
        ElementKind::Storage => tables
            .storages
            .get(element)
            .map(|s| (s.max_depth, s.total_volume()))
            .ok_or_else(|| unknown(point, "storage", element)),
        ElementKind::Link => tables
            .conduits
            .get(element)
            .map(|c| (c.max_depth(), c.volume()))
            .ok_or_else(|| unknown(point, "conduit", element)),
        ElementKind::Junction => tables
            .junctions
            .get(element)
            .map(|j| (j.max_depth, 0.0))
            .ok_or_else(|| unknown(point, "junction", element)),
    }
}

/// Current depth of a node or link.
pub fn element_depth(
    point: &str,
    element: &str,
    kind: ElementKind,
    snapshot: &HydraulicSnapshot,
) -> Result<f64, ControlError> {
    if kind.is_node() {
        snapshot
            .node(element)
            .map(|n| n.depth)
            .ok_or_else(|| unknown(point, kind.label(), element))
    } else {
        snapshot
            .link(element)
            .map(|l| l.depth)
            .ok_or_else(|| unknown(point, kind.label(), element))
    }
}

/// Water-surface elevation of a node, or of a link's inlet node.
pub fn element_head(
    point: &str,
    element: &str,
    kind: ElementKind,
    snapshot: &HydraulicSnapshot,
) -> Result<f64, ControlError> {
    let node_id = if kind.is_node() {
        element
    } else {
        snapshot
            .link(element)
            .map(|l| l.inlet_node.as_str())
            .ok_or_else(|| unknown(point, "link", element))?
    };
    snapshot
        .node(node_id)
        .map(|n| n.head())
        .ok_or_else(|| unknown(point, "node", node_id))
}

impl ControlPoint {
    /// Resolves actuator and upstream geometry from the model tables.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownElement`] when the tables lack the
    /// controlled link or the upstream element.
    pub fn resolve(cfg: &ControlPointConfig, tables: &ModelTables) -> Result<Self, ControlError> {
        let actuator = match cfg.kind {
            ActuatorKind::Orifice => tables
                .orifices
                .get(&cfg.name)
                .cloned()
                .map(Actuator::Orifice)
                .ok_or_else(|| unknown(&cfg.name, "orifice", &cfg.name))?,
            ActuatorKind::Pump => tables
                .pumps
                .get(&cfg.name)
                .cloned()
                .map(Actuator::Pump)
                .ok_or_else(|| unknown(&cfg.name, "pump", &cfg.name))?,
        };
        let (max_depth, max_volume) = element_capacity(&cfg.name, &cfg.upstream, cfg.upstream_kind, tables)?;

        Ok(Self {
            name: cfg.name.clone(),
            actuator,
            upstream: cfg.upstream.clone(),
            upstream_kind: cfg.upstream_kind,
            u_param: cfg.u_param,
            ds_param: cfg.ds_param,
            flood_elevation: cfg.flood_elevation,
            location: cfg.location.clone(),
            group: cfg.group,
            max_depth,
            max_volume,
            action: cfg.initial_action.clamp(0.0, 1.0),
            flooding: false,
            flood_count: 0,
            goal_flow: 0.0,
        })
    }

    /// Upstream depth as a fraction of its full depth.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownElement`] if the upstream element is not
    /// in the snapshot.
    pub fn normalized_depth(&self, snapshot: &HydraulicSnapshot) -> Result<f64, ControlError> {
        let depth = element_depth(&self.name, &self.upstream, self.upstream_kind, snapshot)?;
        Ok(if self.max_depth > 0.0 { depth / self.max_depth } else { 0.0 })
    }
}

/// Downstream element pricing a continuous group.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamPoint {
    pub name: String,
    pub kind: ElementKind,
    pub epsilon: f64,
    pub gamma: f64,
    pub max_depth: f64,
    pub max_volume: f64,
    pub set_point: f64,
    pub set_derivative: f64,
    pub location: String,
    pub group: u32,
}

impl DownstreamPoint {
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownElement`] when the element is not a
    /// storage unit or conduit in `tables`.
    pub fn resolve(cfg: &DownstreamPointConfig, tables: &ModelTables) -> Result<Self, ControlError> {
        let (_, max_volume) = element_capacity(&cfg.name, &cfg.name, cfg.kind, tables)?;
        Ok(Self {
            name: cfg.name.clone(),
            kind: cfg.kind,
            epsilon: cfg.epsilon,
            gamma: cfg.gamma,
            max_depth: cfg.max_depth,
            max_volume,
            set_point: cfg.set_point,
            set_derivative: cfg.set_derivative,
            location: cfg.location.clone(),
            group: cfg.group,
        })
    }

    /// Current fill fraction; a negative depth reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownElement`] if the element is not in the snapshot.
    pub fn fill(&self, snapshot: &HydraulicSnapshot) -> Result<f64, ControlError> {
        let depth = element_depth(&self.name, &self.name, self.kind, snapshot)?;
        let fill = if self.max_depth > 0.0 { depth / self.max_depth } else { 0.0 };
        Ok(fill.max(0.0))
    }

    /// `(fill - set_point) × epsilon`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownElement`] if the element is not in the snapshot.
    pub fn cost(&self, snapshot: &HydraulicSnapshot) -> Result<f64, ControlError> {
        Ok((self.fill(snapshot)? - self.set_point) * self.epsilon)
    }
}
