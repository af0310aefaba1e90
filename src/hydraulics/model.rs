use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unit system of the hydraulic model; selects the gravitational constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitSystem {
    #[default]
    Us,
    Si,
}

impl UnitSystem {
    /// ft/s² for US customary units, m/s² otherwise.
    pub fn gravity(self) -> f64 {
        match self {
            Self::Us => 32.2,
            Self::Si => 9.81,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeState {
    pub depth: f64,
    pub invert_elevation: f64,
}

impl NodeState {
    /// Water-surface elevation.
    pub fn head(&self) -> f64 {
        self.depth + self.invert_elevation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkState {
    pub inlet_node: String,
    pub outlet_node: String,
    /// Current opening fraction (orifices) or speed setting (pumps).
    #[serde(default)]
    pub current_setting: f64,
    #[serde(default)]
    pub depth: f64,
    #[serde(default)]
    pub flow: f64,
}

/// Solved state of the hydraulic network at one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HydraulicSnapshot {
    #[serde(default)]
    pub units: UnitSystem,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeState>,
    #[serde(default)]
    pub links: BTreeMap<String, LinkState>,
}

impl HydraulicSnapshot {
    pub fn node(&self, id: &str) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    pub fn link(&self, id: &str) -> Option<&LinkState> {
        self.links.get(id)
    }
}

/// Read-only view of a stepped hydraulic simulation plus its setting setter.
pub trait HydraulicProvider {
    /// Advances one routing step; returns `false` once the run is exhausted.
    fn advance(&mut self) -> bool;

    /// State after the latest [`advance`](Self::advance).
    fn snapshot(&self) -> &HydraulicSnapshot;

    /// Simulation time of the current state, in seconds since the run started.
    fn elapsed_s(&self) -> f64;

    /// Requests a new target setting for a controllable link.
    fn set_target_setting(&mut self, link: &str, setting: f64);
}
