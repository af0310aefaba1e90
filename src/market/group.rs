use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// One upstream competitor in a group: an asset field and its bid weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Participant {
    pub asset: String,
    /// Normalized field whose fill drives the participant's demand.
    pub field: String,
    /// Label carried on goal records (`LOCATION` tag).
    pub location: String,
    pub weight: f64,
}

/// The downstream constraint priced as the (n+1)-th participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostTerm {
    pub asset: String,
    /// Field priced; the asset's own cost field when omitted.
    #[serde(default)]
    pub field: Option<String>,
    pub set_point: f64,
    pub weight: f64,
}

/// How a group turns its available capacity into per-participant volume goals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeRule {
    /// `goal_volume = volume_headroom × power`.
    #[default]
    Headroom,
    /// `goal_volume = goal_flow × interval`, for groups bounded by a meter
    /// rather than a storage element.
    FlowTimesInterval,
}

/// Where a group's remaining downstream capacity is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacitySpec {
    pub asset: String,
    /// Field whose fill fraction measures the occupied share of `max_volume`.
    pub field: String,
    pub max_volume: f64,
    /// Raw field holding the element's known outflow, added to the flow budget.
    #[serde(default)]
    pub outflow_field: Option<String>,
    #[serde(default)]
    pub volume: VolumeRule,
}

/// A set of upstream participants competing for one downstream capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: u32,
    pub participants: Vec<Participant>,
    pub cost: CostTerm,
    pub capacity: CapacitySpec,
}

impl Group {
    /// Builds a group.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidGroup`] when the group has no participants
    /// or lists the same (asset, location) pair twice.
    pub fn new(
        id: u32,
        participants: Vec<Participant>,
        cost: CostTerm,
        capacity: CapacitySpec,
    ) -> Result<Self, ControlError> {
        if participants.is_empty() {
            return Err(ControlError::InvalidGroup {
                group: id,
                reason: "no participants".into(),
            });
        }
        for (i, p) in participants.iter().enumerate() {
            let dup = participants[..i]
                .iter()
                .any(|q| q.asset == p.asset && q.location == p.location);
            if dup {
                return Err(ControlError::InvalidGroup {
                    group: id,
                    reason: format!("duplicate participant {}/{}", p.asset, p.location),
                });
            }
        }
        Ok(Self {
            id,
            participants,
            cost,
            capacity,
        })
    }

    /// Names of every asset the group reads, participants first.
    pub fn referenced_assets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let names = self
            .participants
            .iter()
            .map(|p| p.asset.as_str())
            .chain([self.cost.asset.as_str(), self.capacity.asset.as_str()]);
        for n in names {
            if !out.contains(&n) {
                out.push(n);
            }
        }
        out
    }
}
