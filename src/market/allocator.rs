//! Pareto-pricing clearing of one group against its downstream capacity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::assets::{AssetRegistry, MeasuredAsset};
use crate::error::ControlError;
use crate::market::group::{Group, VolumeRule};

/// Clearing price: mean of the participants' wealth and the downstream cost,
/// with the downstream sink counted as one extra participant.
///
/// ```
/// use sewer_mbc::market::allocator::clearing_price;
///
/// let p = clearing_price(&[0.06, 0.4], 0.05);
/// assert!((p - 0.17).abs() < 1e-12);
/// ```
pub fn clearing_price(wealth: &[f64], downstream_cost: f64) -> f64 {
    let total: f64 = wealth.iter().sum::<f64>() + downstream_cost;
    total / (wealth.len() as f64 + 1.0)
}

/// Excess of each participant's wealth over the clearing price, floored at zero.
pub fn purchasing_power(wealth: &[f64], price: f64) -> Vec<f64> {
    wealth.iter().map(|w| (w - price).max(0.0)).collect()
}

/// Unused share of `max_volume` given the element's fill fraction.
///
/// A missing fill counts as empty; a fill above 1 leaves no headroom.
pub fn volume_headroom(fill: Option<f64>, max_volume: f64) -> f64 {
    let fill = fill.unwrap_or(0.0).clamp(0.0, 1.0);
    (1.0 - fill) * max_volume
}

/// Allocation result for one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantGoal {
    pub asset: String,
    pub field: String,
    pub location: String,
    pub demand: f64,
    pub wealth: f64,
    pub power: f64,
    pub goal_flow: f64,
    pub goal_volume: f64,
    /// Timestamp of the sample that produced `demand`.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outcome of clearing one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupClearing {
    pub group_id: u32,
    pub clearing_price: f64,
    pub downstream_cost: f64,
    pub volume_headroom: f64,
    pub flow_available: f64,
    pub participants: Vec<ParticipantGoal>,
}

impl GroupClearing {
    /// Sum of volume goals for `asset` across its participant rows.
    pub fn volume_goal_for(&self, asset: &str) -> Option<f64> {
        let rows: Vec<f64> = self
            .participants
            .iter()
            .filter(|p| p.asset == asset)
            .map(|p| p.goal_volume)
            .collect();
        (!rows.is_empty()).then(|| rows.iter().sum())
    }
}

/// Clears groups over a fixed control interval.
#[derive(Debug, Clone, Copy)]
pub struct Allocator {
    pub interval_s: f64,
}

impl Allocator {
    /// # Panics
    ///
    /// Panics if `interval_s` is not positive.
    pub fn new(interval_s: f64) -> Self {
        assert!(interval_s > 0.0, "control interval must be > 0");
        Self { interval_s }
    }

    /// Computes the flow and volume goal of every participant in `group`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidGroup`] if the group references an asset
    /// that is not in `assets`.
    pub fn clear(&self, group: &Group, assets: &AssetRegistry) -> Result<GroupClearing, ControlError> {
        let lookup = |name: &str| {
            assets.get(name).ok_or_else(|| ControlError::InvalidGroup {
                group: group.id,
                reason: format!("unknown asset `{name}`"),
            })
        };

        let mut demand = Vec::with_capacity(group.participants.len());
        let mut wealth = Vec::with_capacity(group.participants.len());
        for p in &group.participants {
            let d = lookup(&p.asset)?.demand(&p.field);
            demand.push(d);
            wealth.push(d * p.weight);
        }

        let cost = &group.cost;
        let cost_asset = lookup(&cost.asset)?;
        let cost_field = cost.field.as_deref().unwrap_or_else(|| cost_asset.cost_field());
        let downstream_cost = cost_asset.downstream_cost(cost_field, cost.set_point, cost.weight);
        let price = clearing_price(&wealth, downstream_cost);
        let power = purchasing_power(&wealth, price);

        let cap = &group.capacity;
        let cap_asset = lookup(&cap.asset)?;
        let headroom = volume_headroom(cap_asset.fill_fraction(&cap.field), cap.max_volume);
        let outflow = cap
            .outflow_field
            .as_deref()
            .and_then(|f| cap_asset.core().raw(f))
            .unwrap_or(0.0);
        let flow_available = headroom / self.interval_s + outflow;

        let mut participants = Vec::with_capacity(group.participants.len());
        for (i, p) in group.participants.iter().enumerate() {
            let goal_flow = flow_available * power[i];
            let goal_volume = match cap.volume {
                VolumeRule::Headroom => headroom * power[i],
                VolumeRule::FlowTimesInterval => goal_flow * self.interval_s,
            };
            debug!(
                group = group.id,
                asset = %p.asset,
                location = %p.location,
                demand = demand[i],
                wealth = wealth[i],
                power = power[i],
                goal_flow,
                goal_volume,
                "participant cleared"
            );
            participants.push(ParticipantGoal {
                asset: p.asset.clone(),
                field: p.field.clone(),
                location: p.location.clone(),
                demand: demand[i],
                wealth: wealth[i],
                power: power[i],
                goal_flow,
                goal_volume,
                timestamp: lookup(&p.asset)?.core().timestamp(&p.field),
            });
        }

        info!(
            group = group.id,
            price,
            downstream_cost,
            headroom,
            flow_available,
            "group cleared"
        );

        Ok(GroupClearing {
            group_id: group.id,
            clearing_price: price,
            downstream_cost,
            volume_headroom: headroom,
            flow_available,
            participants,
        })
    }
}
