//! Group membership and the per-interval pricing that clears each group.

pub mod allocator;
pub mod group;

pub use allocator::{Allocator, GroupClearing, ParticipantGoal, clearing_price, purchasing_power};
pub use group::{CapacitySpec, CostTerm, Group, Participant, VolumeRule};
