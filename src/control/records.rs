//! Line-protocol records for group goals and pump recommendations.

use chrono::{DateTime, Utc};

use crate::actuation::PumpSchedule;
use crate::market::ParticipantGoal;
use crate::telemetry::{FieldValue, Record, dt_utc_string};

/// Which goal a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalKind {
    Flow,
    Volume,
}

impl GoalKind {
    pub fn field(self) -> &'static str {
        match self {
            Self::Flow => "FLOW_REC",
            Self::Volume => "VOLUME_REC",
        }
    }
}

/// Goal record stamped with the sample time that produced it.
pub fn goal_record(
    measure: &str,
    group: u32,
    goal: &ParticipantGoal,
    kind: GoalKind,
    fallback_time: DateTime<Utc>,
) -> Record {
    let t = goal.timestamp.unwrap_or(fallback_time);
    let value = match kind {
        GoalKind::Flow => goal.goal_flow,
        GoalKind::Volume => goal.goal_volume,
    };
    Record::new(measure, t)
        .tag("SITE", goal.asset.as_str())
        .tag("GROUP", group.to_string())
        .tag("LOCATION", goal.location.as_str())
        .field(kind.field(), FieldValue::Float(value))
        .field("DT_UTC", FieldValue::Str(dt_utc_string(t)))
}

pub fn pump_record(measure: &str, schedule: &PumpSchedule, now: DateTime<Utc>) -> Record {
    let rec = &schedule.recommendation;
    Record::new(measure, now)
        .tag("SITE", schedule.station.as_str())
        .tag("PUMP", schedule.pump.as_str())
        .field("REC_SECONDS", FieldValue::Float(rec.seconds))
        .field("REC_STR", FieldValue::Str(rec.display.clone()))
        .field("REC_BOOL", FieldValue::Bool(rec.on))
        .field("DT_UTC", FieldValue::Str(dt_utc_string(now)))
}
