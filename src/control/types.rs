//! Per-cycle result types shared by the driver, reports, export, and API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::actuation::PumpSchedule;
use crate::error::ControlError;
use crate::market::GroupClearing;

/// A record the sink rejected, kept verbatim for diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedWrite {
    /// Line-protocol rendering of the rejected record.
    pub line: String,
    pub reason: String,
}

/// Latest vs recommended pump counts of one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationStatus {
    pub station: String,
    /// Pumps reported running, per service prefix.
    pub running: BTreeMap<String, u32>,
    /// Pumps recommended on this cycle, per service prefix.
    pub recommended: BTreeMap<String, u32>,
    pub gates_open: Option<u32>,
}

/// Everything one control cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    /// Zero-based cycle index within this engine's lifetime.
    pub cycle: usize,
    pub time: DateTime<Utc>,
    pub clearings: Vec<GroupClearing>,
    pub schedules: Vec<PumpSchedule>,
    pub stations: Vec<StationStatus>,
    /// Non-fatal problems: missing telemetry and groups that could not clear.
    #[serde(serialize_with = "serialize_errors")]
    pub issues: Vec<ControlError>,
    pub records_written: usize,
    pub failed_writes: Vec<FailedWrite>,
}

fn serialize_errors<S: serde::Serializer>(errors: &[ControlError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(ToString::to_string))
}

impl CycleResult {
    pub fn clearing(&self, group: u32) -> Option<&GroupClearing> {
        self.clearings.iter().find(|c| c.group_id == group)
    }

    /// Schedules of one station's pumps, in priority order.
    pub fn station_schedules<'a>(&'a self, station: &'a str) -> impl Iterator<Item = &'a PumpSchedule> + 'a {
        self.schedules.iter().filter(move |s| s.station == station)
    }

    pub fn succeeded_cleanly(&self) -> bool {
        self.failed_writes.is_empty()
    }
}
