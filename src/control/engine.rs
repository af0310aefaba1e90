//! Control-cycle driver for the market-based pump recommendations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::actuation::Scheduler;
use crate::assets::{AssetRegistry, MeasuredAsset};
use crate::config::{ConfigError, NetworkConfig};
use crate::market::{Allocator, Group, GroupClearing};
use crate::telemetry::{Record, RecordSink, TelemetrySource};

use super::clock::Clock;
use super::records::{GoalKind, goal_record, pump_record};
use super::types::{CycleResult, FailedWrite, StationStatus};

/// Runs control cycles over a validated network.
///
/// Asset state is rebuilt at the start of every cycle and discarded at its
/// end; only the configuration, groups, and cycle counter live on.
pub struct Engine {
    config: NetworkConfig,
    groups: Vec<Group>,
    allocator: Allocator,
    scheduler: Scheduler,
    cycles_run: usize,
    last: Option<CycleResult>,
}

impl Engine {
    /// Validates `config` and builds its groups.
    ///
    /// # Errors
    ///
    /// Returns every configuration violation found.
    pub fn from_config(config: NetworkConfig) -> Result<Self, Vec<ConfigError>> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let groups = config.build_groups().map_err(|e| {
            vec![ConfigError {
                field: "groups".into(),
                message: e.to_string(),
            }]
        })?;
        let allocator = Allocator::new(config.control.interval_s);
        let scheduler = Scheduler::new(config.control.interval_s, config.control.min_run_s);
        Ok(Self {
            config,
            groups,
            allocator,
            scheduler,
            cycles_run: 0,
            last: None,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn cycles_run(&self) -> usize {
        self.cycles_run
    }

    /// Result of the most recent cycle.
    pub fn last_result(&self) -> Option<&CycleResult> {
        self.last.as_ref()
    }

    /// Executes one control cycle at `now`.
    ///
    /// Every group clears before any station is scheduled. Missing telemetry,
    /// groups that cannot clear, and rejected records are collected in the
    /// result; none of them stops the cycle.
    pub fn run_cycle(
        &mut self,
        source: &dyn TelemetrySource,
        sink: &mut dyn RecordSink,
        now: DateTime<Utc>,
    ) -> CycleResult {
        let cycle = self.cycles_run;

        // 1. Refresh and normalize
        let mut assets = self.config.build_assets();
        let mut issues = assets.refresh_all(source);
        assets.normalize_all();

        // 2. Clear every group
        let mut clearings = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            match self.allocator.clear(group, &assets) {
                Ok(c) => clearings.push(c),
                Err(e) => {
                    warn!(group = group.id, "group skipped: {e}");
                    issues.push(e);
                }
            }
        }

        // 3. Schedule pumps from the volume goals
        let mut schedules = Vec::new();
        for station in assets.stations_mut() {
            let goals = station_volume_goals(&clearings, station.name());
            schedules.extend(self.scheduler.schedule(station, &goals));
        }
        let stations = self.station_statuses(&assets);

        // 4. Hand everything to the sink
        let mut writer = Writer::new(sink);
        for clearing in &clearings {
            for goal in &clearing.participants {
                let Some(asset) = assets.get(&goal.asset) else {
                    continue;
                };
                let measure = &asset.core().measure;
                for kind in [GoalKind::Flow, GoalKind::Volume] {
                    writer.write(&goal_record(measure, clearing.group_id, goal, kind, now));
                }
            }
        }
        for schedule in &schedules {
            if let Some(station) = assets.station(&schedule.station) {
                writer.write(&pump_record(&station.core().measure, schedule, now));
            }
        }
        let (records_written, failed_writes) = writer.finish();

        if failed_writes.is_empty() {
            info!(cycle, groups = clearings.len(), pumps = schedules.len(), records_written, "cycle succeeded");
        } else {
            warn!(
                cycle,
                records_written,
                failed = failed_writes.len(),
                "cycle succeeded with {} failed writes",
                failed_writes.len()
            );
        }

        let result = CycleResult {
            cycle,
            time: now,
            clearings,
            schedules,
            stations,
            issues,
            records_written,
            failed_writes,
        };
        self.cycles_run += 1;
        self.last = Some(result.clone());
        result
    }

    /// Runs one cycle per remaining clock tick against the same telemetry.
    pub fn run(
        &mut self,
        clock: &mut Clock,
        source: &dyn TelemetrySource,
        sink: &mut dyn RecordSink,
    ) -> Vec<CycleResult> {
        let mut results = Vec::new();
        clock.run(|_, now| results.push(self.run_cycle(source, &mut *sink, now)));
        results
    }

    fn station_statuses(&self, assets: &AssetRegistry) -> Vec<StationStatus> {
        self.config
            .pump_stations
            .iter()
            .filter_map(|cfg| {
                let station = assets.station(&cfg.name)?;
                Some(StationStatus {
                    station: cfg.name.clone(),
                    running: station.running_by_service(),
                    recommended: station.recommended_by_service(),
                    gates_open: cfg
                        .gate_prefix
                        .as_deref()
                        .map(|p| station.gates_open(p, cfg.gate_count)),
                })
            })
            .collect()
    }
}

/// Volume goal of `station` in each group it participates in.
fn station_volume_goals(clearings: &[GroupClearing], station: &str) -> BTreeMap<u32, f64> {
    clearings
        .iter()
        .filter_map(|c| c.volume_goal_for(station).map(|v| (c.group_id, v)))
        .collect()
}

/// Counts successful writes and keeps the rejected ones.
struct Writer<'a> {
    sink: &'a mut dyn RecordSink,
    written: usize,
    failed: Vec<FailedWrite>,
}

impl<'a> Writer<'a> {
    fn new(sink: &'a mut dyn RecordSink) -> Self {
        Self {
            sink,
            written: 0,
            failed: Vec::new(),
        }
    }

    fn write(&mut self, record: &Record) {
        match self.sink.write_record(record) {
            Ok(()) => self.written += 1,
            Err(e) => {
                let line = record.to_line_protocol();
                warn!(%line, "record not written: {e}");
                self.failed.push(FailedWrite {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn finish(self) -> (usize, Vec<FailedWrite>) {
        (self.written, self.failed)
    }
}
