//! Discrete pump run-time scheduling.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::assets::{MeasuredAsset, PumpRecommendation, PumpStation};

/// Shortest run time (s) recommended as "on".
pub const MIN_RUN_SECONDS: f64 = 180.0;

/// Applies the minimum-run threshold to a commanded run time.
///
/// ```
/// use sewer_mbc::actuation::scheduler::recommend;
///
/// let r = recommend(300.0, 180.0);
/// assert!(r.on);
/// assert_eq!(r.display, "05");
/// assert!(!recommend(179.0, 180.0).on);
/// ```
pub fn recommend(seconds: f64, min_run_s: f64) -> PumpRecommendation {
    if seconds >= min_run_s {
        PumpRecommendation {
            seconds,
            on: true,
            display: format!("{:02}", (seconds / 60.0).floor() as u64),
        }
    } else {
        PumpRecommendation {
            seconds,
            on: false,
            display: String::new(),
        }
    }
}

/// Schedule of one pump for the current interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpSchedule {
    pub station: String,
    pub pump: String,
    pub group: u32,
    /// Volume the commanded run time moves (`seconds × flow_rate`).
    pub committed_volume: f64,
    pub recommendation: PumpRecommendation,
}

/// Greedy run-time scheduler over a fixed control interval.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    pub interval_s: f64,
    pub min_run_s: f64,
}

impl Scheduler {
    pub fn new(interval_s: f64, min_run_s: f64) -> Self {
        Self {
            interval_s,
            min_run_s,
        }
    }

    /// Splits each group's volume goal across the station's pumps serving it.
    ///
    /// Pumps are depleted in configured order: each runs the full interval
    /// until the remaining goal is smaller than its interval capacity, which
    /// it then covers with a partial run. Later pumps get nothing. A group
    /// without a goal leaves its pumps off.
    ///
    /// Recommendations are stored on the pumps and also returned.
    pub fn schedule(
        &self,
        station: &mut PumpStation,
        volume_goal_by_group: &BTreeMap<u32, f64>,
    ) -> Vec<PumpSchedule> {
        let mut remaining: BTreeMap<u32, f64> = station
            .groups()
            .into_iter()
            .map(|g| (g, volume_goal_by_group.get(&g).copied().unwrap_or(0.0).max(0.0)))
            .collect();

        let station_name = station.name().to_string();
        let mut out = Vec::with_capacity(station.pumps.len());
        for pump in &mut station.pumps {
            let left = remaining.entry(pump.group).or_insert(0.0);
            let max_contribution = pump.flow_rate * self.interval_s;
            let seconds = if max_contribution > *left {
                let s = *left / pump.flow_rate;
                *left = 0.0;
                s
            } else {
                *left -= max_contribution;
                self.interval_s
            };

            let rec = recommend(seconds, self.min_run_s);
            debug!(
                station = %station_name,
                pump = %pump.name,
                group = pump.group,
                seconds,
                on = rec.on,
                "pump scheduled"
            );
            pump.recommendation = Some(rec.clone());
            out.push(PumpSchedule {
                station: station_name.clone(),
                pump: pump.name.clone(),
                group: pump.group,
                committed_volume: seconds * pump.flow_rate,
                recommendation: rec,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Pump;

    fn station(pumps: Vec<Pump>) -> PumpStation {
        PumpStation::new("CON", "CONNER", &[], &[44.5], &[50.0], 1, pumps)
    }

    fn goals(pairs: &[(u32, f64)]) -> BTreeMap<u32, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn threshold_is_inclusive() {
        let off = recommend(179.0, MIN_RUN_SECONDS);
        assert!(!off.on);
        assert_eq!(off.display, "");
        let on = recommend(180.0, MIN_RUN_SECONDS);
        assert!(on.on);
        assert_eq!(on.display, "03");
    }

    #[test]
    fn single_pump_partial_run() {
        let mut st = station(vec![Pump::new("SN1", 10.0, 2)]);
        let out = Scheduler::new(600.0, MIN_RUN_SECONDS).schedule(&mut st, &goals(&[(2, 3000.0)]));
        assert_eq!(out.len(), 1);
        assert!((out[0].recommendation.seconds - 300.0).abs() < 1e-9);
        assert!(out[0].recommendation.on);
        assert_eq!(out[0].recommendation.display, "05");
        assert_eq!(st.pumps[0].recommendation.as_ref().map(|r| r.on), Some(true));
    }

    #[test]
    fn greedy_depletion_in_configured_order() {
        let mut st = station(vec![
            Pump::new("SN1", 5.0, 2),
            Pump::new("SN2", 5.0, 2),
            Pump::new("SN3", 5.0, 2),
        ]);
        // first pump full (3000), second partial (1425 -> 285 s), third idle
        let out = Scheduler::new(600.0, MIN_RUN_SECONDS).schedule(&mut st, &goals(&[(2, 4425.0)]));
        let secs: Vec<f64> = out.iter().map(|s| s.recommendation.seconds).collect();
        assert!((secs[0] - 600.0).abs() < 1e-9);
        assert!((secs[1] - 285.0).abs() < 1e-9);
        assert_eq!(secs[2], 0.0);
        assert_eq!(out[0].recommendation.display, "10");
        assert_eq!(out[1].recommendation.display, "04");
        assert!(!out[2].recommendation.on);

        let committed: f64 = out.iter().map(|s| s.committed_volume).sum();
        assert!((committed - 4425.0).abs() < 1e-9);
    }

    #[test]
    fn committed_volume_capped_by_capacity() {
        let mut st = station(vec![Pump::new("ST1", 1.0, 1), Pump::new("ST2", 1.0, 1)]);
        let out = Scheduler::new(600.0, MIN_RUN_SECONDS).schedule(&mut st, &goals(&[(1, 10_000.0)]));
        let committed: f64 = out.iter().map(|s| s.committed_volume).sum();
        assert!((committed - 1200.0).abs() < 1e-9);
        assert!(out.iter().all(|s| s.recommendation.on));
    }

    #[test]
    fn groups_deplete_independently() {
        let mut st = station(vec![
            Pump::new("ST1", 10.0, 1),
            Pump::new("SN1", 10.0, 2),
            Pump::new("SN2", 10.0, 2),
        ]);
        let out = Scheduler::new(600.0, MIN_RUN_SECONDS).schedule(&mut st, &goals(&[(1, 1200.0), (2, 9000.0)]));
        assert!((out[0].recommendation.seconds - 120.0).abs() < 1e-9);
        assert!(!out[0].recommendation.on);
        assert_eq!(out[1].recommendation.seconds, 600.0);
        assert!((out[2].recommendation.seconds - 300.0).abs() < 1e-9);
    }

    #[test]
    fn missing_goal_leaves_pumps_off() {
        let mut st = station(vec![Pump::new("ST1", 10.0, 1)]);
        let out = Scheduler::new(600.0, MIN_RUN_SECONDS).schedule(&mut st, &BTreeMap::new());
        assert_eq!(out[0].recommendation.seconds, 0.0);
        assert!(!out[0].recommendation.on);
        assert_eq!(st.recommended_by_service().get("ST"), Some(&0));
    }
}
