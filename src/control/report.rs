//! Human-readable summaries of control cycles.

use std::fmt;

use serde::Serialize;

use super::types::CycleResult;

/// Printable view of one cycle.
pub struct CycleReport<'a>(pub &'a CycleResult);

impl CycleReport<'_> {
    /// `"succeeded"` or `"succeeded with N failed writes"`.
    pub fn outcome(&self) -> String {
        match self.0.failed_writes.len() {
            0 => "succeeded".to_string(),
            n => format!("succeeded with {n} failed writes"),
        }
    }
}

fn counts(map: &std::collections::BTreeMap<String, u32>) -> String {
    if map.is_empty() {
        return "-".to_string();
    }
    map.iter()
        .map(|(service, n)| format!("{service} {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for CycleReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(
            f,
            "--- Cycle {} Report ({}) ---",
            r.cycle,
            r.time.format("%Y-%m-%d %H:%M UTC")
        )?;
        for c in &r.clearings {
            writeln!(
                f,
                "Group {}:  price {:.4}  cost {:.4}  headroom {:.1}  flow {:.2}",
                c.group_id, c.clearing_price, c.downstream_cost, c.volume_headroom, c.flow_available
            )?;
            for p in &c.participants {
                writeln!(
                    f,
                    "  {:<16} {:<8} demand {:.3}  power {:.4}  flow {:>10.2}  volume {:>12.2}",
                    p.asset, p.location, p.demand, p.power, p.goal_flow, p.goal_volume
                )?;
            }
        }
        for s in &r.stations {
            write!(
                f,
                "Station {:<6} running [{}]  recommended [{}]",
                s.station,
                counts(&s.running),
                counts(&s.recommended)
            )?;
            if let Some(g) = s.gates_open {
                write!(f, "  gates open {g}")?;
            }
            writeln!(f)?;
        }
        for s in &r.schedules {
            let rec = &s.recommendation;
            let shown = if rec.on { format!("{} min", rec.display) } else { "off".to_string() };
            writeln!(f, "  {:<6} {:<5} {:>7.1} s  {}", s.station, s.pump, rec.seconds, shown)?;
        }
        for issue in &r.issues {
            writeln!(f, "Issue: {issue}")?;
        }
        for fw in &r.failed_writes {
            writeln!(f, "Failed write ({}): {}", fw.reason, fw.line)?;
        }
        writeln!(f, "Records written:       {}", r.records_written)?;
        write!(f, "Cycle {}", self.outcome())
    }
}

/// Totals over a sequence of cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub cycles: usize,
    pub records_written: usize,
    pub failed_writes: usize,
    pub issues: usize,
    /// Pump-cycles with an "on" recommendation.
    pub pump_on_count: usize,
    /// Mean recommended run time over all scheduled pumps (s).
    pub mean_run_s: f64,
}

impl RunSummary {
    pub fn from_results(results: &[CycleResult]) -> Self {
        let scheduled: Vec<f64> = results
            .iter()
            .flat_map(|r| r.schedules.iter().map(|s| s.recommendation.seconds))
            .collect();
        let mean_run_s = if scheduled.is_empty() {
            0.0
        } else {
            scheduled.iter().sum::<f64>() / scheduled.len() as f64
        };
        Self {
            cycles: results.len(),
            records_written: results.iter().map(|r| r.records_written).sum(),
            failed_writes: results.iter().map(|r| r.failed_writes.len()).sum(),
            issues: results.iter().map(|r| r.issues.len()).sum(),
            pump_on_count: results
                .iter()
                .flat_map(|r| &r.schedules)
                .filter(|s| s.recommendation.on)
                .count(),
            mean_run_s,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Cycles:                {}", self.cycles)?;
        writeln!(f, "Records written:       {}", self.records_written)?;
        writeln!(f, "Failed writes:         {}", self.failed_writes)?;
        writeln!(f, "Issues:                {}", self.issues)?;
        writeln!(f, "Pump-on recommendations: {}", self.pump_on_count)?;
        write!(f, "Mean run time:         {:.1} s", self.mean_run_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::types::FailedWrite;
    use chrono::{TimeZone, Utc};

    fn empty() -> CycleResult {
        CycleResult {
            cycle: 2,
            time: Utc.with_ymd_and_hms(2019, 1, 15, 10, 20, 0).unwrap(),
            clearings: Vec::new(),
            schedules: Vec::new(),
            stations: Vec::new(),
            issues: Vec::new(),
            records_written: 4,
            failed_writes: Vec::new(),
        }
    }

    #[test]
    fn clean_cycle_outcome() {
        let r = empty();
        let text = CycleReport(&r).to_string();
        assert!(text.starts_with("--- Cycle 2 Report (2019-01-15 10:20 UTC) ---"));
        assert!(text.ends_with("Cycle succeeded"));
    }

    #[test]
    fn failed_writes_reported() {
        let mut r = empty();
        for _ in 0..2 {
            r.failed_writes.push(FailedWrite {
                line: "FREUD,SITE=FRE,PUMP=ST1 REC_BOOL=false 0".into(),
                reason: "write rejected: timeout".into(),
            });
        }
        let text = CycleReport(&r).to_string();
        assert!(text.contains("FREUD,SITE=FRE,PUMP=ST1"));
        assert!(text.ends_with("Cycle succeeded with 2 failed writes"));
    }

    #[test]
    fn summary_of_nothing() {
        let s = RunSummary::from_results(&[]);
        assert_eq!(s.cycles, 0);
        assert_eq!(s.mean_run_s, 0.0);
    }

    #[test]
    fn summary_totals() {
        let mut a = empty();
        a.failed_writes.push(FailedWrite {
            line: String::new(),
            reason: String::new(),
        });
        let s = RunSummary::from_results(&[a, empty()]);
        assert_eq!(s.cycles, 2);
        assert_eq!(s.records_written, 8);
        assert_eq!(s.failed_writes, 1);
        assert!(s.to_string().starts_with("--- Run Summary ---"));
    }
}
