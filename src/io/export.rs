//! CSV export for pump recommendations and group goals.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::control::types::CycleResult;

/// Column header of the recommendations file.
const RECOMMENDATION_HEADER: &str = "cycle,time_utc,station,pump,group,committed_volume,\
                                     rec_seconds,rec_on,rec_str";

/// Column header of the goals file.
const GOAL_HEADER: &str = "cycle,time_utc,group,clearing_price,asset,location,field,\
                           demand,power,goal_flow,goal_volume";

/// Exports the pump recommendations of every cycle to `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_recommendations(results: &[CycleResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_recommendations(results, io::BufWriter::new(file))
}

/// Exports the participant goals of every cycle to `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_goals(results: &[CycleResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_goals(results, io::BufWriter::new(file))
}

/// Writes one row per scheduled pump per cycle.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_recommendations(results: &[CycleResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(RECOMMENDATION_HEADER.split(',').map(str::trim))?;

    for r in results {
        let time = r.time.to_rfc3339();
        for s in &r.schedules {
            let rec = &s.recommendation;
            wtr.write_record(&[
                r.cycle.to_string(),
                time.clone(),
                s.station.clone(),
                s.pump.clone(),
                s.group.to_string(),
                format!("{:.2}", s.committed_volume),
                format!("{:.2}", rec.seconds),
                rec.on.to_string(),
                rec.display.clone(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Writes one row per group participant per cycle.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_goals(results: &[CycleResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(GOAL_HEADER.split(',').map(str::trim))?;

    for r in results {
        let time = r.time.to_rfc3339();
        for c in &r.clearings {
            for p in &c.participants {
                wtr.write_record(&[
                    r.cycle.to_string(),
                    time.clone(),
                    c.group_id.to_string(),
                    format!("{:.6}", c.clearing_price),
                    p.asset.clone(),
                    p.location.clone(),
                    p.field.clone(),
                    format!("{:.6}", p.demand),
                    format!("{:.6}", p.power),
                    format!("{:.4}", p.goal_flow),
                    format!("{:.4}", p.goal_volume),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::{PumpSchedule, recommend};
    use crate::market::{GroupClearing, ParticipantGoal};
    use chrono::{TimeZone, Utc};

    fn result(cycle: usize) -> CycleResult {
        let schedule = |pump: &str, seconds: f64| PumpSchedule {
            station: "CON".into(),
            pump: pump.into(),
            group: 1,
            committed_volume: seconds * 100.0,
            recommendation: recommend(seconds, 180.0),
        };
        CycleResult {
            cycle,
            time: Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap(),
            clearings: vec![GroupClearing {
                group_id: 1,
                clearing_price: 0.0425,
                downstream_cost: -0.25,
                volume_headroom: 3_840_000.0,
                flow_available: 6400.0,
                participants: vec![ParticipantGoal {
                    asset: "CON".into(),
                    field: "WET_WELL_2".into(),
                    location: "ST".into(),
                    demand: 0.75,
                    wealth: 0.07,
                    power: 0.03,
                    goal_flow: 193.6,
                    goal_volume: 116_178.3,
                    timestamp: None,
                }],
            }],
            schedules: vec![schedule("ST1", 600.0), schedule("ST2", 100.0)],
            stations: Vec::new(),
            issues: Vec::new(),
            records_written: 0,
            failed_writes: Vec::new(),
        }
    }

    fn lines(buf: Vec<u8>) -> Vec<String> {
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn recommendation_rows() {
        let mut buf = Vec::new();
        write_recommendations(&[result(0), result(1)], &mut buf).unwrap();
        let lines = lines(buf);
        assert_eq!(
            lines[0],
            "cycle,time_utc,station,pump,group,committed_volume,rec_seconds,rec_on,rec_str"
        );
        // 1 header + 2 cycles x 2 pumps
        assert_eq!(lines.len(), 5);
        assert!(lines[1].ends_with(",600.00,true,10"));
        assert!(lines[2].ends_with(",100.00,false,"));
    }

    #[test]
    fn goal_rows_parse() {
        let mut buf = Vec::new();
        write_goals(&[result(0)], &mut buf).unwrap();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        assert_eq!(rdr.headers().unwrap().len(), 11);
        let rows: Vec<_> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][4], "CON");
        let flow: f64 = rows[0][9].parse().unwrap();
        assert!((flow - 193.6).abs() < 1e-9);
    }

    #[test]
    fn deterministic_output() {
        let results: Vec<_> = (0..3).map(result).collect();
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_goals(&results, &mut a).unwrap();
        write_goals(&results, &mut b).unwrap();
        assert_eq!(a, b);
    }
}
