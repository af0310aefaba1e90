//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sewer_mbc::config::{DEMO_TELEMETRY_CSV, NetworkConfig};
use sewer_mbc::control::Engine;
use sewer_mbc::telemetry::{MemoryTelemetry, Record, RecordSink, TelemetryError};

/// Time of the demo telemetry snapshot.
pub fn cycle_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap()
}

/// Engine over the built-in demo network.
pub fn demo_engine() -> Engine {
    Engine::from_config(NetworkConfig::demo()).expect("demo network should validate")
}

pub fn demo_telemetry() -> MemoryTelemetry {
    MemoryTelemetry::from_csv_str(DEMO_TELEMETRY_CSV).expect("demo snapshot should parse")
}

/// Demo snapshot without any row mentioning `asset`.
pub fn demo_telemetry_without(asset: &str) -> MemoryTelemetry {
    let csv: String = DEMO_TELEMETRY_CSV
        .lines()
        .filter(|l| !l.starts_with(&format!("{asset},")))
        .map(|l| format!("{l}\n"))
        .collect();
    MemoryTelemetry::from_csv_str(&csv).expect("filtered snapshot should parse")
}

/// Sink rejecting every `every`-th record.
pub struct FlakySink {
    pub every: usize,
    pub seen: usize,
    pub stored: Vec<Record>,
}

impl FlakySink {
    pub fn new(every: usize) -> Self {
        Self {
            every,
            seen: 0,
            stored: Vec::new(),
        }
    }
}

impl RecordSink for FlakySink {
    fn write_record(&mut self, record: &Record) -> Result<(), TelemetryError> {
        self.seen += 1;
        if self.seen % self.every == 0 {
            return Err(TelemetryError::Write("connection reset".into()));
        }
        self.stored.push(record.clone());
        Ok(())
    }
}

pub fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{what}: expected {expected}, got {actual}"
    );
}
