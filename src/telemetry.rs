//! Telemetry store seams: latest-value queries, recommendation records, and an
//! in-memory store used for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use thiserror::Error;

/// Most recent timestamped value of one telemetry field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Failures reported by the telemetry collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    /// No series exists for the requested site/measure/field.
    #[error("no series for {asset}/{measure}/{field}")]
    NoData {
        asset: String,
        measure: String,
        field: String,
    },
    /// The store rejected a record.
    #[error("write rejected: {0}")]
    Write(String),
}

/// Read side of the telemetry store.
pub trait TelemetrySource {
    /// Returns the last known sample of `field` for `asset` under `measure`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::NoData`] when no series exists.
    fn get_latest(&self, asset: &str, measure: &str, field: &str)
    -> Result<Sample, TelemetryError>;
}

/// Write side of the telemetry store.
pub trait RecordSink {
    /// Stores one recommendation record.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Write`] when the record is rejected.
    fn write_record(&mut self, record: &Record) -> Result<(), TelemetryError>;
}

/// Value of a single record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Bool(bool),
    Str(String),
}

/// A flat, tagged, time-stamped record destined for the telemetry store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub measure: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Starts a record for `measure` at `timestamp` with no tags or fields.
    pub fn new(measure: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measure: measure.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Returns the value of the named field, if present.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the value of the named tag, if present.
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders the record as one line of line protocol.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sewer_mbc::telemetry::{FieldValue, Record};
    ///
    /// let t = Utc.timestamp_opt(1, 0).unwrap();
    /// let r = Record::new("FREUD", t)
    ///     .tag("SITE", "FRE")
    ///     .field("REC_BOOL", FieldValue::Bool(true));
    /// assert_eq!(r.to_line_protocol(), "FREUD,SITE=FRE REC_BOOL=true 1000000000");
    /// ```
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_key(&self.measure);
        for (k, v) in &self.tags {
            let _ = write!(line, ",{}={}", escape_key(k), escape_key(v));
        }
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    FieldValue::Float(x) => x.to_string(),
                    FieldValue::Bool(b) => b.to_string(),
                    FieldValue::Str(s) => format!("\"{}\"", s.replace('"', "\\\"")),
                };
                format!("{}={rendered}", escape_key(k))
            })
            .collect();
        let nanos = self.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let _ = write!(line, " {} {nanos}", fields.join(","));
        line
    }
}

fn escape_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Short human-readable UTC stamp stored alongside each recommendation.
pub fn dt_utc_string(t: DateTime<Utc>) -> String {
    t.format("%m-%d %H:%M UTC").to_string()
}

/// One row of a telemetry snapshot CSV: `asset,measure,field,timestamp,value`.
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    asset: String,
    measure: String,
    field: String,
    timestamp: DateTime<Utc>,
    value: f64,
}

type SeriesKey = (String, String, String);

/// In-memory telemetry store holding the latest sample per series and every
/// record written to it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry {
    latest: BTreeMap<SeriesKey, Sample>,
    records: Vec<Record>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the latest sample of a series.
    pub fn insert(
        &mut self,
        asset: &str,
        measure: &str,
        field: &str,
        timestamp: DateTime<Utc>,
        value: f64,
    ) {
        self.latest.insert(
            (asset.to_string(), measure.to_string(), field.to_string()),
            Sample { timestamp, value },
        );
    }

    /// Loads a snapshot from CSV with header `asset,measure,field,timestamp,value`.
    ///
    /// Later rows for the same series win only when their timestamp is newer.
    ///
    /// # Errors
    ///
    /// Returns the underlying `csv::Error` for malformed rows.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self, csv::Error> {
        let mut store = Self::new();
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        for row in rdr.deserialize() {
            let row: SnapshotRow = row?;
            let key = (row.asset, row.measure, row.field);
            let newer = store
                .latest
                .get(&key)
                .is_none_or(|s| s.timestamp <= row.timestamp);
            if newer {
                store.latest.insert(
                    key,
                    Sample {
                        timestamp: row.timestamp,
                        value: row.value,
                    },
                );
            }
        }
        Ok(store)
    }

    /// Parses a snapshot from an in-memory CSV string.
    ///
    /// # Errors
    ///
    /// Returns the underlying `csv::Error` for malformed rows.
    pub fn from_csv_str(s: &str) -> Result<Self, csv::Error> {
        Self::from_csv_reader(s.as_bytes())
    }

    /// Returns a copy whose `targets` series (keyed by asset and field) carry
    /// additive Gaussian noise drawn from a seeded generator.
    pub fn with_noise(&self, seed: u64, std_dev: f64, targets: &BTreeSet<(String, String)>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut out = self.clone();
        out.records.clear();
        for ((asset, _, field), sample) in out.latest.iter_mut() {
            if targets.contains(&(asset.clone(), field.clone())) {
                sample.value += gaussian_noise(&mut rng, std_dev);
            }
        }
        out
    }

    /// Records written so far, in write order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of series holding a latest sample.
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

impl TelemetrySource for MemoryTelemetry {
    fn get_latest(
        &self,
        asset: &str,
        measure: &str,
        field: &str,
    ) -> Result<Sample, TelemetryError> {
        self.latest
            .get(&(asset.to_string(), measure.to_string(), field.to_string()))
            .copied()
            .ok_or_else(|| TelemetryError::NoData {
                asset: asset.to_string(),
                measure: measure.to_string(),
                field: field.to_string(),
            })
    }
}

impl RecordSink for MemoryTelemetry {
    fn write_record(&mut self, record: &Record) -> Result<(), TelemetryError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Sink that appends each record as a line of line protocol to a writer.
pub struct LineProtocolSink<W: Write> {
    writer: W,
}

impl<W: Write> LineProtocolSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the final flush fails.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> RecordSink for LineProtocolSink<W> {
    fn write_record(&mut self, record: &Record) -> Result<(), TelemetryError> {
        writeln!(self.writer, "{}", record.to_line_protocol())
            .map_err(|e| TelemetryError::Write(e.to_string()))
    }
}

/// Gaussian noise via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
