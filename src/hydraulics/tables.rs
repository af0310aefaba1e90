//! Typed hydraulic-model tables and the geometry derived from them.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Cross-section shape of a conduit or orifice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shape {
    Circular,
    RectClosed,
    RectOpen,
    Triangular,
    Trapezoidal,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circular => "CIRCULAR",
            Self::RectClosed => "RECT_CLOSED",
            Self::RectOpen => "RECT_OPEN",
            Self::Triangular => "TRIANGULAR",
            Self::Trapezoidal => "TRAPEZOIDAL",
        }
    }

    pub fn is_rectangular(self) -> bool {
        matches!(self, Self::RectClosed | Self::RectOpen)
    }
}

fn one() -> u32 {
    1
}

/// Shape plus up to four geometry parameters; `geom1` is always the full height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XSection {
    pub shape: Shape,
    pub geom1: f64,
    #[serde(default)]
    pub geom2: f64,
    #[serde(default)]
    pub geom3: f64,
    #[serde(default)]
    pub geom4: f64,
    #[serde(default = "one")]
    pub barrels: u32,
}

impl XSection {
    /// Full-flow area across all barrels.
    ///
    /// Trapezoids use `geom2` as bottom width and `geom3`/`geom4` as side slopes.
    pub fn area(&self) -> f64 {
        let single = match self.shape {
            Shape::Circular => PI * (self.geom1 / 2.0).powi(2),
            Shape::RectClosed | Shape::RectOpen => self.geom1 * self.geom2,
            Shape::Triangular => 0.5 * self.geom1 * self.geom2,
            Shape::Trapezoidal => {
                self.geom1 * (self.geom2 + self.geom1 * (self.geom3 + self.geom4) / 2.0)
            }
        };
        single * f64::from(self.barrels)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Conduit {
    pub length: f64,
    pub xsection: XSection,
}

impl Conduit {
    pub fn max_depth(&self) -> f64 {
        self.xsection.geom1
    }

    pub fn volume(&self) -> f64 {
        self.xsection.area() * self.length
    }
}

/// Surface-area curve of a storage unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageCurve {
    /// `area = a·depth^b + c`
    Functional { a: f64, b: f64, c: f64 },
    /// Area by depth breakpoints.
    Tabular { depth: Vec<f64>, area: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Storage {
    pub max_depth: f64,
    pub curve: StorageCurve,
}

impl Storage {
    /// Total storage volume at `max_depth`.
    ///
    /// Tabular curves integrate the area table with the trapezoid rule and use
    /// the second-to-last cumulative volume, as the last breakpoint usually
    /// models surcharge above a manhole rim.
    pub fn total_volume(&self) -> f64 {
        match &self.curve {
            StorageCurve::Functional { a, b, c } => {
                a * self.max_depth.powf(b + 1.0) / (b + 1.0) + c * self.max_depth
            }
            StorageCurve::Tabular { depth, area } => {
                let cumulative = cumulative_volume(depth, area);
                match cumulative.len() {
                    0 | 1 => 0.0,
                    n => cumulative[n - 2],
                }
            }
        }
    }
}

/// Cumulative trapezoid-rule volume at each breakpoint, starting at zero.
pub fn cumulative_volume(depth: &[f64], area: &[f64]) -> Vec<f64> {
    let n = depth.len().min(area.len());
    let mut v = Vec::with_capacity(n);
    if n == 0 {
        return v;
    }
    v.push(0.0);
    for i in 1..n {
        let h = depth[i] - depth[i - 1];
        v.push(v[i - 1] + (area[i - 1] + area[i]) * h / 2.0);
    }
    v
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Junction {
    pub max_depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Orifice {
    pub xsection: XSection,
    /// Crest height above the inlet node invert.
    #[serde(default)]
    pub offset: f64,
    /// Discharge coefficient.
    pub cd: f64,
}

impl Orifice {
    /// Area of the fully open orifice.
    pub fn full_area(&self) -> f64 {
        self.xsection.geom1 * self.xsection.geom2
    }
}

/// Pump curve families of the hydraulic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveFamily {
    /// Flow by wet-well volume (`PUMP1`).
    #[serde(rename = "PUMP1")]
    VolumeStep,
    /// Flow by inlet-node depth, stepwise (`PUMP2`).
    #[serde(rename = "PUMP2")]
    DepthLookup,
    /// Flow by head difference, interpolated (`PUMP3`).
    #[serde(rename = "PUMP3")]
    HeadInterpolated,
    /// Flow by inlet-node depth, continuous (`PUMP4`).
    #[serde(rename = "PUMP4")]
    DepthContinuous,
}

impl CurveFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VolumeStep => "PUMP1",
            Self::DepthLookup => "PUMP2",
            Self::HeadInterpolated => "PUMP3",
            Self::DepthContinuous => "PUMP4",
        }
    }
}

/// Pump curve as `(x, flow)` breakpoints; `x` is depth, head, or volume by family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PumpCurve {
    pub family: CurveFamily,
    pub points: Vec<[f64; 2]>,
}

/// Model-definition tables consumed by control and downstream points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelTables {
    #[serde(default)]
    pub junctions: BTreeMap<String, Junction>,
    #[serde(default)]
    pub storages: BTreeMap<String, Storage>,
    #[serde(default)]
    pub conduits: BTreeMap<String, Conduit>,
    #[serde(default)]
    pub orifices: BTreeMap<String, Orifice>,
    #[serde(default)]
    pub pumps: BTreeMap<String, PumpCurve>,
}
