use std::f64::consts::PI;

use crate::assets::types::{AssetCore, AssetKind, MeasuredAsset, Normalization};

/// A level/flow meter installed in a circular conduit.
///
/// Level normalizes against the pipe diameter; capacity uses the wetted
/// cross-section instead, since a half-full pipe holds half its area.
#[derive(Debug, Clone)]
pub struct SewerMeter {
    core: AssetCore,
    /// Conduit diameter at the meter (same length unit as level).
    pub diameter: f64,
    /// Conduit reach length represented by the meter.
    pub length: f64,
    pub level_field: String,
}

impl SewerMeter {
    /// # Panics
    ///
    /// Panics if `diameter` is not positive.
    pub fn new(
        name: impl Into<String>,
        measure: impl Into<String>,
        fields: &[String],
        diameter: f64,
        length: f64,
        level_field: impl Into<String>,
    ) -> Self {
        assert!(diameter > 0.0, "meter diameter must be > 0");
        let level_field = level_field.into();
        let normalizations = vec![Normalization::new(level_field.clone(), 0.0, diameter)];
        Self {
            core: AssetCore::new(name, measure, fields, normalizations),
            diameter,
            length,
            level_field,
        }
    }

    /// Full cross-sectional area of the conduit.
    pub fn area_max(&self) -> f64 {
        PI * (self.diameter / 2.0).powi(2)
    }

    /// Volume of the metered reach when running full.
    pub fn max_volume(&self) -> f64 {
        self.area_max() * self.length
    }

    /// Fraction of the cross-section filled by the latest level reading.
    pub fn percent_area(&self) -> Option<f64> {
        self.core
            .raw(&self.level_field)
            .map(|level| circular_fill_fraction(self.diameter, level))
    }
}

/// Fraction of a circular section of `diameter` filled to depth `level`.
///
/// Uses the circular-segment area `r²(θ - sin θ)/2` with
/// `θ = 2·acos((r - h)/r)`, reflecting about the half-full line when the
/// level is above the centre. Levels outside `[0, diameter]` saturate.
///
/// ```
/// use sewer_mbc::assets::sewer_meter::circular_fill_fraction;
///
/// assert!((circular_fill_fraction(2.0, 1.0) - 0.5).abs() < 1e-12);
/// assert_eq!(circular_fill_fraction(2.0, 0.0), 0.0);
/// ```
pub fn circular_fill_fraction(diameter: f64, level: f64) -> f64 {
    let r = diameter / 2.0;
    let full = PI * r * r;
    let level = level.clamp(0.0, diameter);

    let segment = |h: f64| {
        let theta = 2.0 * ((r - h) / r).clamp(-1.0, 1.0).acos();
        r * r * (theta - theta.sin()) / 2.0
    };

    let area = if level > r {
        full - segment(diameter - level)
    } else {
        segment(level)
    };
    area / full
}

impl MeasuredAsset for SewerMeter {
    fn core(&self) -> &AssetCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AssetCore {
        &mut self.core
    }

    fn kind(&self) -> AssetKind {
        AssetKind::SewerMeter
    }

    fn cost_field(&self) -> &str {
        &self.level_field
    }

    /// The level field reports the wetted-area fraction rather than the
    /// depth ratio; other fields fall back to their normalized value.
    fn fill_fraction(&self, field: &str) -> Option<f64> {
        if field == self.level_field {
            self.percent_area()
        } else {
            self.core.normalized(field).filter(|v| *v >= 0.0)
        }
    }
}
