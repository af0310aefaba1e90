use serde::Deserialize;
use thiserror::Error;

use crate::hydraulics::model::{HydraulicProvider, HydraulicSnapshot};

/// Replays pre-solved hydraulic states one routing step at a time.
///
/// Target settings requested between steps are recorded and carried into the
/// next frame as the link's current setting, so the solver sees its own
/// previous command the way it would inside a live simulation.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    frames: Vec<HydraulicSnapshot>,
    step_s: f64,
    cursor: Option<usize>,
    current: HydraulicSnapshot,
    applied: Vec<AppliedSetting>,
}

/// A target setting requested during a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedSetting {
    pub step: usize,
    pub link: String,
    pub setting: f64,
}

/// Failures loading a replay file.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("malformed replay file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("step_s must be > 0, got {0}")]
    InvalidStep(f64),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplayFile {
    step_s: f64,
    frames: Vec<HydraulicSnapshot>,
}

impl ReplayProvider {
    /// # Panics
    ///
    /// Panics if `step_s` is not positive.
    pub fn new(frames: Vec<HydraulicSnapshot>, step_s: f64) -> Self {
        assert!(step_s > 0.0, "routing step must be > 0");
        Self {
            frames,
            step_s,
            cursor: None,
            current: HydraulicSnapshot::default(),
            applied: Vec::new(),
        }
    }

    /// Parses `step_s = <seconds>` followed by `[[frames]]` tables.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Parse`] for malformed input and
    /// [`ReplayError::InvalidStep`] when `step_s` is not positive.
    pub fn from_toml_str(s: &str) -> Result<Self, ReplayError> {
        let file: ReplayFile = toml::from_str(s)?;
        if file.step_s.is_nan() || file.step_s <= 0.0 {
            return Err(ReplayError::InvalidStep(file.step_s));
        }
        Ok(Self::new(file.frames, file.step_s))
    }

    pub fn applied(&self) -> &[AppliedSetting] {
        &self.applied
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl HydraulicProvider for ReplayProvider {
    fn advance(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        let Some(frame) = self.frames.get(next) else {
            return false;
        };
        let mut frame = frame.clone();
        for (id, link) in frame.links.iter_mut() {
            if let Some(prev) = self.current.links.get(id) {
                link.current_setting = prev.current_setting;
            }
        }
        self.current = frame;
        self.cursor = Some(next);
        true
    }

    fn snapshot(&self) -> &HydraulicSnapshot {
        &self.current
    }

    fn elapsed_s(&self) -> f64 {
        self.cursor.map_or(0.0, |c| (c + 1) as f64 * self.step_s)
    }

    fn set_target_setting(&mut self, link: &str, setting: f64) {
        if let Some(l) = self.current.links.get_mut(link) {
            l.current_setting = setting;
        }
        self.applied.push(AppliedSetting {
            step: self.cursor.unwrap_or(0),
            link: link.to_string(),
            setting,
        });
    }
}
