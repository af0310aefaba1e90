use crate::assets::types::{AssetCore, AssetKind, MeasuredAsset, Normalization};

/// A combined-sewer-overflow basin with independently normalized chambers
/// (typically a forebay and the main basin).
#[derive(Debug, Clone)]
pub struct CsoBasin {
    core: AssetCore,
    /// Field priced when the basin is a group's downstream constraint.
    cost_field: String,
}

impl CsoBasin {
    /// Creates a basin; each chamber carries its own invert/max-depth pair.
    pub fn new(
        name: impl Into<String>,
        measure: impl Into<String>,
        fields: &[String],
        chambers: Vec<Normalization>,
        cost_field: impl Into<String>,
    ) -> Self {
        Self {
            core: AssetCore::new(name, measure, fields, chambers),
            cost_field: cost_field.into(),
        }
    }
}

impl MeasuredAsset for CsoBasin {
    fn core(&self) -> &AssetCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AssetCore {
        &mut self.core
    }

    fn kind(&self) -> AssetKind {
        AssetKind::CsoBasin
    }

    fn cost_field(&self) -> &str {
        &self.cost_field
    }
}
