//! Error taxonomy for the control engine.

use thiserror::Error;

/// Failures raised while refreshing assets, building groups, or translating
/// goals into actuator commands.
///
/// Only [`ControlError::InvalidGroup`] is fatal, and only at setup. Every other
/// variant is isolated to the asset, group, or control point it names.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// The telemetry store holds no sample for a declared field.
    #[error("no telemetry sample for {asset}.{field} ({measure})")]
    MissingData {
        asset: String,
        measure: String,
        field: String,
    },

    /// A group has no participants or references something that does not exist.
    #[error("invalid group {group}: {reason}")]
    InvalidGroup { group: u32, reason: String },

    /// The orifice geometry has no implemented opening equation.
    #[error("control point {control_point}: no opening equation for {shape} geometry")]
    UnsupportedGeometry {
        control_point: String,
        shape: String,
    },

    /// The pump curve family has no implemented capacity rule.
    #[error("control point {control_point}: {family} pump curves are not supported")]
    UnsupportedPumpCurve {
        control_point: String,
        family: String,
    },

    /// The hydraulic snapshot lacks a node or link the control point references.
    #[error("control point {control_point}: {kind} `{element}` missing from hydraulic state")]
    UnknownElement {
        control_point: String,
        kind: &'static str,
        element: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_entity() {
        let e = ControlError::MissingData {
            asset: "FRE".into(),
            measure: "FREUD".into(),
            field: "WET_WELL_1".into(),
        };
        assert_eq!(e.to_string(), "no telemetry sample for FRE.WET_WELL_1 (FREUD)");

        let e = ControlError::InvalidGroup {
            group: 3,
            reason: "no participants".into(),
        };
        assert!(e.to_string().contains("group 3"));
    }
}
