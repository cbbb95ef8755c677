//! Severity-ordered alert selection.
//!
//! A pure function from [`WarningState`] to the single highest-priority
//! warning. The order is a deliberate severity ranking -- identity and
//! presence violations outrank object violations, which outrank minor
//! movement -- and must be preserved exactly: first match wins, warnings
//! are never combined.

use crate::types::WarningState;

/// The single highest-priority alert condition for a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// More than one person in frame.
    MultiplePeople,
    /// The verified face does not match the baseline identity.
    UnauthorizedPerson,
    /// No face with a usable descriptor is present.
    NoFace,
    /// Forbidden items in view; labels sorted alphabetically.
    ForbiddenObjects(Vec<String>),
    /// Head drift beyond the movement threshold on either axis.
    ExcessMovement,
}

impl Alert {
    /// The operator-facing message for this alert.
    pub fn message(&self) -> String {
        match self {
            Self::MultiplePeople => {
                "CRITICAL: more than one person detected in frame".to_string()
            }
            Self::UnauthorizedPerson => {
                "Unauthorized person detected: face does not match the captured baseline"
                    .to_string()
            }
            Self::NoFace => "No face detected in frame".to_string(),
            Self::ForbiddenObjects(labels) => {
                format!("Forbidden item(s) in view: {}", labels.join(", "))
            }
            Self::ExcessMovement => "Excessive head movement detected".to_string(),
        }
    }
}

/// Select the highest-priority alert for the given state, or `None` when
/// nothing warrants a warning.
///
/// Evaluated top to bottom; `drift_threshold` is strict on both axes.
pub fn prioritize(state: &WarningState, drift_threshold: f64) -> Option<Alert> {
    if state.multiple_people {
        return Some(Alert::MultiplePeople);
    }
    if state.unauthorized_person {
        return Some(Alert::UnauthorizedPerson);
    }
    if !state.face_detected {
        return Some(Alert::NoFace);
    }
    if !state.forbidden_objects.is_empty() {
        return Some(Alert::ForbiddenObjects(
            state.forbidden_objects.iter().cloned().collect(),
        ));
    }
    if state.horizontal_drift > drift_threshold || state.vertical_drift > drift_threshold {
        return Some(Alert::ExcessMovement);
    }
    None
}

/// The message for the selected alert, or the empty string for none.
pub fn resolve_message(state: &WarningState, drift_threshold: f64) -> String {
    prioritize(state, drift_threshold)
        .map(|alert| alert.message())
        .unwrap_or_default()
}
