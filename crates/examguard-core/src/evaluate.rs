//! Per-tick frame evaluation.
//!
//! Turns the latest observation into the independent signals of a
//! [`WarningState`]: centering, multi-person presence, head drift against
//! the baseline reference, identity distance, and forbidden objects. Each
//! signal is computed from this tick's observation alone; the only state
//! consulted is the session baseline, and the only state mutated is the
//! reference head position (refreshed when a centered head is seen).

use std::collections::BTreeSet;

use crate::baseline::BaselineManager;
use crate::config::GuardConfig;
use crate::types::{FaceObservation, Observation, Point, WarningState};

/// Which slice of the pipeline runs this tick.
///
/// During calibration only the pose-derived signals are computed, keeping
/// the centering feedback live while identity verification and object
/// detection stay off until a baseline exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Calibration,
    Monitoring,
}

/// Centering predicate: the head landmark lies within `tolerance` of the
/// frame center on both axes. The boundary itself is exclusive.
pub fn is_centered(point: Point, tolerance: f64) -> bool {
    (point.x - Point::FRAME_CENTER.x).abs() < tolerance
        && (point.y - Point::FRAME_CENTER.y).abs() < tolerance
}

/// Derives a fresh [`WarningState`] from each tick's observation.
pub struct FrameEvaluator {
    centering_tolerance: f64,
    identity_threshold: f64,
    object_confidence: f64,
    forbidden: BTreeSet<String>,
}

impl FrameEvaluator {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            centering_tolerance: config.centering.tolerance,
            identity_threshold: config.identity.distance_threshold,
            object_confidence: config.objects.confidence_threshold,
            forbidden: config
                .objects
                .forbidden
                .iter()
                .map(|label| label.to_lowercase())
                .collect(),
        }
    }

    /// Evaluate one observation against the session baseline.
    ///
    /// The returned state's `active_message` is left empty; selecting the
    /// surfaced warning is the prioritizer's job (see [`crate::alert`]).
    pub fn evaluate(
        &self,
        observation: &Observation,
        baseline: &mut BaselineManager,
        mode: EvalMode,
    ) -> WarningState {
        let mut state = WarningState::default();

        // Centering: any centered head refreshes the reference, so drift
        // below is measured against the most recent centered position.
        let centered_pose = observation
            .poses
            .iter()
            .find(|pose| is_centered(pose.nose, self.centering_tolerance));
        if let Some(pose) = centered_pose {
            baseline.update_reference_head(pose.nose);
        }

        state.multiple_people = observation.poses.len() > 1;

        let primary_pose = centered_pose.or_else(|| observation.poses.first());
        if let (Some(pose), Some(reference)) = (primary_pose, baseline.reference_head()) {
            state.horizontal_drift = (pose.nose.x - reference.x).abs();
            state.vertical_drift = (pose.nose.y - reference.y).abs();
        }

        match mode {
            EvalMode::Calibration => {
                state.face_detected = !observation.faces.is_empty();
            }
            EvalMode::Monitoring => {
                self.verify_identity(observation, baseline, &mut state);
                state.forbidden_objects = self.forbidden_objects(observation);
            }
        }

        state
    }

    /// Identity check against the captured baseline descriptor.
    ///
    /// Among faces with a usable descriptor, the one whose box center is
    /// L1-closest to the frame center is compared. Absence of a usable face
    /// is reported as "no face", a distinct condition from "wrong
    /// identity", so `unauthorized_person` stays false in that case.
    fn verify_identity(
        &self,
        observation: &Observation,
        baseline: &BaselineManager,
        state: &mut WarningState,
    ) {
        let identity = match baseline.identity() {
            Some(identity) => identity,
            None => {
                state.face_detected = !observation.faces.is_empty();
                return;
            }
        };

        let candidate = observation
            .faces
            .iter()
            .filter_map(|face| {
                face.descriptor
                    .as_ref()
                    .filter(|d| d.len() == identity.len())
                    .map(|d| (face, d))
            })
            .min_by(|(a, _), (b, _)| {
                let da = face_center_distance(a);
                let db = face_center_distance(b);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });

        match candidate {
            Some((_, descriptor)) => {
                state.face_detected = true;
                if let Some(distance) = descriptor.euclidean_distance(identity) {
                    state.unauthorized_person = distance > self.identity_threshold;
                }
            }
            None => {
                state.face_detected = false;
            }
        }
    }

    /// Labels of detections that are in the forbidden set with confidence
    /// strictly above the configured threshold.
    fn forbidden_objects(&self, observation: &Observation) -> BTreeSet<String> {
        observation
            .objects
            .iter()
            .filter(|object| object.confidence > self.object_confidence)
            .map(|object| object.label.to_lowercase())
            .filter(|label| self.forbidden.contains(label))
            .collect()
    }
}

fn face_center_distance(face: &FaceObservation) -> f64 {
    face.bbox.center().manhattan_distance(&Point::FRAME_CENTER)
}
