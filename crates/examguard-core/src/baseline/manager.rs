//! Baseline establishment and maintenance.
//!
//! Two anchors are managed per session: the identity descriptor, captured
//! exactly once and immutable until an explicit reset, and the reference
//! head position, which follows the most recent centered position rather
//! than the original capture position. Anchoring on "last known good" lets
//! the baseline absorb legitimate small recalibrations (a chair shift, a
//! posture change) while still catching sustained drift within a tick
//! window.

use tracing::{debug, info, warn};

use crate::config::{CenteringConfig, LightingConfig};
use crate::error::CaptureError;
use crate::evaluate::is_centered;
use crate::types::{Descriptor, Observation, Point};

use super::store::BaselineStore;

const KEY_REFERENCE_HEAD: &str = "reference_head";
const KEY_CAPTURED_LANDMARKS: &str = "captured_landmarks";

/// Owns the session baseline and its persistence.
pub struct BaselineManager {
    identity: Option<Descriptor>,
    reference_head: Option<Point>,
    captured_landmarks: Vec<Point>,
    store: BaselineStore,
}

impl BaselineManager {
    /// Create a manager over the given store, rehydrating the reference
    /// head position and landmark snapshot persisted by a previous run.
    ///
    /// The identity descriptor is deliberately NOT rehydrated: it is scoped
    /// to the session lifetime and must be recaptured after a restart.
    pub fn new(store: BaselineStore) -> Self {
        let reference_head = match store.get::<Point>(KEY_REFERENCE_HEAD) {
            Ok(point) => point,
            Err(e) => {
                warn!(error = %e, "failed to rehydrate reference head position");
                None
            }
        };
        let captured_landmarks = match store.get::<Vec<Point>>(KEY_CAPTURED_LANDMARKS) {
            Ok(landmarks) => landmarks.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "failed to rehydrate captured landmarks");
                Vec::new()
            }
        };
        Self {
            identity: None,
            reference_head,
            captured_landmarks,
            store,
        }
    }

    /// The captured identity descriptor, if any.
    pub fn identity(&self) -> Option<&Descriptor> {
        self.identity.as_ref()
    }

    /// Whether the baseline identity has been captured this session.
    pub fn is_captured(&self) -> bool {
        self.identity.is_some()
    }

    /// The current reference head position, if one has been established.
    pub fn reference_head(&self) -> Option<Point> {
        self.reference_head
    }

    /// The landmark snapshot persisted at capture time.
    pub fn captured_landmarks(&self) -> &[Point] {
        &self.captured_landmarks
    }

    /// Attempt to capture the baseline identity from the given observation.
    ///
    /// Preconditions, checked in order: the identity must not already be
    /// captured, some detected head must be centered, and the lighting
    /// level must fall inside the configured band. On success the
    /// descriptor of the best (most-centered, or sole) face is stored, the
    /// winning pose's landmark snapshot and the reference head position are
    /// persisted, and the descriptor is returned. A second call after
    /// success is rejected with [`CaptureError::AlreadyCaptured`] and
    /// performs no work.
    pub fn try_capture_identity(
        &mut self,
        observation: &Observation,
        lighting_level: f64,
        centering: &CenteringConfig,
        lighting: &LightingConfig,
    ) -> Result<Descriptor, CaptureError> {
        if self.identity.is_some() {
            return Err(CaptureError::AlreadyCaptured);
        }

        let centered_pose = observation
            .poses
            .iter()
            .find(|pose| is_centered(pose.nose, centering.tolerance))
            .ok_or(CaptureError::NoCenteredFace)?;

        if lighting_level < lighting.floor || lighting_level > lighting.ceiling {
            return Err(CaptureError::PoorLighting {
                level: lighting_level,
            });
        }

        // Best face: the one whose box center is L1-closest to frame
        // center, among faces with a usable descriptor.
        let descriptor = observation
            .faces
            .iter()
            .filter(|face| face.descriptor.is_some())
            .min_by(|a, b| {
                let da = a.bbox.center().manhattan_distance(&Point::FRAME_CENTER);
                let db = b.bbox.center().manhattan_distance(&Point::FRAME_CENTER);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(|face| face.descriptor.clone())
            .ok_or(CaptureError::NoFaceDetected)?;

        self.identity = Some(descriptor.clone());
        self.captured_landmarks = centered_pose.landmarks.clone();
        if let Err(e) = self
            .store
            .set(KEY_CAPTURED_LANDMARKS, &self.captured_landmarks)
        {
            warn!(error = %e, "failed to persist captured landmark snapshot");
        }
        self.update_reference_head(centered_pose.nose);

        info!(
            dimensions = descriptor.len(),
            landmarks = self.captured_landmarks.len(),
            "baseline identity captured"
        );
        Ok(descriptor)
    }

    /// Unconditionally overwrite the stored reference head position.
    ///
    /// Called whenever the current head position is judged centered; if no
    /// reference exists yet, any observed position becomes the reference.
    pub fn update_reference_head(&mut self, point: Point) {
        self.reference_head = Some(point);
        if let Err(e) = self.store.set(KEY_REFERENCE_HEAD, &point) {
            warn!(error = %e, "failed to persist reference head position");
        }
    }

    /// Clear both anchors and their persisted rows, re-entering the
    /// uncalibrated state. This is an explicit operator action.
    pub fn reset(&mut self) {
        self.identity = None;
        self.reference_head = None;
        self.captured_landmarks.clear();
        for key in [KEY_REFERENCE_HEAD, KEY_CAPTURED_LANDMARKS] {
            if let Err(e) = self.store.delete(key) {
                warn!(error = %e, key, "failed to clear persisted baseline key");
            }
        }
        debug!("baseline cleared");
    }
}
