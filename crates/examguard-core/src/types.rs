//! Observation and warning types for ExamGuard.
//!
//! Observations are the fundamental data unit flowing through the monitor.
//! They are produced once per tick by the perception adapters and exist
//! only for the duration of that tick's evaluation; the derived
//! [`WarningState`] replaces the previous tick's value wholesale, so no
//! warning ever accumulates hidden cross-tick memory.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidDescriptor;

/// A point in normalized frame coordinates, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Center of the frame in normalized coordinates.
    pub const FRAME_CENTER: Point = Point { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Manhattan (L1) distance to another point.
    ///
    /// Used as the tie-break metric when several faces are in frame: the
    /// face whose bounding-box center is L1-closest to the frame center is
    /// the one checked against the baseline identity.
    pub fn manhattan_distance(&self, other: &Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// An axis-aligned bounding box in normalized frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A fixed-length face embedding vector.
///
/// Descriptors come from the face perception collaborator and are compared
/// with plain Euclidean distance. Construction validates the raw embedding;
/// a malformed one is rejected so the affected face is dropped from
/// consideration for the current tick only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    /// Validate a raw embedding from the perception layer.
    pub fn new(values: Vec<f32>) -> Result<Self, InvalidDescriptor> {
        if values.is_empty() {
            return Err(InvalidDescriptor {
                reason: "empty embedding",
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(InvalidDescriptor {
                reason: "non-finite component",
            });
        }
        Ok(Self(values))
    }

    /// Number of dimensions in the embedding.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean (L2) distance to another embedding.
    ///
    /// Returns `None` when the two embeddings have different dimensions --
    /// such a descriptor is unusable against this baseline.
    pub fn euclidean_distance(&self, other: &Descriptor) -> Option<f64> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = (*a - *b) as f64;
                d * d
            })
            .sum();
        Some(sum.sqrt())
    }
}

/// One detected person skeleton.
///
/// The nose landmark is the head-position signal the monitor tracks; the
/// full landmark list is what gets snapshotted into the baseline store at
/// capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseObservation {
    /// Head/nose landmark in normalized coordinates.
    pub nose: Point,
    /// All landmarks reported by the pose collaborator.
    pub landmarks: Vec<Point>,
}

impl PoseObservation {
    /// A pose with only the nose landmark known.
    pub fn at(nose: Point) -> Self {
        Self {
            nose,
            landmarks: vec![nose],
        }
    }
}

/// One detected face: a bounding box plus an optional embedding.
///
/// The descriptor is `None` when the face collaborator found a face but
/// could not extract a usable embedding for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bbox: BoundingBox,
    pub descriptor: Option<Descriptor>,
}

/// One classified item in frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    /// Category label as reported by the object collaborator.
    pub label: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A per-tick snapshot from the signal adapters.
///
/// Ephemeral: never persisted, consumed by exactly one evaluation pass.
/// Empty collections are valid results -- zero detections is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub poses: Vec<PoseObservation>,
    pub faces: Vec<FaceObservation>,
    pub objects: Vec<ObjectDetection>,
}

impl Observation {
    /// An observation with no detections in any modality.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            poses: Vec::new(),
            faces: Vec::new(),
            objects: Vec::new(),
        }
    }
}

/// The signal set derived from one tick, replacing the previous tick's
/// value entirely.
///
/// `active_message` is always derivable purely from the other fields (see
/// [`crate::alert`]); it is overwritten every tick and never accumulated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningState {
    /// More than one person detected in frame.
    pub multiple_people: bool,
    /// A face with a usable descriptor is present.
    pub face_detected: bool,
    /// The best-centered face's embedding does not match the baseline.
    pub unauthorized_person: bool,
    /// Horizontal displacement of the head from the reference position.
    pub horizontal_drift: f64,
    /// Vertical displacement of the head from the reference position.
    pub vertical_drift: f64,
    /// Labels of forbidden items currently in frame.
    pub forbidden_objects: BTreeSet<String>,
    /// The single warning surfaced to the operator; empty means none.
    pub active_message: String,
}
