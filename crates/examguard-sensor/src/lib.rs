//! # examguard-sensor
//!
//! The perception adapter boundary. The pose, face, and object models are
//! opaque external collaborators; this crate defines the traits they are
//! consumed through and the [`SensorSet`] that gathers one normalized
//! [`Observation`] per tick.
//!
//! Adapter contract: zero detections is a valid empty result, never an
//! error. An adapter fails with [`SensorError::PerceptionUnavailable`]
//! only while its underlying model is still initializing. No two calls
//! run concurrently against the same model instance -- each adapter takes
//! `&self` and is driven by one strictly serialized tick at a time --
//! while the three modalities are fanned out concurrently per tick since
//! they touch independent model instances.

pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use examguard_core::{
    FaceObservation, ObjectDetection, Observation, PoseObservation, SensorError,
};

/// One decoded video frame from the capture source.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Luma plane, row-major, one byte per pixel.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    /// Mean luma across the frame, in `[0, 255]`.
    ///
    /// This is the lighting estimate the capture gate checks against the
    /// configured acceptance band.
    pub fn mean_luma(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&b| u64::from(b)).sum();
        sum as f64 / self.data.len() as f64
    }
}

/// A live video frame source.
pub trait FrameSource: Send + Sync {
    /// Whether a decodable frame is currently available.
    fn ready(&self) -> bool;

    /// Grab the current decoded frame.
    ///
    /// Fails with [`SensorError::FrameNotReady`] when the source has no
    /// decodable frame yet (e.g. stream metadata not loaded).
    fn grab(&self) -> Result<Frame, SensorError>;
}

/// Body-pose landmark detection.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    /// Whether the underlying model has finished initializing.
    fn ready(&self) -> bool;

    async fn detect(
        &self,
        frame: &Frame,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<PoseObservation>, SensorError>;
}

/// Face detection with embedding extraction.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Whether the underlying model has finished initializing.
    fn ready(&self) -> bool;

    async fn detect(
        &self,
        frame: &Frame,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<FaceObservation>, SensorError>;
}

/// Object classification.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Whether the underlying model has finished initializing.
    fn ready(&self) -> bool;

    async fn detect(
        &self,
        frame: &Frame,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<ObjectDetection>, SensorError>;
}

/// The three perception adapters bundled behind one per-tick gather call.
pub struct SensorSet {
    poses: Arc<dyn PoseDetector>,
    faces: Arc<dyn FaceDetector>,
    objects: Arc<dyn ObjectDetector>,
}

impl SensorSet {
    pub fn new(
        poses: Arc<dyn PoseDetector>,
        faces: Arc<dyn FaceDetector>,
        objects: Arc<dyn ObjectDetector>,
    ) -> Self {
        Self {
            poses,
            faces,
            objects,
        }
    }

    /// Whether every perception collaborator has finished initializing.
    pub fn ready(&self) -> bool {
        self.poses.ready() && self.faces.ready() && self.objects.ready()
    }

    /// Gather a full observation: all three modalities run concurrently.
    ///
    /// A modality that is unavailable this tick degrades to "no
    /// detections" rather than failing the whole observation.
    pub async fn observe(&self, frame: &Frame) -> Observation {
        let timestamp = frame.timestamp;
        let (poses, faces, objects) = tokio::join!(
            self.poses.detect(frame, timestamp),
            self.faces.detect(frame, timestamp),
            self.objects.detect(frame, timestamp),
        );

        Observation {
            timestamp,
            poses: drain_or_empty("pose", poses),
            faces: drain_or_empty("face", faces),
            objects: drain_or_empty("object", objects),
        }
    }

    /// Gather a pose-only observation, used while calibrating to keep the
    /// centering feedback live without running the heavier modalities.
    pub async fn observe_poses(&self, frame: &Frame) -> Observation {
        let timestamp = frame.timestamp;
        let poses = self.poses.detect(frame, timestamp).await;
        Observation {
            timestamp,
            poses: drain_or_empty("pose", poses),
            faces: Vec::new(),
            objects: Vec::new(),
        }
    }
}

fn drain_or_empty<T>(modality: &str, result: Result<Vec<T>, SensorError>) -> Vec<T> {
    match result {
        Ok(detections) => {
            debug!(modality, count = detections.len(), "adapter detections");
            detections
        }
        Err(e) => {
            warn!(modality, error = %e, "adapter unavailable this tick");
            Vec::new()
        }
    }
}
