//! Scripted perception implementations.
//!
//! These stand in for the real model collaborators in tests and in the
//! daemon's demo rig: each detector plays back a queued script of per-tick
//! detection sets, then repeats a fallback once the script is exhausted.
//! Readiness is toggleable so initialization windows can be exercised.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use examguard_core::{FaceObservation, ObjectDetection, PoseObservation, SensorError};

use crate::{FaceDetector, Frame, FrameSource, ObjectDetector, PoseDetector};

/// A frame source producing synthetic uniform-luma frames.
pub struct ScriptedFrameSource {
    luma: Mutex<u8>,
    ready: AtomicBool,
}

impl ScriptedFrameSource {
    /// A ready source whose frames have the given uniform luma.
    pub fn with_luma(luma: u8) -> Self {
        Self {
            luma: Mutex::new(luma),
            ready: AtomicBool::new(true),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Change the luma of subsequently grabbed frames.
    pub fn set_luma(&self, luma: u8) {
        *self.luma.lock().unwrap() = luma;
    }
}

impl FrameSource for ScriptedFrameSource {
    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn grab(&self) -> Result<Frame, SensorError> {
        if !self.ready() {
            return Err(SensorError::FrameNotReady);
        }
        let luma = *self.luma.lock().unwrap();
        Ok(Frame {
            data: vec![luma; 64 * 64],
            width: 64,
            height: 64,
            timestamp: Utc::now(),
        })
    }
}

/// Shared playback state for a scripted detector.
struct Script<T> {
    queue: Mutex<VecDeque<Vec<T>>>,
    fallback: Mutex<Vec<T>>,
    ready: AtomicBool,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Vec<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            ready: AtomicBool::new(true),
        }
    }

    fn push(&self, detections: Vec<T>) {
        self.queue.lock().unwrap().push_back(detections);
    }

    fn set_fallback(&self, detections: Vec<T>) {
        *self.fallback.lock().unwrap() = detections;
    }

    fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn next(&self, modality: &'static str) -> Result<Vec<T>, SensorError> {
        if !self.ready() {
            return Err(SensorError::PerceptionUnavailable { modality });
        }
        match self.queue.lock().unwrap().pop_front() {
            Some(detections) => Ok(detections),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

macro_rules! scripted_detector {
    ($name:ident, $trait:ident, $item:ty, $modality:literal) => {
        /// Scripted stand-in for the real detector.
        pub struct $name {
            script: Script<$item>,
        }

        impl $name {
            /// A detector that always reports the given detections.
            pub fn always(fallback: Vec<$item>) -> Self {
                Self {
                    script: Script::new(fallback),
                }
            }

            /// Queue the detections for the next call; once the queue is
            /// drained the fallback repeats.
            pub fn push(&self, detections: Vec<$item>) {
                self.script.push(detections);
            }

            /// Replace the fallback detections.
            pub fn set_fallback(&self, detections: Vec<$item>) {
                self.script.set_fallback(detections);
            }

            /// Toggle the initialized state; while not ready, `detect`
            /// fails with `PerceptionUnavailable`.
            pub fn set_ready(&self, ready: bool) {
                self.script.set_ready(ready);
            }
        }

        #[async_trait]
        impl $trait for $name {
            fn ready(&self) -> bool {
                self.script.ready()
            }

            async fn detect(
                &self,
                _frame: &Frame,
                _timestamp: DateTime<Utc>,
            ) -> Result<Vec<$item>, SensorError> {
                self.script.next($modality)
            }
        }
    };
}

scripted_detector!(ScriptedPoses, PoseDetector, PoseObservation, "pose");
scripted_detector!(ScriptedFaces, FaceDetector, FaceObservation, "face");
scripted_detector!(ScriptedObjects, ObjectDetector, ObjectDetection, "object");
