//! # examguard-core
//!
//! Core monitoring logic for ExamGuard -- a real-time remote-proctoring
//! session monitor.
//!
//! This crate owns everything between the perception adapters and the
//! presentation boundary: the observation and warning data model, the
//! calibration baseline (identity descriptor + reference head position),
//! the per-tick frame evaluator, and the severity-ordered alert
//! prioritizer. The scheduler that drives these on a fixed cadence lives
//! in `examguard-daemon`; the adapter traits live in `examguard-sensor`.

pub mod alert;
pub mod baseline;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod types;

pub use alert::Alert;
pub use baseline::{BaselineManager, BaselineStore};
pub use config::GuardConfig;
pub use error::{CaptureError, InvalidDescriptor, SensorError};
pub use evaluate::{is_centered, EvalMode, FrameEvaluator};
pub use types::{
    BoundingBox, Descriptor, FaceObservation, ObjectDetection, Observation, Point,
    PoseObservation, WarningState,
};
