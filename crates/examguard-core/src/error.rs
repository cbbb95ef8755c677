//! Error taxonomy for the monitoring pipeline.
//!
//! Nothing in steady-state monitoring is fatal: sensor errors degrade the
//! affected tick to "insufficient signal" and the loop continues, while
//! capture failures are surfaced to the caller as actionable guidance on
//! the calibration status channel. Only explicit session termination stops
//! the loop.

use thiserror::Error;

/// Errors from the perception adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorError {
    /// The underlying model has not finished initializing. Recoverable --
    /// the scheduler retries on the next tick.
    #[error("perception collaborator '{modality}' is not ready")]
    PerceptionUnavailable { modality: &'static str },

    /// The capture source has no decodable frame yet (e.g. metadata not
    /// loaded). Recoverable -- the current tick is skipped.
    #[error("no decodable frame available")]
    FrameNotReady,
}

/// A malformed embedding from the perception layer.
///
/// The affected face is dropped from consideration for that tick only.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid face descriptor: {reason}")]
pub struct InvalidDescriptor {
    pub reason: &'static str,
}

/// Baseline capture precondition failures.
///
/// These are guidance to the test-taker, not session-halting conditions;
/// all of them flow through the same calibration status channel as normal
/// feedback.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    /// No detected head landmark was within the centering tolerance.
    #[error("no centered face in frame")]
    NoCenteredFace,

    /// Lighting level outside the acceptable band.
    #[error("lighting level {level:.0} outside the acceptable band")]
    PoorLighting { level: f64 },

    /// Framing was correct but no face with a usable descriptor was found.
    #[error("no face detected")]
    NoFaceDetected,

    /// The baseline identity has already been captured this session.
    #[error("baseline identity already captured")]
    AlreadyCaptured,
}

impl CaptureError {
    /// Actionable guidance for the calibration status channel.
    pub fn guidance(&self) -> String {
        match self {
            Self::NoCenteredFace => {
                "Center your face in the frame before capturing".to_string()
            }
            Self::PoorLighting { level } => format!(
                "Lighting is unsuitable for capture (level {level:.0}); adjust the room lighting"
            ),
            Self::NoFaceDetected => {
                "No face detected; make sure your face is visible to the camera".to_string()
            }
            Self::AlreadyCaptured => {
                "Baseline already captured; reset the session to recalibrate".to_string()
            }
        }
    }
}
