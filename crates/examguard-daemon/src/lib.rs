//! ExamGuard session monitor orchestration.
//!
//! The [`Monitor`] is the sole driver of the evaluation flow: a single
//! cooperative loop ticking at a fixed period, pulling one observation
//! through the frame evaluator and alert prioritizer per tick. Ticks are
//! strictly serialized -- the next tick is not scheduled until the current
//! one resolves -- so the shared baseline needs no locking beyond "one
//! tick at a time". Operator interaction goes through the
//! [`MonitorHandle`]: read-only status snapshots plus the capture, reset,
//! and stop commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use examguard_core::{
    alert, evaluate::is_centered, BaselineManager, BaselineStore, EvalMode, FrameEvaluator,
    GuardConfig, WarningState,
};
use examguard_sensor::{FrameSource, SensorSet};

/// Session lifecycle phases.
///
/// `Calibrating -> Monitoring` happens only on a successful identity
/// capture. There is no automatic way back: re-entering `Calibrating`
/// requires an explicit reset, and `Terminated` is reached only by an
/// explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Perception collaborators not yet ready; no evaluation runs.
    Uninitialized,
    /// Collaborators ready, baseline identity not yet captured;
    /// pose-only evaluation keeps the centering feedback live.
    Calibrating,
    /// Baseline captured; the full evaluate-and-prioritize pipeline runs
    /// every tick.
    Monitoring,
    /// Scheduler stopped; no further ticks.
    Terminated,
}

/// Operator commands accepted by the monitor.
#[derive(Debug)]
enum MonitorCommand {
    RequestCapture,
    Reset,
    Stop,
}

/// Read-only status snapshot, republished after every tick and command.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// This tick's warning signal set, `active_message` included.
    pub warning: WarningState,
    /// Human-readable capture/centering feedback. Capture failures surface
    /// here as guidance; there is no separate fatal-error channel because
    /// nothing in a session's lifetime is unrecoverable.
    pub calibration_status: String,
}

/// Presentation boundary: read-only state plus the three commands.
#[derive(Clone)]
pub struct MonitorHandle {
    status_rx: watch::Receiver<SessionStatus>,
    cmd_tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// The latest published status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Current top-priority warning message; empty string means none.
    pub fn active_message(&self) -> String {
        self.status_rx.borrow().warning.active_message.clone()
    }

    /// Current capture/centering guidance.
    pub fn calibration_status(&self) -> String {
        self.status_rx.borrow().calibration_status.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.status_rx.borrow().phase
    }

    pub fn warning_state(&self) -> WarningState {
        self.status_rx.borrow().warning.clone()
    }

    /// A receiver for observing status changes as they are published.
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Trigger a baseline capture attempt.
    pub async fn request_capture(&self) {
        let _ = self.cmd_tx.send(MonitorCommand::RequestCapture).await;
    }

    /// Clear the baseline and return to calibration.
    pub async fn reset(&self) {
        let _ = self.cmd_tx.send(MonitorCommand::Reset).await;
    }

    /// End the session; the driver loop exits before its next tick.
    pub async fn stop(&self) {
        let _ = self.cmd_tx.send(MonitorCommand::Stop).await;
    }
}

/// The session monitor: drives evaluation on a fixed cadence.
pub struct Monitor {
    config: GuardConfig,
    frame_source: Arc<dyn FrameSource>,
    sensors: SensorSet,
    baseline: BaselineManager,
    evaluator: FrameEvaluator,
    phase: SessionPhase,
    warning: WarningState,
    calibration_status: String,
    status_tx: watch::Sender<SessionStatus>,
    cmd_rx: mpsc::Receiver<MonitorCommand>,
}

impl Monitor {
    /// Build a monitor and its presentation handle.
    pub fn new(
        config: GuardConfig,
        frame_source: Arc<dyn FrameSource>,
        sensors: SensorSet,
        store: BaselineStore,
    ) -> (Self, MonitorHandle) {
        let evaluator = FrameEvaluator::new(&config);
        let baseline = BaselineManager::new(store);
        let initial = SessionStatus {
            phase: SessionPhase::Uninitialized,
            warning: WarningState::default(),
            calibration_status: "Waiting for camera and perception models".to_string(),
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let monitor = Self {
            config,
            frame_source,
            sensors,
            baseline,
            evaluator,
            phase: SessionPhase::Uninitialized,
            warning: WarningState::default(),
            calibration_status: "Waiting for camera and perception models".to_string(),
            status_tx,
            cmd_rx,
        };
        (monitor, MonitorHandle { status_rx, cmd_tx })
    }

    /// Run the driver loop until the session is stopped.
    ///
    /// One tick at a time: the interval uses `Delay` missed-tick behavior,
    /// so a slow evaluation pushes subsequent ticks back instead of letting
    /// them overlap or burst.
    pub async fn run(mut self) -> Result<()> {
        info!(
            tick_ms = self.config.scheduler.tick_ms,
            "session monitor starting"
        );
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.scheduler.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::RequestCapture) => self.handle_capture().await,
                        Some(MonitorCommand::Reset) => self.handle_reset(),
                        Some(MonitorCommand::Stop) | None => self.terminate(),
                    }
                }
            }
            if self.phase == SessionPhase::Terminated {
                break;
            }
        }

        info!("session monitor stopped");
        Ok(())
    }

    /// One evaluation cycle.
    async fn tick(&mut self) {
        match self.phase {
            SessionPhase::Uninitialized => {
                if self.frame_source.ready() && self.sensors.ready() {
                    self.phase = SessionPhase::Calibrating;
                    self.calibration_status =
                        "Ready to calibrate: center your face and request capture".to_string();
                    info!("perception ready, entering calibration");
                    self.publish();
                }
            }
            SessionPhase::Calibrating => {
                let frame = match self.frame_source.grab() {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(error = %e, "no frame, skipping tick");
                        return;
                    }
                };
                let observation = self.sensors.observe_poses(&frame).await;
                let centered = observation
                    .poses
                    .iter()
                    .any(|pose| is_centered(pose.nose, self.config.centering.tolerance));
                self.warning =
                    self.evaluator
                        .evaluate(&observation, &mut self.baseline, EvalMode::Calibration);
                self.calibration_status = if centered {
                    "Face centered: ready to capture".to_string()
                } else {
                    "Center your face in the frame".to_string()
                };
                self.publish();
            }
            SessionPhase::Monitoring => {
                let frame = match self.frame_source.grab() {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(error = %e, "no frame, skipping tick");
                        return;
                    }
                };
                let observation = self.sensors.observe(&frame).await;
                let mut state =
                    self.evaluator
                        .evaluate(&observation, &mut self.baseline, EvalMode::Monitoring);
                state.active_message =
                    alert::resolve_message(&state, self.config.drift.alert_threshold);
                if !state.active_message.is_empty()
                    && state.active_message != self.warning.active_message
                {
                    info!(message = %state.active_message, "alert raised");
                }
                self.warning = state;
                self.publish();
            }
            SessionPhase::Terminated => {}
        }
    }

    /// Run a capture attempt and surface its outcome as guidance.
    async fn handle_capture(&mut self) {
        match self.phase {
            SessionPhase::Uninitialized => {
                self.calibration_status =
                    "Camera and perception models are still initializing".to_string();
                self.publish();
            }
            SessionPhase::Terminated => {}
            SessionPhase::Calibrating | SessionPhase::Monitoring => {
                // Fixed settle latency before the gating decision resolves,
                // so a UI-facing caller can reflect the centering overlay
                // first. Applies to capture only, never to steady-state
                // monitoring ticks.
                tokio::time::sleep(Duration::from_millis(self.config.centering.settle_ms)).await;

                let frame = match self.frame_source.grab() {
                    Ok(frame) => frame,
                    Err(_) => {
                        self.calibration_status = "No camera frame available yet".to_string();
                        self.publish();
                        return;
                    }
                };
                let observation = self.sensors.observe(&frame).await;
                let lighting = frame.mean_luma();
                match self.baseline.try_capture_identity(
                    &observation,
                    lighting,
                    &self.config.centering,
                    &self.config.lighting,
                ) {
                    Ok(_) => {
                        self.phase = SessionPhase::Monitoring;
                        self.calibration_status =
                            "Baseline captured: monitoring active".to_string();
                        info!("calibration complete, monitoring started");
                    }
                    Err(e) => {
                        debug!(error = %e, "capture attempt rejected");
                        self.calibration_status = e.guidance();
                    }
                }
                self.publish();
            }
        }
    }

    /// Clear the baseline and re-enter calibration.
    fn handle_reset(&mut self) {
        self.baseline.reset();
        self.warning = WarningState::default();
        if matches!(
            self.phase,
            SessionPhase::Calibrating | SessionPhase::Monitoring
        ) {
            self.phase = SessionPhase::Calibrating;
        }
        self.calibration_status =
            "Baseline cleared: recalibrate to resume monitoring".to_string();
        info!("session baseline reset");
        self.publish();
    }

    /// End the session: tear down the baseline anchors and stop ticking.
    fn terminate(&mut self) {
        self.baseline.reset();
        self.phase = SessionPhase::Terminated;
        self.calibration_status = "Session ended".to_string();
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(SessionStatus {
            phase: self.phase,
            warning: self.warning.clone(),
            calibration_status: self.calibration_status.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examguard_sensor::mock::{
        ScriptedFaces, ScriptedFrameSource, ScriptedObjects, ScriptedPoses,
    };

    fn make_monitor() -> (Monitor, MonitorHandle) {
        let sensors = SensorSet::new(
            Arc::new(ScriptedPoses::always(Vec::new())),
            Arc::new(ScriptedFaces::always(Vec::new())),
            Arc::new(ScriptedObjects::always(Vec::new())),
        );
        Monitor::new(
            GuardConfig::default(),
            Arc::new(ScriptedFrameSource::with_luma(128)),
            sensors,
            BaselineStore::open_in_memory().unwrap(),
        )
    }

    #[test]
    fn monitor_starts_uninitialized() {
        let (_monitor, handle) = make_monitor();
        assert_eq!(handle.phase(), SessionPhase::Uninitialized);
        assert_eq!(handle.active_message(), "");
        assert!(!handle.calibration_status().is_empty());
    }

    #[tokio::test]
    async fn stop_terminates_and_clears_baseline() {
        let (monitor, handle) = make_monitor();
        let task = tokio::spawn(monitor.run());

        handle.stop().await;
        task.await.unwrap().unwrap();
        assert_eq!(handle.phase(), SessionPhase::Terminated);
    }
}
