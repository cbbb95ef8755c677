//! End-to-end session scenarios against scripted perception.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use examguard_core::{
    BaselineStore, BoundingBox, Descriptor, FaceObservation, GuardConfig, ObjectDetection, Point,
    PoseObservation,
};
use examguard_daemon::{Monitor, MonitorHandle, SessionPhase, SessionStatus};
use examguard_sensor::mock::{
    ScriptedFaces, ScriptedFrameSource, ScriptedObjects, ScriptedPoses,
};
use examguard_sensor::SensorSet;

struct Rig {
    frame_source: Arc<ScriptedFrameSource>,
    poses: Arc<ScriptedPoses>,
    faces: Arc<ScriptedFaces>,
    objects: Arc<ScriptedObjects>,
    handle: MonitorHandle,
    task: JoinHandle<anyhow::Result<()>>,
}

fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.scheduler.tick_ms = 10;
    config.centering.settle_ms = 1;
    config
}

fn identity_descriptor() -> Descriptor {
    Descriptor::new(vec![0.0; 16]).unwrap()
}

fn centered_pose() -> PoseObservation {
    PoseObservation::at(Point::new(0.5, 0.5))
}

fn face_with(descriptor: Option<Descriptor>) -> FaceObservation {
    FaceObservation {
        bbox: BoundingBox::new(0.4, 0.4, 0.2, 0.2),
        descriptor,
    }
}

/// Launch a monitor over a rig whose fallback scene is a single centered,
/// matching person with no objects in view.
fn launch() -> Rig {
    let frame_source = Arc::new(ScriptedFrameSource::with_luma(128));
    let poses = Arc::new(ScriptedPoses::always(vec![centered_pose()]));
    let faces = Arc::new(ScriptedFaces::always(vec![face_with(Some(
        identity_descriptor(),
    ))]));
    let objects = Arc::new(ScriptedObjects::always(Vec::new()));

    let sensors = SensorSet::new(poses.clone(), faces.clone(), objects.clone());
    let (monitor, handle) = Monitor::new(
        test_config(),
        frame_source.clone(),
        sensors,
        BaselineStore::open_in_memory().unwrap(),
    );
    let task = tokio::spawn(monitor.run());

    Rig {
        frame_source,
        poses,
        faces,
        objects,
        handle,
        task,
    }
}

/// Wait until the published status satisfies the predicate.
async fn wait_for<F>(rx: &mut watch::Receiver<SessionStatus>, pred: F) -> SessionStatus
where
    F: Fn(&SessionStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let status = rx.borrow();
                if pred(&status) {
                    return status.clone();
                }
            }
            rx.changed().await.expect("monitor dropped its status channel");
        }
    })
    .await
    .expect("timed out waiting for expected session status")
}

async fn calibrate(rig: &Rig) {
    let mut rx = rig.handle.watch();
    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;
    rig.handle.request_capture().await;
    wait_for(&mut rx, |s| s.phase == SessionPhase::Monitoring).await;
}

#[tokio::test]
async fn session_reaches_monitoring_after_capture() {
    let rig = launch();
    let mut rx = rig.handle.watch();

    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;
    rig.handle.request_capture().await;
    let status = wait_for(&mut rx, |s| s.phase == SessionPhase::Monitoring).await;

    assert!(status.calibration_status.contains("captured"));

    // A compliant scene raises no warning.
    let status = wait_for(&mut rx, |s| {
        s.phase == SessionPhase::Monitoring && s.warning.face_detected
    })
    .await;
    assert_eq!(status.warning.active_message, "");

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn monitor_waits_out_the_initialization_window() {
    let rig = launch();
    rig.poses.set_ready(false);

    // Several tick periods pass without leaving Uninitialized.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(rig.handle.phase(), SessionPhase::Uninitialized);

    rig.poses.set_ready(true);
    let mut rx = rig.handle.watch();
    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn off_center_capture_is_rejected_with_guidance() {
    let rig = launch();
    rig.poses
        .set_fallback(vec![PoseObservation::at(Point::new(0.8, 0.5))]);

    let mut rx = rig.handle.watch();
    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;
    rig.handle.request_capture().await;

    // The gate holds: several ticks later the session is still calibrating
    // and the centering feedback is live.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(rig.handle.phase(), SessionPhase::Calibrating);
    assert!(rig
        .handle
        .calibration_status()
        .contains("Center your face"));

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn poor_lighting_blocks_capture_until_fixed() {
    let rig = launch();
    rig.frame_source.set_luma(5);

    let mut rx = rig.handle.watch();
    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;
    rig.handle.request_capture().await;

    // The lighting gate holds: several ticks later the session is still
    // calibrating.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(rig.handle.phase(), SessionPhase::Calibrating);

    // Fixing the lighting lets the same session capture.
    rig.frame_source.set_luma(128);
    rig.handle.request_capture().await;
    wait_for(&mut rx, |s| s.phase == SessionPhase::Monitoring).await;

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn multiple_people_outrank_every_other_signal() {
    let rig = launch();
    calibrate(&rig).await;

    // Two people, a stranger's face, and a forbidden object all at once:
    // the multi-person warning must win.
    rig.poses.set_fallback(vec![
        centered_pose(),
        PoseObservation::at(Point::new(0.2, 0.4)),
    ]);
    rig.faces
        .set_fallback(vec![face_with(Some(Descriptor::new(vec![5.0; 16]).unwrap()))]);
    rig.objects.set_fallback(vec![ObjectDetection {
        label: "phone".to_string(),
        confidence: 0.95,
    }]);

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| s.warning.multiple_people).await;
    assert!(status
        .warning
        .active_message
        .contains("more than one person"));

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unauthorized_face_raises_identity_alert() {
    let rig = launch();
    calibrate(&rig).await;

    // Distance 0.9 from the baseline on the first dimension.
    let mut stranger = vec![0.0; 16];
    stranger[0] = 0.9;
    rig.faces
        .set_fallback(vec![face_with(Some(Descriptor::new(stranger).unwrap()))]);

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| s.warning.unauthorized_person).await;
    assert!(status.warning.active_message.contains("Unauthorized"));

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn empty_scene_reports_no_face_not_unauthorized() {
    let rig = launch();
    calibrate(&rig).await;

    rig.poses.set_fallback(Vec::new());
    rig.faces.set_fallback(Vec::new());

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| {
        s.phase == SessionPhase::Monitoring && !s.warning.face_detected
    })
    .await;
    assert!(status.warning.active_message.contains("No face"));
    assert!(!status.warning.unauthorized_person);

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn forbidden_object_alert_enumerates_labels() {
    let rig = launch();
    calibrate(&rig).await;

    rig.objects.set_fallback(vec![
        ObjectDetection {
            label: "Phone".to_string(),
            confidence: 0.9,
        },
        ObjectDetection {
            label: "book".to_string(),
            confidence: 0.8,
        },
    ]);

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| !s.warning.forbidden_objects.is_empty()).await;
    assert!(status.warning.active_message.contains("book, phone"));

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn sustained_drift_raises_movement_alert() {
    let rig = launch();
    calibrate(&rig).await;

    // Head shifts off-center: the reference stays at the last centered
    // position, so drift accumulates past the threshold.
    rig.poses
        .set_fallback(vec![PoseObservation::at(Point::new(0.62, 0.5))]);

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| s.warning.horizontal_drift > 0.02).await;
    assert!(status.warning.active_message.contains("movement"));

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn object_detector_outage_degrades_gracefully() {
    let rig = launch();
    calibrate(&rig).await;

    // The object stream goes away mid-session; monitoring continues with
    // the remaining modalities instead of failing the tick.
    rig.objects.set_ready(false);

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| {
        s.phase == SessionPhase::Monitoring && s.warning.face_detected
    })
    .await;
    assert!(status.warning.forbidden_objects.is_empty());
    assert_eq!(status.warning.active_message, "");

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn second_capture_reports_already_captured() {
    let rig = launch();
    calibrate(&rig).await;

    rig.handle.request_capture().await;

    let mut rx = rig.handle.watch();
    let status = wait_for(&mut rx, |s| s.calibration_status.contains("already")).await;
    assert_eq!(status.phase, SessionPhase::Monitoring);

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn reset_returns_to_calibration_and_allows_recapture() {
    let rig = launch();
    calibrate(&rig).await;

    rig.handle.reset().await;
    let mut rx = rig.handle.watch();
    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;

    // After the reset the session can establish a fresh baseline.
    rig.handle.request_capture().await;
    wait_for(&mut rx, |s| s.phase == SessionPhase::Monitoring).await;

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_ends_the_session() {
    let rig = launch();
    let mut rx = rig.handle.watch();
    wait_for(&mut rx, |s| s.phase == SessionPhase::Calibrating).await;

    rig.handle.stop().await;
    rig.task.await.unwrap().unwrap();
    assert_eq!(rig.handle.phase(), SessionPhase::Terminated);
}
