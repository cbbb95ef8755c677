//! ExamGuard daemon binary entry point.
//!
//! Runs the session monitor against the scripted perception rig. Real
//! deployments embed `examguard-daemon` as a library and supply
//! hardware-backed `FrameSource` and detector adapters instead.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use examguard_core::{
    BaselineStore, BoundingBox, Descriptor, FaceObservation, GuardConfig, Point, PoseObservation,
};
use examguard_daemon::Monitor;
use examguard_sensor::mock::{
    ScriptedFaces, ScriptedFrameSource, ScriptedObjects, ScriptedPoses,
};
use examguard_sensor::SensorSet;

/// ExamGuard daemon - real-time remote-proctoring session monitor.
#[derive(Parser, Debug)]
#[command(name = "examguard-daemon", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "examguard.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config =
        GuardConfig::load(Path::new(&args.config)).context("loading configuration")?;
    info!(config = %args.config, "examguard-daemon starting");

    let store = BaselineStore::open(&config.store.path).context("opening baseline store")?;

    let descriptor =
        Descriptor::new(vec![0.0; 128]).context("building scripted descriptor")?;
    let frame_source = Arc::new(ScriptedFrameSource::with_luma(128));
    let sensors = SensorSet::new(
        Arc::new(ScriptedPoses::always(vec![PoseObservation::at(Point::new(
            0.5, 0.5,
        ))])),
        Arc::new(ScriptedFaces::always(vec![FaceObservation {
            bbox: BoundingBox::new(0.4, 0.4, 0.2, 0.2),
            descriptor: Some(descriptor),
        }])),
        Arc::new(ScriptedObjects::always(Vec::new())),
    );

    let (monitor, handle) = Monitor::new(config, frame_source, sensors, store);
    let monitor_task = tokio::spawn(monitor.run());

    // Mirror published status transitions into the log.
    let mut status_rx = handle.watch();
    let log_task = tokio::spawn(async move {
        loop {
            {
                let status = status_rx.borrow_and_update().clone();
                info!(
                    phase = ?status.phase,
                    message = %status.warning.active_message,
                    calibration = %status.calibration_status,
                    "session status"
                );
            }
            if status_rx.changed().await.is_err() {
                break;
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.stop().await;
    monitor_task.await??;
    log_task.abort();

    Ok(())
}
