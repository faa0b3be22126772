//! Async capture → detect → render plumbing.
//!
//! Every hop is a `tokio::sync::watch` slot: a slow consumer only ever sees
//! the newest value and never builds a backlog. Rectification and detection
//! run on the blocking pool; the engine itself stays on the pipeline task.

use crate::engine::{Engine, EngineSnapshot};
use crate::error::{DeviceError, PipelineError, SessionError};
use assembly_guide_core::{Rectifier, RgbImage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Latest output of the capture device.
#[derive(Clone, Debug, Default)]
pub enum FrameSlot {
    #[default]
    Empty,
    Frame(Arc<RgbImage>),
    /// The device stopped delivering frames.
    Lost(String),
}

/// Handle to a running pipeline task.
pub struct Pipeline {
    frames: watch::Sender<FrameSlot>,
    rectifier: watch::Sender<Arc<Rectifier>>,
    snapshots: watch::Receiver<EngineSnapshot>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<Engine, PipelineError>>,
}

impl Pipeline {
    /// Spawn the pipeline on the current runtime.
    ///
    /// `tick_period` only sets how often deadlines are polled; countdown and
    /// dwell lengths come from the engine config.
    pub fn spawn(engine: Engine, rectifier: Arc<Rectifier>, tick_period: Duration) -> Self {
        let (frames, frames_rx) = watch::channel(FrameSlot::Empty);
        let (rectifier, rectifier_rx) = watch::channel(rectifier);
        let (snapshots_tx, snapshots) = watch::channel(engine.snapshot());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(
            engine,
            frames_rx,
            rectifier_rx,
            snapshots_tx,
            shutdown_rx,
            tick_period,
        ));

        Self {
            frames,
            rectifier,
            snapshots,
            shutdown,
            task,
        }
    }

    /// Publish a captured frame, replacing any frame not yet picked up.
    pub fn publish_frame(&self, frame: RgbImage) {
        self.frames.send_replace(FrameSlot::Frame(Arc::new(frame)));
    }

    /// Report that the capture device is gone.
    pub fn capture_lost(&self, reason: impl Into<String>) {
        self.frames.send_replace(FrameSlot::Lost(reason.into()));
    }

    /// Swap in a new calibration. Frames already in flight finish with the old one.
    pub fn set_rectifier(&self, rectifier: Arc<Rectifier>) {
        self.rectifier.send_replace(rectifier);
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> EngineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the task to end and hand back the engine.
    pub async fn join(self) -> Result<Engine, PipelineError> {
        self.task.await?
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn run(
    mut engine: Engine,
    mut frames: watch::Receiver<FrameSlot>,
    mut rectifier: watch::Receiver<Arc<Rectifier>>,
    snapshots: watch::Sender<EngineSnapshot>,
    mut shutdown: watch::Receiver<bool>,
    tick_period: Duration,
) -> Result<Engine, PipelineError> {
    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("pipeline started at step {}", engine.step_index());

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    log::info!("pipeline shutdown requested");
                    break;
                }
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    log::info!("capture closed");
                    break;
                }
                let slot = frames.borrow_and_update().clone();
                let frame = match slot {
                    FrameSlot::Empty => continue,
                    FrameSlot::Lost(reason) => {
                        log::warn!("capture lost: {reason}");
                        return Err(DeviceError::CaptureLost(reason).into());
                    }
                    FrameSlot::Frame(frame) => frame,
                };

                let rect = rectifier.borrow_and_update().clone();
                let (expected_w, expected_h) = rect.frame_size();
                if (frame.width, frame.height) != (expected_w, expected_h) {
                    return Err(DeviceError::FrameSizeChanged {
                        expected_w,
                        expected_h,
                        got_w: frame.width,
                        got_h: frame.height,
                    }
                    .into());
                }

                let zones = engine.detection_zones();
                if zones.is_empty() {
                    continue;
                }
                let detector = engine.detector().clone();
                let readings = tokio::task::spawn_blocking(move || {
                    rect.rectify(&frame.view())
                        .map(|canonical| detector.detect(&canonical, &zones))
                })
                .await?
                .map_err(SessionError::from)?;

                match engine.apply_readings(&readings, now()) {
                    Ok(Some(event)) => log::debug!("{event:?}"),
                    Ok(None) => {}
                    Err(e) => return Err(abort(&engine, &snapshots, e)),
                }
            }
            _ = ticker.tick() => {
                match engine.tick(now()) {
                    Ok(Some(event)) => log::debug!("{event:?}"),
                    Ok(None) => {}
                    Err(e) => return Err(abort(&engine, &snapshots, e)),
                }
            }
        }

        snapshots.send_replace(engine.snapshot());
        if engine.is_complete() {
            log::info!("all steps complete");
            break;
        }
    }
    Ok(engine)
}

/// Publish the failed state so renderers see why the loop stopped.
fn abort(
    engine: &Engine,
    snapshots: &watch::Sender<EngineSnapshot>,
    err: SessionError,
) -> PipelineError {
    snapshots.send_replace(engine.snapshot());
    err.into()
}
