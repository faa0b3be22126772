//! Offline replay of recorded frames through an [`Engine`].
//!
//! Frames are fed at a fixed simulated interval, so a recording replays the
//! same way every time regardless of how fast this machine is.

use assembly_guide_core::{Rectifier, RgbImage};
use assembly_guide_session::{Engine, EngineSnapshot, SessionError};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Simulated time between consecutive frames.
    pub frame_interval: Duration,
    /// Extra simulated time ticked after the last frame.
    pub drain: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(200),
            drain: Duration::ZERO,
        }
    }
}

/// A snapshot that differs from the previous one in step, page or status.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplayEvent {
    /// Index of the frame that caused the change; `None` during the drain.
    pub frame: Option<usize>,
    pub elapsed_ms: u64,
    pub snapshot: EngineSnapshot,
}

fn is_transition(prev: &EngineSnapshot, next: &EngineSnapshot) -> bool {
    prev.step_index != next.step_index || prev.page != next.page || prev.status != next.status
}

/// Run `frames` through `engine` and collect every transition.
///
/// The initial snapshot is always the first event. Replay stops early once
/// the preset completes.
pub fn replay<I>(
    engine: &mut Engine,
    rectifier: &Rectifier,
    frames: I,
    options: ReplayOptions,
    start: Instant,
) -> Result<Vec<ReplayEvent>, SessionError>
where
    I: IntoIterator<Item = RgbImage>,
{
    let mut last = engine.snapshot();
    let mut events = vec![ReplayEvent {
        frame: None,
        elapsed_ms: 0,
        snapshot: last.clone(),
    }];
    let mut elapsed = Duration::ZERO;

    let mut record = |engine: &Engine, frame: Option<usize>, elapsed: Duration| {
        let snap = engine.snapshot();
        if is_transition(&last, &snap) {
            log::debug!("t={}ms {:?}", elapsed.as_millis(), snap.status);
            events.push(ReplayEvent {
                frame,
                elapsed_ms: elapsed.as_millis() as u64,
                snapshot: snap.clone(),
            });
            last = snap;
        }
    };

    for (i, frame) in frames.into_iter().enumerate() {
        if engine.is_complete() {
            break;
        }
        if i > 0 {
            elapsed += options.frame_interval;
        }
        let now = start + elapsed;
        engine.tick(now)?;
        record(&*engine, Some(i), elapsed);
        engine.process_frame(rectifier, &frame.view(), now)?;
        record(&*engine, Some(i), elapsed);
    }

    let deadline = elapsed + options.drain;
    while !engine.is_complete() && elapsed < deadline {
        elapsed = (elapsed + options.frame_interval).min(deadline);
        engine.tick(start + elapsed)?;
        record(&*engine, None, elapsed);
    }

    Ok(events)
}
