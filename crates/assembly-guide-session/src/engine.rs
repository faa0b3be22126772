//! Per-frame driver tying rectification, detection and sequencing together.
//!
//! The engine owns all mutable session state. Frames go in through
//! [`Engine::process_frame`] (or [`Engine::apply_readings`] when detection ran
//! elsewhere), time goes in through [`Engine::tick`], and renderers read
//! [`EngineSnapshot`]s. Nothing flows back from the renderer.

use crate::catalog::{Catalog, ImageRecord};
use crate::config::EngineConfig;
use crate::cursor::CursorStore;
use crate::error::SessionError;
use crate::page::{PageEvent, PageMachine, PageState};
use crate::sequencer::{Advance, Sequencer, StepKind};
use assembly_guide_core::{CanonicalImage, Rectifier, RgbImageView};
use assembly_guide_zones::{OccupancyDetector, OccupancyReading, Zone, ZoneLayout};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineStatus {
    Detecting,
    CountingDown { remaining: u32 },
    WaitingForClear,
    Done,
    ShowingImage { path: String, description: String },
    AllStepsComplete,
    /// A step could not be loaded; the session is over.
    Failed { reason: String },
}

/// One zone as the renderer should draw it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ZoneView {
    pub zone: Zone,
    pub occupied: bool,
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub preset_id: String,
    pub step_index: usize,
    pub step_count: usize,
    pub page: usize,
    pub page_count: usize,
    pub zones: Vec<ZoneView>,
    pub status: EngineStatus,
}

#[derive(Debug)]
enum Phase {
    Image {
        image: ImageRecord,
        deadline: Instant,
    },
    Grid {
        machine: Box<PageMachine>,
    },
    Complete,
    Failed {
        reason: String,
    },
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    detector: OccupancyDetector,
    sequencer: Sequencer,
    phase: Phase,
}

impl Engine {
    /// Open `preset_id`, resuming from the stored cursor, and load its current step.
    pub fn start(
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn CursorStore>,
        preset_id: &str,
        now: Instant,
    ) -> Result<Self, SessionError> {
        let sequencer = Sequencer::open(catalog, store, preset_id, config.completion)?;
        let mut engine = Self {
            detector: OccupancyDetector::new(config.detector),
            config,
            sequencer,
            phase: Phase::Complete,
        };
        engine.load_step(now)?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detector(&self) -> &OccupancyDetector {
        &self.detector
    }

    pub fn step_index(&self) -> usize {
        self.sequencer.index()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Complete)
    }

    /// Whether moving to the next step failed. A failed engine ignores further
    /// frames and ticks; the cursor still points at the broken step.
    pub fn is_failed(&self) -> bool {
        matches!(self.phase, Phase::Failed { .. })
    }

    /// The page machine of the running grid step.
    pub fn page_machine(&self) -> Option<&PageMachine> {
        match &self.phase {
            Phase::Grid { machine } => Some(&**machine),
            _ => None,
        }
    }

    fn load_step(&mut self, now: Instant) -> Result<(), SessionError> {
        let step = self.sequencer.current()?;
        self.phase = match step.kind {
            StepKind::Image(image) => {
                log::info!("step {}: image {}", step.index, image.path);
                Phase::Image {
                    image,
                    deadline: now + self.config.timing.image_dwell(),
                }
            }
            StepKind::Grid {
                grid_layout_id,
                layout,
            } => {
                log::info!(
                    "step {}: grid {grid_layout_id} ({:?} {:?} x{})",
                    step.index,
                    layout.shape,
                    layout.size,
                    layout.amount
                );
                let zones = ZoneLayout::new(layout, self.config.canonical);
                Phase::Grid {
                    machine: Box::new(PageMachine::new(zones, &self.config.timing)),
                }
            }
        };
        Ok(())
    }

    fn next_step(&mut self, now: Instant) -> Result<(), SessionError> {
        let loaded = match self.sequencer.advance() {
            Ok(Advance::Next(_) | Advance::Looped) => self.load_step(now),
            Ok(Advance::Finished) => {
                self.phase = Phase::Complete;
                Ok(())
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &loaded {
            log::error!("step {}: {e}", self.sequencer.index());
            self.phase = Phase::Failed {
                reason: e.to_string(),
            };
        }
        loaded
    }

    /// Zones to score on the next frame; empty outside grid steps.
    pub fn detection_zones(&self) -> Vec<Zone> {
        self.page_machine()
            .map(PageMachine::detection_zones)
            .unwrap_or_default()
    }

    /// Feed readings computed for [`Engine::detection_zones`].
    pub fn apply_readings(
        &mut self,
        readings: &[OccupancyReading],
        now: Instant,
    ) -> Result<Option<PageEvent>, SessionError> {
        let Phase::Grid { machine } = &mut self.phase else {
            return Ok(None);
        };
        let event = machine.observe(readings, now);
        if machine.is_terminal() {
            self.next_step(now)?;
        }
        Ok(event)
    }

    /// Detect on an already rectified canonical image.
    pub fn process_canonical(
        &mut self,
        image: &CanonicalImage,
        now: Instant,
    ) -> Result<Option<PageEvent>, SessionError> {
        let zones = self.detection_zones();
        if zones.is_empty() {
            return Ok(None);
        }
        let readings = self.detector.detect(image, &zones);
        self.apply_readings(&readings, now)
    }

    /// Rectify a camera frame and detect on it.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn process_frame(
        &mut self,
        rectifier: &Rectifier,
        frame: &RgbImageView<'_>,
        now: Instant,
    ) -> Result<Option<PageEvent>, SessionError> {
        if self.detection_zones().is_empty() {
            return Ok(None);
        }
        let canonical = rectifier.rectify(frame)?;
        self.process_canonical(&canonical, now)
    }

    /// Fire due deadlines: countdown ticks and image dwell.
    pub fn tick(&mut self, now: Instant) -> Result<Option<PageEvent>, SessionError> {
        match &mut self.phase {
            Phase::Image { deadline, .. } => {
                if now >= *deadline {
                    self.next_step(now)?;
                }
                Ok(None)
            }
            Phase::Grid { machine } => {
                let event = machine.tick(now);
                if machine.is_terminal() {
                    self.next_step(now)?;
                }
                Ok(event)
            }
            Phase::Complete | Phase::Failed { .. } => Ok(None),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let (page, page_count, zones, status) = match &self.phase {
            Phase::Image { image, .. } => (
                0,
                0,
                Vec::new(),
                EngineStatus::ShowingImage {
                    path: image.path.clone(),
                    description: image.description.clone(),
                },
            ),
            Phase::Grid { machine } => {
                let board = machine.board();
                let zones = machine
                    .page_zones()
                    .into_iter()
                    .map(|zone| {
                        let state = board.get(zone.index).unwrap_or_default();
                        ZoneView {
                            zone,
                            occupied: state.live,
                            completed: state.completed,
                        }
                    })
                    .collect();
                let status = match machine.state() {
                    PageState::Active | PageState::Terminal => EngineStatus::Detecting,
                    PageState::Countdown { remaining, .. } => {
                        EngineStatus::CountingDown { remaining }
                    }
                    PageState::WaitingForClear => EngineStatus::WaitingForClear,
                    PageState::Done => EngineStatus::Done,
                };
                (machine.page(), machine.page_count(), zones, status)
            }
            Phase::Complete => (0, 0, Vec::new(), EngineStatus::AllStepsComplete),
            Phase::Failed { reason } => (
                0,
                0,
                Vec::new(),
                EngineStatus::Failed {
                    reason: reason.clone(),
                },
            ),
        };

        EngineSnapshot {
            preset_id: self.sequencer.preset_id().to_string(),
            step_index: self.sequencer.index(),
            step_count: self.sequencer.len(),
            page,
            page_count,
            zones,
            status,
        }
    }
}
