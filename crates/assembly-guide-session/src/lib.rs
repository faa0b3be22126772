//! Session layer for projected assembly guides.
//!
//! - [`PageMachine`] runs one grid step: countdown, page completion and clearance,
//!   over a single authoritative [`ZoneBoard`].
//! - [`Sequencer`] walks a preset's steps from a [`Catalog`] and persists the
//!   [`SessionCursor`] on every move.
//! - [`Engine`] glues rectification, detection and sequencing per frame and
//!   publishes [`EngineSnapshot`]s.
//! - [`Pipeline`] runs an engine on tokio with latest-frame-wins channels.

mod board;
mod catalog;
mod config;
mod cursor;
mod engine;
mod error;
mod page;
mod pipeline;
mod sequencer;

pub use board::{ZoneBoard, ZoneState};
pub use catalog::{Catalog, ImageRecord, InMemoryCatalog, StepRecord};
pub use config::{CompletionPolicy, EngineConfig, TimingConfig};
pub use cursor::{CursorStore, JsonCursorStore, MemoryCursorStore, SessionCursor};
pub use engine::{Engine, EngineSnapshot, EngineStatus, ZoneView};
pub use error::{
    CatalogError, ConfigError, CursorError, DataNotFound, DeviceError, PipelineError,
    SessionError,
};
pub use page::{PageEvent, PageMachine, PageState};
pub use pipeline::{FrameSlot, Pipeline};
pub use sequencer::{Advance, ResolvedStep, Sequencer, StepKind};
