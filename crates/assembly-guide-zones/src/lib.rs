//! Zones in canonical space.
//!
//! [`layout_page`] turns a (shape, size, amount) record into absolute-indexed
//! zones for one page; [`OccupancyDetector`] scores those zones on a
//! rectified frame. Both are pure functions of their inputs.

mod detector;
mod layout;

pub use detector::{
    DetectorParams, OccupancyDetector, OccupancyReading, OccupancySignals, SignalVotes,
    VoteWeights,
};
pub use layout::{
    grid_spec, layout_page, GridLayout, GridSpec, Zone, ZoneExtent, ZoneLayout, ZoneShape,
    ZoneSize,
};
