//! Facade crate for the `assembly-guide-*` workspace.
//!
//! A projector shows where parts go; a camera watches the table. This crate
//! re-exports the pieces that turn camera frames into per-zone occupancy and
//! drive a preset of assembly steps from it:
//! - `assembly_guide::core`: homography, calibration quad, rectifier, photometric chain.
//! - `assembly_guide::zones`: paginated zone layouts and the occupancy detector.
//! - `assembly_guide::session`: page machine, sequencer, engine and tokio pipeline.
//! - `assembly_guide::io` (feature `image`): conversions to and from `image` buffers.
//!
//! ## Quickstart
//!
//! ```no_run
//! use assembly_guide::{CalibrationQuad, CanonicalSize, PhotometricParams, Rectifier};
//! use assembly_guide::zones::{layout_page, OccupancyDetector, ZoneShape, ZoneSize};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frame = assembly_guide::io::load_rgb("frame.png")?;
//! let quad = CalibrationQuad::load_json("calibration.json")?;
//! let canonical = CanonicalSize::default();
//! let rectifier = Rectifier::from_quad(
//!     &quad,
//!     canonical,
//!     frame.width,
//!     frame.height,
//!     PhotometricParams::default(),
//! )?;
//! let image = rectifier.rectify(&frame.view())?;
//! let zones = layout_page(ZoneShape::Circle, ZoneSize::Medium, 0, 8, canonical);
//! for r in OccupancyDetector::default().detect(&image, &zones) {
//!     println!("zone {}: {} votes", r.index, r.score);
//! }
//! # Ok(())
//! # }
//! ```

pub use assembly_guide_core as core;
pub use assembly_guide_session as session;
pub use assembly_guide_zones as zones;

pub use assembly_guide_core::{
    homography_from_4pt, CalibrationError, CalibrationQuad, CanonicalImage, CanonicalSize,
    Homography, PhotometricParams, Rectifier, RgbImage,
};
pub use assembly_guide_session::{Engine, EngineConfig, EngineSnapshot, EngineStatus};

mod replay;
pub use replay::{replay, ReplayEvent, ReplayOptions};

#[cfg(feature = "image")]
pub mod io;
