//! Geometry and imaging core for projected assembly guides.
//!
//! This crate maps camera frames into a fixed canonical space:
//! - [`homography_from_4pt`] solves the projective transform from four
//!   correspondences (Gaussian elimination with partial pivoting),
//! - [`CalibrationQuad`] holds the persisted normalized corners of the work area,
//! - [`Rectifier`] caches the canonical-to-frame lookup and applies the
//!   [`PhotometricParams`] tone chain every frame.
//!
//! It knows nothing about zones, presets or timing.

mod calibration;
mod homography;
mod image;
mod logger;
mod photometric;
mod rectify;

pub use calibration::{
    CalibrationError, CalibrationIoError, CalibrationPoint, CalibrationQuad, CanonicalSize,
    CornerRole,
};
pub use homography::{homography_from_4pt, Homography};
pub use image::{mean_rgb, BilinearTap, CanonicalImage, RgbImage, RgbImageView};
pub use photometric::{PhotometricParams, ToneTable};
pub use rectify::{map_canonical_pixel, RectifyError, Rectifier};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV};
