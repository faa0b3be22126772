//! Calibration quad: the four camera-frame corners of the projected work area.
//!
//! The quad is stored in normalized frame coordinates (0..1) so it survives
//! capture resolution changes. It is edited interactively and persisted once
//! per installation as JSON.

use crate::{homography_from_4pt, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Errors for structurally invalid calibration input.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration point {index} is outside the normalized range [0, 1]: ({x}, {y})")]
    OutOfRange { index: usize, x: f64, y: f64 },
    #[error("calibration point {index} has role {found:?}, expected {expected:?}")]
    WrongCornerOrder {
        index: usize,
        expected: CornerRole,
        found: CornerRole,
    },
    #[error("points {indices:?} are collinear or coincident")]
    CollinearPoints { indices: [usize; 3] },
    #[error("homography system is singular (column {column})")]
    SingularSystem { column: usize },
    #[error("non-finite coordinate in point correspondences")]
    NonFinite,
    #[error("degenerate homography")]
    Degenerate,
    #[error("invalid frame size {width}x{height}")]
    InvalidFrameSize { width: usize, height: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] CalibrationError),
}

/// Corner role of a calibration point, in the fixed TL, TR, BR, BL order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerRole {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl CornerRole {
    pub const ORDER: [CornerRole; 4] = [
        CornerRole::TopLeft,
        CornerRole::TopRight,
        CornerRole::BottomRight,
        CornerRole::BottomLeft,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: f64,
    pub y: f64,
    pub corner: CornerRole,
}

/// Fixed-resolution canonical (rectified) coordinate space.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CanonicalSize {
    pub width: usize,
    pub height: usize,
}

impl Default for CanonicalSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl CanonicalSize {
    /// Canonical corners in TL, TR, BR, BL order.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let w = self.width as f64;
        let h = self.height as f64;
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationQuad {
    pub points: [CalibrationPoint; 4],
}

impl Default for CalibrationQuad {
    fn default() -> Self {
        Self::from_corners([(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)])
    }
}

impl CalibrationQuad {
    /// Build a quad from normalized `(x, y)` corners in TL, TR, BR, BL order.
    pub fn from_corners(corners: [(f64, f64); 4]) -> Self {
        let mut points = [CalibrationPoint {
            x: 0.0,
            y: 0.0,
            corner: CornerRole::TopLeft,
        }; 4];
        for (i, ((x, y), corner)) in corners.into_iter().zip(CornerRole::ORDER).enumerate() {
            points[i] = CalibrationPoint { x, y, corner };
        }
        Self { points }
    }

    /// Check ordering, range and general position.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        for (index, (p, expected)) in self.points.iter().zip(CornerRole::ORDER).enumerate() {
            if p.corner != expected {
                return Err(CalibrationError::WrongCornerOrder {
                    index,
                    expected,
                    found: p.corner,
                });
            }
            let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
            if !in_range(p.x) || !in_range(p.y) {
                return Err(CalibrationError::OutOfRange { index, x: p.x, y: p.y });
            }
        }
        // the solver's general-position check covers collinearity
        homography_from_4pt(&CanonicalSize::default().corners(), &self.unit_points()).map(|_| ())
    }

    fn unit_points(&self) -> [Point2<f64>; 4] {
        self.points.map(|p| Point2::new(p.x, p.y))
    }

    /// Quad corners in pixel coordinates of a `frame_width x frame_height` capture.
    pub fn frame_points(&self, frame_width: usize, frame_height: usize) -> [Point2<f64>; 4] {
        let (w, h) = (frame_width as f64, frame_height as f64);
        self.points.map(|p| Point2::new(p.x * w, p.y * h))
    }

    /// Homography mapping canonical pixels to capture-frame pixels.
    ///
    /// This is the direction the rectifier needs: every canonical pixel is
    /// inverse-mapped into the frame and sampled there.
    pub fn canonical_to_frame(
        &self,
        canonical: CanonicalSize,
        frame_width: usize,
        frame_height: usize,
    ) -> Result<Homography, CalibrationError> {
        if frame_width == 0 || frame_height == 0 || canonical.width == 0 || canonical.height == 0
        {
            return Err(CalibrationError::InvalidFrameSize {
                width: frame_width,
                height: frame_height,
            });
        }
        self.validate()?;
        homography_from_4pt(
            &canonical.corners(),
            &self.frame_points(frame_width, frame_height),
        )
    }

    /// Load and validate a quad from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        let quad: Self = serde_json::from_str(&raw)?;
        quad.validate()?;
        Ok(quad)
    }

    /// Write this quad to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_quad_is_valid() {
        CalibrationQuad::default().validate().expect("valid");
    }

    #[test]
    fn out_of_range_point_is_rejected() {
        let quad = CalibrationQuad::from_corners([(0.1, 0.1), (1.2, 0.1), (0.9, 0.9), (0.1, 0.9)]);
        assert!(matches!(
            quad.validate(),
            Err(CalibrationError::OutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn three_collinear_corners_are_rejected() {
        let quad = CalibrationQuad::from_corners([(0.1, 0.1), (0.5, 0.5), (0.9, 0.9), (0.1, 0.9)]);
        assert!(matches!(
            quad.validate(),
            Err(CalibrationError::CollinearPoints { .. })
        ));
    }

    #[test]
    fn swapped_roles_are_rejected() {
        let mut quad = CalibrationQuad::default();
        quad.points.swap(0, 1);
        assert!(matches!(
            quad.validate(),
            Err(CalibrationError::WrongCornerOrder { index: 0, .. })
        ));
    }

    #[test]
    fn canonical_corners_land_on_quad_corners() {
        let quad =
            CalibrationQuad::from_corners([(0.12, 0.08), (0.91, 0.11), (0.88, 0.93), (0.07, 0.9)]);
        let canonical = CanonicalSize::default();
        let h = quad.canonical_to_frame(canonical, 1920, 1080).expect("h");
        for (c, f) in canonical.corners().iter().zip(quad.frame_points(1920, 1080)) {
            let mapped = h.apply(*c);
            assert_abs_diff_eq!(mapped.x, f.x, epsilon = 1e-6);
            assert_abs_diff_eq!(mapped.y, f.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn json_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("calibration.json");
        let quad =
            CalibrationQuad::from_corners([(0.15, 0.1), (0.85, 0.12), (0.9, 0.88), (0.1, 0.9)]);
        quad.write_json(&path).expect("write");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"top-left\""));
        assert_eq!(CalibrationQuad::load_json(&path).expect("load"), quad);
    }
}
