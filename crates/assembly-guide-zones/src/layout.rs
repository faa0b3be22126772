//! Deterministic zone geometry for paginated grid layouts.
//!
//! Rendering and detection both call into this module with the same inputs
//! and therefore agree on pixel regions without sharing any state.

use assembly_guide_core::CanonicalSize;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Gap between neighbouring cells, as a fraction of canvas width.
const GAP_FRAC: f32 = 0.02;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneShape {
    Circle,
    Rectangle,
    Square,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneSize {
    Small,
    Medium,
    Large,
}

/// Catalog record describing how many items of which shape a grid step expects.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub shape: ZoneShape,
    pub size: ZoneSize,
    pub amount: usize,
}

/// Rows, columns and capacity of one page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub max_per_page: usize,
}

pub fn grid_spec(shape: ZoneShape, size: ZoneSize) -> GridSpec {
    use ZoneShape::*;
    use ZoneSize::*;
    let (rows, cols) = match (shape, size) {
        (_, Small) => (3, 5),
        (_, Medium) => (2, 4),
        (Rectangle, Large) => (2, 2),
        (Circle | Square, Large) => (1, 4),
    };
    GridSpec {
        rows,
        cols,
        max_per_page: rows * cols,
    }
}

/// Cell width and height as fractions of canvas width.
fn cell_fraction(shape: ZoneShape, size: ZoneSize) -> (f32, f32) {
    use ZoneShape::*;
    use ZoneSize::*;
    match (shape, size) {
        (Circle | Square, Small) => (0.10, 0.10),
        (Circle | Square, Medium) => (0.15, 0.15),
        (Circle | Square, Large) => (0.20, 0.20),
        (Rectangle, Small) => (0.12, 0.06),
        (Rectangle, Medium) => (0.18, 0.09),
        (Rectangle, Large) => (0.24, 0.12),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ZoneExtent {
    Circle { radius: f32 },
    Rect { half_width: f32, half_height: f32 },
}

impl ZoneExtent {
    /// Half-size of the axis-aligned bounding box.
    pub fn half_size(&self) -> (f32, f32) {
        match *self {
            ZoneExtent::Circle { radius } => (radius, radius),
            ZoneExtent::Rect {
                half_width,
                half_height,
            } => (half_width, half_height),
        }
    }

    /// Whether offset `(dx, dy)` from the center lies inside the extent scaled by `scale`.
    #[inline]
    pub fn contains(&self, dx: f32, dy: f32, scale: f32) -> bool {
        match *self {
            ZoneExtent::Circle { radius } => {
                let r = radius * scale;
                dx * dx + dy * dy <= r * r
            }
            ZoneExtent::Rect {
                half_width,
                half_height,
            } => dx.abs() <= half_width * scale && dy.abs() <= half_height * scale,
        }
    }
}

/// One zone in canonical pixels; `index` is absolute across pages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub index: usize,
    pub center: Point2<f32>,
    pub extent: ZoneExtent,
}

/// Layout of one grid step on a fixed canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneLayout {
    layout: GridLayout,
    spec: GridSpec,
    canvas: CanonicalSize,
}

impl ZoneLayout {
    pub fn new(layout: GridLayout, canvas: CanonicalSize) -> Self {
        Self {
            layout,
            spec: grid_spec(layout.shape, layout.size),
            canvas,
        }
    }

    pub fn grid_layout(&self) -> GridLayout {
        self.layout
    }

    pub fn spec(&self) -> GridSpec {
        self.spec
    }

    pub fn total(&self) -> usize {
        self.layout.amount
    }

    pub fn page_count(&self) -> usize {
        self.layout.amount.div_ceil(self.spec.max_per_page)
    }

    pub fn is_last_page(&self, page: usize) -> bool {
        page + 1 >= self.page_count()
    }

    /// Absolute zone indices shown on `page`; empty past the last page.
    pub fn page_range(&self, page: usize) -> Range<usize> {
        let start = page.saturating_mul(self.spec.max_per_page).min(self.total());
        let end = (start + self.spec.max_per_page).min(self.total());
        start..end
    }

    pub fn page_of(&self, index: usize) -> Option<usize> {
        (index < self.total()).then(|| index / self.spec.max_per_page)
    }

    pub fn page_zones(&self, page: usize) -> Vec<Zone> {
        layout_page(
            self.layout.shape,
            self.layout.size,
            page,
            self.layout.amount,
            self.canvas,
        )
    }
}

/// Zones of `page` for `total` items of the given shape and size.
///
/// The grid is sized to the rows and columns actually used on this page and
/// centered on the canvas, so a short final page stays centered.
pub fn layout_page(
    shape: ZoneShape,
    size: ZoneSize,
    page: usize,
    total: usize,
    canvas: CanonicalSize,
) -> Vec<Zone> {
    let spec = grid_spec(shape, size);
    let start = page.saturating_mul(spec.max_per_page).min(total);
    let count = (total - start).min(spec.max_per_page);
    if count == 0 {
        return Vec::new();
    }

    let canvas_w = canvas.width as f32;
    let canvas_h = canvas.height as f32;
    let (fw, fh) = cell_fraction(shape, size);
    let cell_w = fw * canvas_w;
    let cell_h = fh * canvas_w;
    let gap = GAP_FRAC * canvas_w;

    let used_cols = count.min(spec.cols);
    let used_rows = count.div_ceil(spec.cols);
    let extent_x = cell_w * used_cols as f32 + gap * (used_cols as f32 - 1.0);
    let extent_y = cell_h * used_rows as f32 + gap * (used_rows as f32 - 1.0);
    let offset_x = (canvas_w - extent_x) / 2.0;
    let offset_y = (canvas_h - extent_y) / 2.0;

    let extent = match shape {
        ZoneShape::Circle => ZoneExtent::Circle {
            radius: cell_w / 2.0,
        },
        ZoneShape::Rectangle | ZoneShape::Square => ZoneExtent::Rect {
            half_width: cell_w / 2.0,
            half_height: cell_h / 2.0,
        },
    };

    (0..count)
        .map(|i| {
            let row = i / spec.cols;
            let col = i % spec.cols;
            let cx = offset_x + col as f32 * (cell_w + gap) + cell_w / 2.0;
            let cy = offset_y + row as f32 * (cell_h + gap) + cell_h / 2.0;
            Zone {
                index: start + i,
                center: Point2::new(cx, cy),
                extent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn canvas() -> CanonicalSize {
        CanonicalSize::default()
    }

    #[test]
    fn lookup_table_matches_design() {
        assert_eq!(
            grid_spec(ZoneShape::Rectangle, ZoneSize::Large),
            GridSpec {
                rows: 2,
                cols: 2,
                max_per_page: 4
            }
        );
        assert_eq!(
            grid_spec(ZoneShape::Circle, ZoneSize::Small),
            GridSpec {
                rows: 3,
                cols: 5,
                max_per_page: 15
            }
        );
        assert_eq!(
            grid_spec(ZoneShape::Rectangle, ZoneSize::Medium).max_per_page,
            8
        );
    }

    #[test]
    fn identical_inputs_give_identical_zones() {
        let a = layout_page(ZoneShape::Circle, ZoneSize::Medium, 1, 13, canvas());
        let b = layout_page(ZoneShape::Circle, ZoneSize::Medium, 1, 13, canvas());
        assert_eq!(a, b);
    }

    #[test]
    fn pages_partition_all_indices() {
        for shape in [ZoneShape::Circle, ZoneShape::Rectangle, ZoneShape::Square] {
            for size in [ZoneSize::Small, ZoneSize::Medium, ZoneSize::Large] {
                for amount in [1usize, 4, 7, 8, 10, 15, 16, 31] {
                    let layout = ZoneLayout::new(
                        GridLayout {
                            shape,
                            size,
                            amount,
                        },
                        canvas(),
                    );
                    let mut seen = Vec::new();
                    for page in 0..layout.page_count() {
                        let zones = layout.page_zones(page);
                        assert!(!zones.is_empty());
                        assert!(zones.len() <= layout.spec().max_per_page);
                        seen.extend(zones.iter().map(|z| z.index));
                    }
                    assert_eq!(seen, (0..amount).collect::<Vec<_>>());
                    assert!(layout.page_zones(layout.page_count()).is_empty());
                }
            }
        }
    }

    #[test]
    fn full_page_is_centered() {
        let zones = layout_page(ZoneShape::Circle, ZoneSize::Medium, 0, 8, canvas());
        let mean_x = zones.iter().map(|z| z.center.x).sum::<f32>() / zones.len() as f32;
        let mean_y = zones.iter().map(|z| z.center.y).sum::<f32>() / zones.len() as f32;
        assert_abs_diff_eq!(mean_x, 640.0, epsilon = 1e-3);
        assert_abs_diff_eq!(mean_y, 360.0, epsilon = 1e-3);
        match zones[0].extent {
            ZoneExtent::Circle { radius } => assert_abs_diff_eq!(radius, 96.0, epsilon = 1e-3),
            other => panic!("expected circle extent, got {other:?}"),
        }
    }

    #[test]
    fn short_final_page_uses_only_its_cells() {
        let layout = ZoneLayout::new(
            GridLayout {
                shape: ZoneShape::Rectangle,
                size: ZoneSize::Medium,
                amount: 10,
            },
            canvas(),
        );
        assert_eq!(layout.page_count(), 2);
        assert_eq!(layout.page_range(1), 8..10);
        let zones = layout.page_zones(1);
        assert_eq!(zones.len(), 2);
        // one row of two cells, mirrored about the canvas center
        assert_abs_diff_eq!(zones[0].center.y, 360.0, epsilon = 1e-3);
        assert_abs_diff_eq!(zones[0].center.x + zones[1].center.x, 1280.0, epsilon = 1e-3);
    }

    #[test]
    fn neighbouring_zones_do_not_overlap() {
        let zones = layout_page(ZoneShape::Rectangle, ZoneSize::Small, 0, 15, canvas());
        let (hw, hh) = zones[0].extent.half_size();
        for a in &zones {
            for b in zones.iter().filter(|b| b.index > a.index) {
                let sep_x = (a.center.x - b.center.x).abs() >= 2.0 * hw;
                let sep_y = (a.center.y - b.center.y).abs() >= 2.0 * hh;
                assert!(sep_x || sep_y, "zones {} and {} overlap", a.index, b.index);
            }
        }
    }

    #[test]
    fn zero_amount_has_no_pages() {
        let layout = ZoneLayout::new(
            GridLayout {
                shape: ZoneShape::Square,
                size: ZoneSize::Large,
                amount: 0,
            },
            canvas(),
        );
        assert_eq!(layout.page_count(), 0);
        assert!(layout.page_zones(0).is_empty());
        assert_eq!(layout.page_of(0), None);
    }

    #[test]
    fn grid_layout_uses_lowercase_names() {
        let json = r#"{"shape":"rectangle","size":"medium","amount":10}"#;
        let layout: GridLayout = serde_json::from_str(json).expect("parse");
        assert_eq!(layout.shape, ZoneShape::Rectangle);
        assert_eq!(layout.size, ZoneSize::Medium);
    }
}
