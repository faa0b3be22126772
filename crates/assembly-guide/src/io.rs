//! Conversions between `image` buffers and the workspace image types.

use crate::core::{CanonicalImage, RgbImage};
use crate::session::ZoneView;
use crate::zones::ZoneExtent;
use std::path::Path;

/// Copy an `image::RgbImage` into the workspace's owned RGB buffer.
pub fn rgb_from_image(img: &::image::RgbImage) -> RgbImage {
    RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Decode any format `image` understands into RGB8.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, ::image::ImageError> {
    let img = ::image::open(path)?.to_rgb8();
    Ok(rgb_from_image(&img))
}

/// Render a canonical image, painting pixels without data with `no_data`.
pub fn canonical_to_image(img: &CanonicalImage, no_data: [u8; 3]) -> ::image::RgbImage {
    ::image::RgbImage::from_fn(img.width as u32, img.height as u32, |x, y| {
        ::image::Rgb(img.get(x as i64, y as i64).unwrap_or(no_data))
    })
}

const OCCUPIED: [u8; 3] = [0, 200, 0];
const EMPTY: [u8; 3] = [220, 0, 0];
const COMPLETED: [u8; 3] = [0, 90, 220];

/// Outline each zone in place: green when occupied, red when empty, blue once completed.
pub fn draw_zone_outlines(img: &mut ::image::RgbImage, zones: &[ZoneView]) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for view in zones {
        let color = if view.completed {
            COMPLETED
        } else if view.occupied {
            OCCUPIED
        } else {
            EMPTY
        };
        let (cx, cy) = (view.zone.center.x, view.zone.center.y);
        let (hw, hh) = view.zone.extent.half_size();
        let x0 = (cx - hw - 1.0).floor() as i64;
        let x1 = (cx + hw + 1.0).ceil() as i64;
        let y0 = (cy - hh - 1.0).floor() as i64;
        let y1 = (cy + hh + 1.0).ceil() as i64;
        for y in y0.max(0)..=y1.min(h - 1) {
            for x in x0.max(0)..=x1.min(w - 1) {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let on_edge = match view.zone.extent {
                    ZoneExtent::Circle { radius } => {
                        ((dx * dx + dy * dy).sqrt() - radius).abs() <= 1.0
                    }
                    ZoneExtent::Rect { .. } => {
                        view.zone.extent.contains(dx, dy, 1.0)
                            && (dx.abs() >= hw - 1.0 || dy.abs() >= hh - 1.0)
                    }
                };
                if on_edge {
                    img.put_pixel(x as u32, y as u32, ::image::Rgb(color));
                }
            }
        }
    }
}
