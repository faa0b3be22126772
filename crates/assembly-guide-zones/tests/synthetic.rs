use assembly_guide_core::{CanonicalImage, CanonicalSize, RgbImage};
use assembly_guide_zones::{
    layout_page, DetectorParams, OccupancyDetector, ZoneShape, ZoneSize,
};

fn white_canvas() -> RgbImage {
    RgbImage::filled(1280, 720, [255, 255, 255])
}

/// Paint 2 px wide vertical red/black stripes over the box around `(cx, cy)`.
fn paint_stripes(img: &mut RgbImage, cx: f32, cy: f32, half: f32) {
    let x0 = (cx - half).floor().max(0.0) as usize;
    let x1 = ((cx + half).ceil() as usize).min(img.width - 1);
    let y0 = (cy - half).floor().max(0.0) as usize;
    let y1 = ((cy + half).ceil() as usize).min(img.height - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let rgb = if x % 4 < 2 { [255, 0, 0] } else { [0, 0, 0] };
            img.put_pixel(x, y, rgb);
        }
    }
}

#[test]
fn empty_zones_on_white_score_zero() {
    let zones = layout_page(
        ZoneShape::Circle,
        ZoneSize::Medium,
        0,
        8,
        CanonicalSize::default(),
    );
    let image = CanonicalImage::from_rgb(white_canvas());
    let readings = OccupancyDetector::default().detect(&image, &zones);
    assert_eq!(readings.len(), 8);
    for r in readings {
        assert_eq!(r.score, 0, "zone {}", r.index);
        assert!(!r.occupied);
    }
}

#[test]
fn textured_dark_object_collects_every_vote() {
    let zones = layout_page(
        ZoneShape::Circle,
        ZoneSize::Medium,
        0,
        8,
        CanonicalSize::default(),
    );
    let target = zones[5];
    let mut img = white_canvas();
    let (half, _) = target.extent.half_size();
    paint_stripes(&mut img, target.center.x, target.center.y, half + 2.0);
    let image = CanonicalImage::from_rgb(img);

    let readings = OccupancyDetector::default().detect(&image, &zones);
    for r in &readings {
        if r.index == 5 {
            assert_eq!(r.score, 7);
            assert!(r.votes.darkness && r.votes.edges && r.votes.center_darkness);
            assert!(r.votes.brightness_variance && r.votes.color_variance);
            assert!(r.occupied);
        } else {
            assert!(!r.occupied, "zone {} should be empty", r.index);
        }
    }
}

#[test]
fn detection_depends_only_on_the_zone_region() {
    let zones = layout_page(
        ZoneShape::Rectangle,
        ZoneSize::Large,
        0,
        4,
        CanonicalSize::default(),
    );
    let mut img = white_canvas();
    // darken everything outside the zones
    for y in 0..img.height {
        for x in 0..img.width {
            let inside = zones.iter().any(|z| {
                z.extent
                    .contains(x as f32 - z.center.x, y as f32 - z.center.y, 1.0)
            });
            if !inside {
                img.put_pixel(x, y, [0, 0, 0]);
            }
        }
    }
    let image = CanonicalImage::from_rgb(img);
    let readings = OccupancyDetector::default().detect(&image, &zones);
    assert!(readings.iter().all(|r| !r.occupied));
}

#[test]
fn threshold_changes_flip_the_decision() {
    let zones = layout_page(
        ZoneShape::Square,
        ZoneSize::Large,
        0,
        1,
        CanonicalSize::default(),
    );
    let image = CanonicalImage::from_rgb(RgbImage::filled(1280, 720, [180, 180, 180]));

    let default = OccupancyDetector::default().detect(&image, &zones);
    assert!(default[0].occupied);

    let strict = OccupancyDetector::new(DetectorParams {
        darkness_threshold: 150.0,
        ..DetectorParams::default()
    });
    assert!(!strict.detect(&image, &zones)[0].occupied);
}

#[test]
fn frame_without_data_reports_nothing_occupied() {
    let zones = layout_page(
        ZoneShape::Circle,
        ZoneSize::Small,
        0,
        15,
        CanonicalSize::default(),
    );
    let image = CanonicalImage::empty(1280, 720);
    let readings = OccupancyDetector::default().detect(&image, &zones);
    assert!(readings
        .iter()
        .all(|r| !r.occupied && r.signals.samples == 0));
}
