#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn cli() -> Command {
    Command::cargo_bin("assembly-guide").expect("binary built")
}

fn write_small_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("engine.json");
    fs::write(
        &path,
        r#"{"canonical":{"width":320,"height":180},"timing":{"image_dwell_ms":1000}}"#,
    )
    .expect("write config");
    path
}

fn write_frame(path: &Path, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(400, 300, image::Rgb(rgb))
        .save(path)
        .expect("write frame");
}

#[test]
fn homography_prints_both_directions() {
    cli()
        .args(["homography", "--frame-width", "640", "--frame-height", "480"])
        .assert()
        .success()
        .stdout(predicate::str::contains("frame_from_canonical"))
        .stdout(predicate::str::contains("canonical_from_frame"));
}

#[test]
fn collinear_calibration_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let quad = dir.path().join("quad.json");
    fs::write(
        &quad,
        r#"{"points":[
            {"x":0.1,"y":0.1,"corner":"top-left"},
            {"x":0.5,"y":0.5,"corner":"top-right"},
            {"x":0.9,"y":0.9,"corner":"bottom-right"},
            {"x":0.1,"y":0.9,"corner":"bottom-left"}
        ]}"#,
    )
    .expect("write quad");

    cli()
        .args(["homography", "--frame-width", "640", "--frame-height", "480"])
        .arg("--calibration")
        .arg(&quad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("collinear"));
}

#[test]
fn layout_reports_pages() {
    cli()
        .args([
            "layout",
            "--shape",
            "rectangle",
            "--size",
            "medium",
            "--amount",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"page_count\": 2"));
}

#[test]
fn rectify_writes_canonical_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_small_config(dir.path());
    let frame = dir.path().join("frame.png");
    let out = dir.path().join("canonical.png");
    write_frame(&frame, [128, 128, 128]);

    cli()
        .arg("rectify")
        .arg("--image")
        .arg(&frame)
        .arg("--out")
        .arg(&out)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let img = image::open(&out).expect("read output").to_rgb8();
    assert_eq!(img.dimensions(), (320, 180));
}

#[test]
fn detect_on_dark_frame_reports_occupied_zones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_small_config(dir.path());
    let frame = dir.path().join("frame.png");
    let overlay = dir.path().join("overlay.png");
    write_frame(&frame, [20, 20, 20]);

    cli()
        .arg("detect")
        .arg("--image")
        .arg(&frame)
        .args(["--shape", "circle", "--size", "large", "--amount", "3"])
        .arg("--config")
        .arg(&config)
        .arg("--overlay")
        .arg(&overlay)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"occupied\": true"))
        .stdout(predicate::str::contains("\"occupied\": false").not());
    assert!(overlay.exists());
}

#[test]
fn replay_runs_preset_to_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_small_config(dir.path());
    let catalog = dir.path().join("catalog.json");
    fs::write(
        &catalog,
        r#"{
            "presets": {"demo": [{"step_id": "s1", "step": 1, "image_id": "intro"}]},
            "images": {"intro": {"path": "intro.png", "description": "Start here"}}
        }"#,
    )
    .expect("write catalog");
    let frames = dir.path().join("frames");
    fs::create_dir(&frames).expect("frames dir");
    write_frame(&frames.join("000.png"), [255, 255, 255]);
    write_frame(&frames.join("001.png"), [255, 255, 255]);
    let cursor = dir.path().join("cursor.json");

    cli()
        .arg("replay")
        .arg("--catalog")
        .arg(&catalog)
        .args(["--preset", "demo", "--frame-interval-ms", "500", "--drain-ms", "1000"])
        .arg("--frames")
        .arg(&frames)
        .arg("--config")
        .arg(&config)
        .arg("--cursor")
        .arg(&cursor)
        .assert()
        .success()
        .stdout(predicate::str::contains("showing_image"))
        .stdout(predicate::str::contains("all_steps_complete"));

    // halting clears the persisted cursor
    assert!(!cursor.exists());
}

#[test]
fn replay_of_unknown_preset_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = dir.path().join("catalog.json");
    fs::write(&catalog, "{}").expect("write catalog");
    let frames = dir.path().join("frames");
    fs::create_dir(&frames).expect("frames dir");
    write_frame(&frames.join("000.png"), [255, 255, 255]);

    cli()
        .arg("replay")
        .arg("--catalog")
        .arg(&catalog)
        .args(["--preset", "missing"])
        .arg("--frames")
        .arg(&frames)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}
