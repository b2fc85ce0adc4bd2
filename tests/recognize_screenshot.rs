use std::path::PathBuf;
use std::sync::Arc;

use image::{imageops, DynamicImage, GrayImage, Luma};
use mapfix::{
    recognize_batch, Calibration, FailureReason, Recognizer, TemplateMatcher,
    TemplateMatcherOptions, WorldBounds,
};

fn terrain(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let (xf, yf) = (x as f64, y as f64);
        let v = 128.0
            + 50.0 * (xf * xf / 300.0 + yf / 9.0).sin()
            + 50.0 * (yf * yf / 250.0 + xf / 13.0).cos();
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

fn matcher(map: &GrayImage) -> TemplateMatcher {
    TemplateMatcher::new(
        map.clone(),
        TemplateMatcherOptions {
            min_score: 0.9,
            coarse_max_dimension: 150,
        },
    )
    .unwrap()
}

/// Colour screenshot of the map cropped at `(x, y)`.
fn write_screenshot(map: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> PathBuf {
    let crop = imageops::crop_imm(map, x, y, w, h).to_image();
    let rgb = DynamicImage::ImageLuma8(crop).to_rgb8();
    let path = std::env::temp_dir().join(format!("mapfix-it-{}.png", uuid::Uuid::new_v4()));
    rgb.save(&path).unwrap();
    path
}

#[test]
fn screenshot_resolves_to_world_coordinate() {
    let map = terrain(300, 200);
    let shot = write_screenshot(&map, 120, 80, 80, 60);
    let recognizer = Recognizer::new(matcher(&map))
        .with_calibration(Calibration::new(2.0, 2.0, -300.0, -200.0));

    let outcome = recognizer.recognize_path(&shot);
    std::fs::remove_file(&shot).ok();

    // fragment centre (160, 110) in map pixels
    let world = outcome.coordinate().expect("recognition should succeed");
    assert!((world.x - 20.0).abs() <= 2.0, "x = {}", world.x);
    assert!((world.y - 20.0).abs() <= 2.0, "y = {}", world.y);
}

#[test]
fn recognition_is_repeatable() {
    let map = terrain(300, 200);
    let shot = write_screenshot(&map, 30, 100, 64, 64);
    let recognizer = Recognizer::new(matcher(&map));

    let first = recognizer.recognize_path(&shot);
    let second = recognizer.recognize_path(&shot);
    std::fs::remove_file(&shot).ok();
    assert!(first.is_success());
    assert_eq!(first, second);
}

#[test]
fn far_calibration_is_rejected_as_out_of_bounds() {
    let map = terrain(300, 200);
    let shot = write_screenshot(&map, 120, 80, 80, 60);
    let recognizer = Recognizer::new(matcher(&map))
        .with_calibration(Calibration::new(100.0, 100.0, 0.0, 0.0))
        .with_bounds(WorldBounds::default());

    let outcome = recognizer.recognize_path(&shot);
    std::fs::remove_file(&shot).ok();
    match outcome.reason() {
        Some(FailureReason::OutOfBounds { coordinate }) => assert!(coordinate.x > 3000.0),
        other => panic!("expected out_of_bounds, got {other:?}"),
    }
}

#[test]
fn featureless_screenshot_is_no_match() {
    let map = terrain(300, 200);
    let path = std::env::temp_dir().join(format!("mapfix-it-{}.png", uuid::Uuid::new_v4()));
    GrayImage::from_pixel(50, 50, Luma([30])).save(&path).unwrap();

    let outcome = Recognizer::new(matcher(&map)).recognize_path(&path);
    std::fs::remove_file(&path).ok();
    assert_eq!(outcome.reason(), Some(&FailureReason::NoMatch));
}

#[test]
fn nonexistent_and_empty_paths() {
    let recognizer = Recognizer::new(matcher(&terrain(64, 64)));
    for path in ["nonexistent.jpg", ""] {
        assert!(matches!(
            recognizer.recognize_path(path).reason(),
            Some(FailureReason::FileNotFound { .. })
        ));
    }
}

#[tokio::test]
async fn batch_reports_every_file() {
    let map = terrain(300, 200);
    let good = write_screenshot(&map, 200, 20, 60, 60);
    let missing = std::env::temp_dir().join("mapfix-it-missing.png");
    let recognizer = Arc::new(Recognizer::new(matcher(&map)));

    let entries = recognize_batch(recognizer, vec![good.clone(), missing], 2).await;
    std::fs::remove_file(&good).ok();

    assert!(entries[0].outcome.is_success());
    let c = entries[0].outcome.coordinate().unwrap();
    assert!((c.x - 230.0).abs() <= 1.0 && (c.y - 50.0).abs() <= 1.0);
    assert_eq!(entries[1].outcome.reason().map(FailureReason::tag), Some("file_not_found"));
    assert_eq!(entries[0].outcome.to_string(), format!("{c}"));
}
