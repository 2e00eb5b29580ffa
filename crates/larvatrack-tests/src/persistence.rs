//! Results, backgrounds and parameters written to disk and read back.

use crate::synthetic::{black, black_background, upright_fish, upright_params, video};
use larvatrack_core::TrackError;
use larvatrack_tracking::{
    compute_background, Background, BackgroundMethod, BackgroundOptions, CancelToken,
    TrackingMethod, TrackingParameters, TrackingRecord, TrackingSession,
};

// ── Results record ─────────────────────────────────────────────

#[test]
fn record_round_trips_through_disk() {
    let frames = vec![upright_fish(), black(), upright_fish()];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fish_results.json");
    let record = result.to_record();
    record.save(&path).unwrap();

    let loaded = TrackingRecord::load(&path).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.eye_coord_array[0][0], [Some(97.0), Some(98.0)]);
    assert_eq!(loaded.tail_coord_array[2].len(), 5);
    assert_eq!(loaded.dist_tail_points, 5.0);
    assert_eq!(loaded.colours, record.colours);
    assert_eq!(loaded.video_fps, 100.0);
    assert_eq!(loaded.timestamp_array, vec![0.0, 0.01, 0.02]);
    assert_eq!(loaded.body_coord_array, record.body_coord_array);
    assert_eq!(loaded.heading_angle_array[1], None);
    let heading = loaded.heading_angle_array[0].unwrap();
    assert!((heading - record.heading_angle_array[0].unwrap()).abs() < 1e-12);
}

#[test]
fn degraded_frame_written_as_nulls() {
    let frames = vec![upright_fish(), black()];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();
    assert!(!result.poses[1].body_center.is_valid());

    let json = result.to_record().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["heading_angle_array"][1].is_null());
    assert!(value["body_coord_array"][1][0].is_null());
    assert_eq!(value["tail_coord_array"][1].as_array().unwrap().len(), 5);
    assert!(value["tail_coord_array"][1][4][1].is_null());
    assert!(value["heading_angle_array"][0].is_number());
}

#[test]
fn corrupt_record_is_a_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"eye_coord_array\": [").unwrap();
    assert!(matches!(
        TrackingRecord::load(&path),
        Err(TrackError::Serialization(_))
    ));
}

// ── Background images ──────────────────────────────────────────

#[test]
fn background_png_round_trip() {
    let frames = vec![upright_fish(), black(), upright_fish()];
    let background = compute_background(
        &mut video(frames),
        &BackgroundOptions::new(BackgroundMethod::Darkest),
        |_| {},
        &CancelToken::new(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = Background::default_path(&dir.path().join("fish.avi"));
    assert!(path.ends_with("fish_background.png"));
    background.save_png(&path).unwrap();

    let loaded = Background::load(&path).unwrap();
    assert_eq!(loaded, background);
    assert_eq!(loaded.frame().max_value(), 0);
}

#[test]
fn session_saves_computed_background() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bg.png");
    TrackingSession::new(video(vec![upright_fish(), black()]), upright_params())
        .with_background_options(BackgroundOptions::new(BackgroundMethod::Brightest))
        .with_background_output(&path)
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    let saved = Background::load(&path).unwrap();
    assert_eq!(saved.frame(), &upright_fish());
}

#[test]
fn missing_background_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Background::load(&dir.path().join("none.png")),
        Err(TrackError::NotFound(_))
    ));
}

// ── Parameters ─────────────────────────────────────────────────

#[test]
fn parameters_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    let params = TrackingParameters {
        method: TrackingMethod::HeadFixed,
        n_tail_points: 4,
        dist_tail_points: 6.0,
        range_angles: 2.0,
        ..TrackingParameters::default()
    };
    params.save(&path).unwrap();
    assert_eq!(TrackingParameters::load(&path).unwrap(), params);
}

#[test]
fn invalid_parameters_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    std::fs::write(&path, r#"{"median_blur": 4}"#).unwrap();
    assert!(matches!(
        TrackingParameters::load(&path),
        Err(TrackError::InvalidParameter(_))
    ));
}
