//! End-to-end tracking runs over synthetic videos.
//!
//! Exercises larvatrack-media sources and sinks together with the
//! larvatrack-tracking session, tracker and result record.

use crate::synthetic::{
    black, black_background, rotated_fish, rotated_params, two_eye_fish, upright_fish,
    upright_params, video,
};
use larvatrack_core::{wrap_angle, Point, TrackError};
use larvatrack_media::MemorySink;
use larvatrack_tracking::{
    CancelToken, FrameRange, Phase, RangeAdjustment, TrackingParameters, TrackingSession,
};
use std::f64::consts::{FRAC_PI_2, PI};

// ── Static fish ────────────────────────────────────────────────

#[test]
fn static_fish_tracked_for_fifty_frames() {
    let frames = vec![upright_fish(); 50];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), 50);
    for pose in &result.poses {
        assert!(pose.is_complete(), "undefined coordinate in {pose:?}");
        assert!(pose.body_center.distance(Point::new(100.0, 100.0)) <= 2.0);
        assert_eq!(pose.tail_points.len(), 5);
    }

    let pose = &result.poses[0];
    assert_eq!(pose.first_eye, Point::new(97.0, 98.0));
    assert_eq!(pose.second_eye, Point::new(97.0, 102.0));
    assert_eq!(pose.swim_bladder, Point::new(103.0, 100.0));
    assert_eq!(pose.body_center, Point::new(99.0, 100.0));
    assert!((pose.heading_angle + FRAC_PI_2).abs() < 1e-9);
    let tail_rows: Vec<f64> = pose.tail_points.iter().map(|p| p.row).collect();
    assert_eq!(tail_rows, vec![108.0, 113.0, 118.0, 123.0, 128.0]);
    assert!(pose.tail_points.iter().all(|p| p.col == 100.0));
}

#[test]
fn default_parameters_track_fish_with_close_eyes() {
    // The eyes sit 4 px apart while the second-eye search runs at 8 px, so
    // the second eye lands on the far rim of its blob and the body centre
    // settles between one and two pixels from the blob centre.
    let params = TrackingParameters {
        dist_eyes: 8.0,
        pixel_threshold: 30,
        ..TrackingParameters::default()
    };
    let result = TrackingSession::new(video(vec![two_eye_fish(); 50]), params)
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), 50);
    assert_eq!(result.poses[0].first_eye, Point::new(95.0, 98.0));
    for pose in &result.poses {
        assert!(pose.is_complete(), "undefined coordinate in {pose:?}");
        assert_eq!(pose.tail_points.len(), 7);
        let offset = pose.body_center.distance(Point::new(100.0, 100.0));
        assert!(offset <= 2.0, "body centre {:?} is {offset:.2} px off", pose.body_center);
    }
}

#[test]
fn identical_frames_reuse_first_pose() {
    let frames = vec![upright_fish(); 50];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.stats.fresh, 1);
    assert_eq!(result.stats.reused, 49);
    assert_eq!(result.stats.degraded, 0);
    // eye angles are undefined here, and reused poses still compare equal
    assert!(result.poses[0].first_eye_angle.is_nan());
    assert!(result.poses.iter().all(|p| *p == result.poses[0]));
}

#[test]
fn empty_frames_degrade_without_aborting() {
    let frames = vec![upright_fish(), black(), upright_fish()];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.poses[1].body_center.is_nan());
    assert!(result.poses[1].heading_angle.is_nan());
    assert!(result.poses[2].is_complete());
    assert_eq!(result.stats.degraded, 1);

    let record = result.to_record();
    assert_eq!(record.heading_angle_array[1], None);
    assert_eq!(record.body_coord_array[2], [Some(99.0), Some(100.0)]);
}

// ── Frame range ────────────────────────────────────────────────

#[test]
fn start_past_end_tracks_whole_video() {
    let frames = vec![upright_fish(); 10];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .with_range(FrameRange::new(1000, None))
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), 10);
    assert_eq!(result.starting_frame, 0);
    assert_eq!(
        result.adjustments,
        vec![RangeAdjustment::StartReset {
            requested: 1000,
            frame_count: 10
        }]
    );
}

#[test]
fn frame_count_clamped_to_video() {
    let frames = vec![upright_fish(); 10];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .with_range(FrameRange::new(7, Some(20)))
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.starting_frame, 7);
    assert_eq!(result.to_record().starting_frame, 7);
    assert!(matches!(
        result.adjustments[..],
        [RangeAdjustment::CountClamped {
            requested: 20,
            tracked: 3
        }]
    ));
}

// ── Invariants ─────────────────────────────────────────────────

#[test]
fn tail_length_constant_across_outcomes() {
    for n_tail_points in [0, 1, 4, 9] {
        let params = TrackingParameters {
            n_tail_points,
            ..upright_params()
        };
        let frames = vec![
            black(),
            upright_fish(),
            upright_fish(),
            black(),
            rotated_fish(1.0),
        ];
        let result = TrackingSession::new(video(frames), params)
            .with_background(black_background())
            .run(|_| {}, &CancelToken::new())
            .unwrap();

        assert_eq!(result.len(), 5);
        for pose in &result.poses {
            assert_eq!(pose.tail_points.len(), n_tail_points);
        }
        for tail in &result.to_record().tail_coord_array {
            assert_eq!(tail.len(), n_tail_points);
        }
    }
}

#[test]
fn rotating_fish_angles_continuous_after_unwrap() {
    let step = 0.5;
    let headings: Vec<f64> = (0..24).map(|k| -PI + 0.25 + step * k as f64).collect();
    let frames = headings.iter().map(|&h| rotated_fish(h)).collect();
    let result = TrackingSession::new(video(frames), rotated_params())
        .with_background(black_background())
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.stats.fresh, headings.len());
    for (pose, &expected) in result.poses.iter().zip(&headings) {
        assert!(
            wrap_angle(pose.heading_angle - expected).abs() < 0.15,
            "heading {} for a fish facing {}",
            pose.heading_angle,
            expected
        );
    }

    // the raw series wraps around at least once
    let raw: Vec<f64> = result.poses.iter().map(|p| p.heading_angle).collect();
    assert!(raw.windows(2).any(|w| (w[1] - w[0]).abs() > PI));

    let heading = result.heading_angles_unwrapped();
    for w in heading.windows(2) {
        assert!((w[1] - w[0] - step).abs() < 0.15, "heading jump {}", w[1] - w[0]);
    }

    let (first_eye, second_eye) = result.eye_angles_unwrapped();
    for series in [&first_eye, &second_eye] {
        assert!(series.iter().all(|a| a.is_finite()));
        for w in series.windows(2) {
            assert!((w[1] - w[0] - step).abs() < 0.4, "eye angle jump {}", w[1] - w[0]);
        }
    }
}

// ── Output and control ─────────────────────────────────────────

#[test]
fn annotated_output_matches_tracked_frames() {
    let sink = MemorySink::new();
    let frames = vec![upright_fish(); 6];
    let result = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .with_range(FrameRange::new(2, Some(3)))
        .with_sink(Box::new(sink.clone()))
        .run(|_| {}, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(sink.is_finished());
    let written = sink.frames();
    assert_eq!(written.len(), 3);
    assert_eq!(written[0].dimensions(), (200, 200));

    // first eye marker drawn over the eye pixel
    let colours = &result.colours;
    assert_eq!(written[0].rgb(98, 97), colours.first_eye().to_array());
}

#[test]
fn cancel_during_tracking() {
    let sink = MemorySink::new();
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let frames = vec![upright_fish(); 20];

    let err = TrackingSession::new(video(frames), upright_params())
        .with_background(black_background())
        .with_sink(Box::new(sink.clone()))
        .run(
            move |update| {
                if update.phase == Phase::TrackingVideo && update.current_frame == 5 {
                    token.cancel();
                }
            },
            &cancel,
        )
        .unwrap_err();

    assert!(matches!(err, TrackError::Cancelled));
    assert_eq!(sink.len(), 5);
    assert!(!sink.is_finished());
}

#[test]
fn progress_reaches_total() {
    let mut last = None;
    let mut calls = 0;
    TrackingSession::new(video(vec![upright_fish(); 8]), upright_params())
        .with_background(black_background())
        .run(
            |update| {
                calls += 1;
                last = Some(update);
            },
            &CancelToken::new(),
        )
        .unwrap();

    // one per frame plus the completion update
    assert_eq!(calls, 9);
    let last = last.unwrap();
    assert_eq!(last.phase, Phase::Complete);
    assert!((last.fraction() - 1.0).abs() < 1e-12);
}
