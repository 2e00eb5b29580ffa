//! Background estimation over in-memory videos.

use larvatrack_core::{FrameBuffer, FrameRate, PixelFormat};
use larvatrack_media::MemorySource;
use larvatrack_tracking::{
    compute_background, BackgroundMethod, BackgroundOptions, CancelToken, Phase,
};
use proptest::prelude::*;

// ── Helpers ────────────────────────────────────────────────────

fn source(frames: Vec<FrameBuffer>) -> MemorySource {
    MemorySource::new(frames, FrameRate::FPS_30).unwrap()
}

fn background_of(frames: Vec<FrameBuffer>, options: &BackgroundOptions) -> FrameBuffer {
    compute_background(&mut source(frames), options, |_| {}, &CancelToken::new())
        .unwrap()
        .into_frame()
}

/// Textured scene, so a wrong tile offset shows up as a wrong value.
fn scene(width: u32, height: u32) -> FrameBuffer {
    FrameBuffer::gray_from_fn(width, height, |x, y| ((x * 7 + y * 13) % 200 + 20) as u8)
}

/// Frames of size `width` x `height`, all of one scene except one frame
/// where a bright object covers part of it.
fn scene_with_outlier(width: u32, height: u32, n: usize, outlier: usize) -> Vec<FrameBuffer> {
    (0..n)
        .map(|i| {
            let mut frame = scene(width, height);
            if i == outlier {
                for y in 1..height.min(4) {
                    for x in 2..width.min(6) {
                        frame.set(x, y, 255);
                    }
                }
            }
            frame
        })
        .collect()
}

fn frames_strategy() -> impl Strategy<Value = (u32, u32, Vec<Vec<u8>>)> {
    (1u32..6, 1u32..6, 1usize..6).prop_flat_map(|(w, h, n)| {
        let len = (w * h) as usize;
        (
            Just(w),
            Just(h),
            prop::collection::vec(prop::collection::vec(any::<u8>(), len), n),
        )
    })
}

// ── Brightest / darkest ────────────────────────────────────────

proptest! {
    #[test]
    fn extremum_backgrounds_match_brute_force((w, h, data) in frames_strategy()) {
        let frames: Vec<FrameBuffer> = data
            .iter()
            .map(|d| FrameBuffer::from_raw(w, h, PixelFormat::Gray8, d.clone()).unwrap())
            .collect();

        let brightest = background_of(frames.clone(), &BackgroundOptions::new(BackgroundMethod::Brightest));
        let darkest = background_of(frames, &BackgroundOptions::new(BackgroundMethod::Darkest));

        for i in 0..(w * h) as usize {
            let max = data.iter().map(|d| d[i]).max().unwrap();
            let min = data.iter().map(|d| d[i]).min().unwrap();
            prop_assert_eq!(brightest.data()[i], max);
            prop_assert_eq!(darkest.data()[i], min);
        }
    }
}

#[test]
fn stride_samples_every_nth_frame() {
    let frames: Vec<FrameBuffer> = (0..7u8)
        .map(|i| FrameBuffer::gray_from_fn(3, 3, move |_, _| i * 10))
        .collect();
    // frames 0, 3, 6 are sampled
    let options = BackgroundOptions::new(BackgroundMethod::Brightest).with_frame_stride(3);
    assert!(background_of(frames.clone(), &options).data().iter().all(|&v| v == 60));

    let options = BackgroundOptions::new(BackgroundMethod::Brightest).with_frame_stride(4);
    assert!(background_of(frames, &options).data().iter().all(|&v| v == 40));
}

// ── Modal ──────────────────────────────────────────────────────

#[test]
fn modal_ignores_single_outlier_whole_frame() {
    let frames = scene_with_outlier(10, 7, 5, 2);
    let options = BackgroundOptions::new(BackgroundMethod::Modal);
    assert_eq!(background_of(frames, &options), scene(10, 7));
}

#[test]
fn modal_ignores_single_outlier_even_tiles() {
    let frames = scene_with_outlier(12, 8, 5, 0);
    let options = BackgroundOptions::new(BackgroundMethod::Modal).with_chunk_size(4, 4);
    assert_eq!(background_of(frames, &options), scene(12, 8));
}

#[test]
fn modal_ignores_single_outlier_uneven_tiles() {
    let frames = scene_with_outlier(10, 7, 5, 4);
    let options = BackgroundOptions::new(BackgroundMethod::Modal).with_chunk_size(4, 3);
    assert_eq!(background_of(frames, &options), scene(10, 7));
}

#[test]
fn modal_progress_charges_ten_units_per_tile_frame() {
    let frames = scene_with_outlier(10, 7, 3, 1);
    // 3 x 3 tiles over a 10 x 7 frame
    let options = BackgroundOptions::new(BackgroundMethod::Modal).with_chunk_size(4, 3);
    assert_eq!(options.tiles(10, 7).len(), 9);

    let mut updates = Vec::new();
    compute_background(
        &mut source(frames),
        &options,
        |u| updates.push(u),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(updates.len(), 9 * 3);
    assert!(updates.iter().all(|u| u.phase == Phase::CalculatingBackground));
    let last = updates.last().unwrap();
    assert_eq!(last.units_done, 9 * 3 * 10);
    assert_eq!(last.units_total, last.units_done);
}

#[test]
fn cancelled_background_returns_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = compute_background(
        &mut source(scene_with_outlier(4, 4, 3, 0)),
        &BackgroundOptions::new(BackgroundMethod::Modal),
        |_| {},
        &cancel,
    );
    assert!(result.unwrap_err().is_cancelled());
}

#[test]
fn unreadable_frame_fails_background() {
    let mut src = source(scene_with_outlier(4, 4, 5, 0)).with_read_failure(3);
    let err = compute_background(
        &mut src,
        &BackgroundOptions::new(BackgroundMethod::Darkest),
        |_| {},
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("Background calculation failed"));
}
