//! Per-frame preprocessing: grayscale conversion, background subtraction,
//! median blur and thresholding.
//!
//! Everything here is stateless and works on `Gray8` frames.

use crate::params::Polarity;
use larvatrack_core::{FrameBuffer, PixelFormat, Result, TrackError};

/// Convert any frame to `Gray8`.
pub fn to_gray(frame: &FrameBuffer) -> FrameBuffer {
    frame.to_gray()
}

/// Per-pixel absolute difference of two grayscale frames.
pub fn subtract(frame: &FrameBuffer, background: &FrameBuffer) -> Result<FrameBuffer> {
    frame.ensure_gray()?;
    background.ensure_gray()?;
    frame.ensure_same_size(background)?;

    let data = frame
        .data()
        .iter()
        .zip(background.data())
        .map(|(&a, &b)| a.abs_diff(b))
        .collect();
    FrameBuffer::from_raw(frame.width, frame.height, PixelFormat::Gray8, data)
}

/// Median blur with a square `kernel` x `kernel` window and replicated
/// borders. `kernel` must be odd; 1 returns the frame unchanged.
///
/// Uses a sliding 256-bin histogram per row, so the cost per pixel is
/// linear in the kernel size rather than quadratic.
pub fn median_blur(frame: &FrameBuffer, kernel: u32) -> Result<FrameBuffer> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(TrackError::InvalidParameter(format!(
            "median blur kernel must be odd, got {kernel}"
        )));
    }
    frame.ensure_gray()?;
    let (width, height) = frame.dimensions();
    if kernel == 1 || width == 0 || height == 0 {
        return Ok(frame.clone());
    }

    let w = width as usize;
    let h = height as usize;
    let r = (kernel / 2) as isize;
    let half = (kernel * kernel / 2) as u32;
    let clamp_x = |x: isize| x.clamp(0, w as isize - 1) as usize;
    let clamp_y = |y: isize| y.clamp(0, h as isize - 1) as usize;

    let src = frame.data();
    let mut out = FrameBuffer::new(width, height, PixelFormat::Gray8);
    let dst = out.data_mut();

    for y in 0..h {
        let rows: Vec<usize> = (-r..=r).map(|dy| clamp_y(y as isize + dy) * w).collect();
        let mut hist = [0u32; 256];
        for &row in &rows {
            for dx in -r..=r {
                hist[src[row + clamp_x(dx)] as usize] += 1;
            }
        }
        dst[y * w] = median_of(&hist, half);

        for x in 1..w {
            let leaving = clamp_x(x as isize - 1 - r);
            let entering = clamp_x(x as isize + r);
            for &row in &rows {
                hist[src[row + leaving] as usize] -= 1;
                hist[src[row + entering] as usize] += 1;
            }
            dst[y * w + x] = median_of(&hist, half);
        }
    }
    Ok(out)
}

#[inline]
fn median_of(hist: &[u32; 256], half: u32) -> u8 {
    let mut seen = 0;
    for (value, &count) in hist.iter().enumerate() {
        seen += count;
        if seen > half {
            return value as u8;
        }
    }
    u8::MAX
}

/// Binarise to 0/255. Pixels above `level` are foreground unless `invert`
/// is set, in which case pixels at or below it are.
pub fn threshold(frame: &FrameBuffer, level: u8, invert: bool) -> Result<FrameBuffer> {
    frame.ensure_gray()?;
    let data = frame
        .data()
        .iter()
        .map(|&v| if (v > level) != invert { 255 } else { 0 })
        .collect();
    FrameBuffer::from_raw(frame.width, frame.height, PixelFormat::Gray8, data)
}

/// Number of pixels whose intensity differs by at least `min_delta`.
pub fn count_changed(a: &FrameBuffer, b: &FrameBuffer, min_delta: u8) -> Result<usize> {
    a.ensure_same_size(b)?;
    if a.format != b.format {
        return Err(TrackError::UnsupportedFormat(
            "cannot compare frames of different pixel formats".into(),
        ));
    }
    Ok(a.data()
        .iter()
        .zip(b.data())
        .filter(|&(&p, &q)| p.abs_diff(q) >= min_delta)
        .count())
}

/// Location `(x, y)` and value of the brightest or darkest pixel. The first
/// one in row-major order wins ties. `None` for an empty frame.
pub fn find_extremum(frame: &FrameBuffer, polarity: Polarity) -> Result<Option<(u32, u32, u8)>> {
    frame.ensure_gray()?;
    let mut best: Option<(usize, u8)> = None;
    for (i, &v) in frame.data().iter().enumerate() {
        match best {
            Some((_, b)) if !polarity.better(v, b) => {}
            _ => best = Some((i, v)),
        }
    }
    let width = frame.width as usize;
    Ok(best.map(|(i, v)| ((i % width) as u32, (i / width) as u32, v)))
}

/// gray → optional background subtraction → median blur.
pub fn preprocess(
    frame: &FrameBuffer,
    background: Option<&FrameBuffer>,
    blur: u32,
) -> Result<FrameBuffer> {
    let gray = frame.to_gray();
    let diff = match background {
        Some(bg) => subtract(&gray, bg)?,
        None => gray,
    };
    median_blur(&diff, blur)
}
