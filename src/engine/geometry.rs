// src/engine/geometry.rs
//
// Lossless pixel rearrangement: mirrors, right-angle rotations, EXIF
// orientation correction, crop and trim.

use super::buffer::{PixelBuffer, CHANNELS};
use crate::ops::Orientation;

/// Build a `w x h` buffer where output `(x, y)` copies source `map(x, y)`.
fn remap(src: &PixelBuffer, w: u32, h: u32, map: impl Fn(u32, u32) -> (u32, u32)) -> PixelBuffer {
    PixelBuffer::from_fn(w, h, |x, y| {
        let (sx, sy) = map(x, y);
        src.sample_clamped(sx as i64, sy as i64)
    })
}

/// Mirror top to bottom.
pub fn flip(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    let mut data = Vec::with_capacity(src.as_raw().len());
    for y in (0..h).rev() {
        data.extend_from_slice(src.row(y));
    }
    PixelBuffer::from_raw(w, h, data).unwrap_or_else(|_| src.clone())
}

/// Mirror left to right.
pub fn flop(src: &PixelBuffer) -> PixelBuffer {
    let mut out = src.clone();
    let stride = src.stride();
    if stride == 0 {
        return out;
    }
    for row in out.data_mut().chunks_exact_mut(stride) {
        let pixels = row.len() / CHANNELS;
        for i in 0..pixels / 2 {
            let j = pixels - 1 - i;
            for c in 0..CHANNELS {
                row.swap(i * CHANNELS + c, j * CHANNELS + c);
            }
        }
    }
    out
}

pub fn rotate180(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    remap(src, w, h, |x, y| (w - 1 - x, h - 1 - y))
}

pub fn rotate90_cw(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    remap(src, h, w, |x, y| (y, h - 1 - x))
}

pub fn rotate90_ccw(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    remap(src, h, w, |x, y| (w - 1 - y, x))
}

/// Mirror across the main diagonal.
pub fn transpose(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    remap(src, h, w, |x, y| (y, x))
}

/// Mirror across the anti-diagonal.
pub fn transverse(src: &PixelBuffer) -> PixelBuffer {
    let (w, h) = src.dimensions();
    remap(src, h, w, |x, y| (w - 1 - y, h - 1 - x))
}

/// Undo the stored EXIF orientation so the image displays upright.
pub fn auto_orient(src: &PixelBuffer, orientation: Orientation) -> PixelBuffer {
    if src.is_empty() {
        if orientation.swaps_dimensions() {
            return PixelBuffer::new(src.height(), src.width());
        }
        return src.clone();
    }
    match orientation {
        Orientation::TopLeft => src.clone(),
        Orientation::TopRight => flop(src),
        Orientation::BottomRight => rotate180(src),
        Orientation::BottomLeft => flip(src),
        Orientation::LeftTop => transpose(src),
        Orientation::RightTop => rotate90_cw(src),
        Orientation::RightBottom => transverse(src),
        Orientation::LeftBottom => rotate90_ccw(src),
    }
}

/// Intersection of `[x, x+width) x [y, y+height)` with the image.
///
/// Returns `(x0, y0, w, h)`; an empty intersection has a zero side.
pub fn crop_rect(img_w: u32, img_h: u32, width: u32, height: u32, x: i64, y: i64) -> (u32, u32, u32, u32) {
    let x0 = x.clamp(0, img_w as i64);
    let y0 = y.clamp(0, img_h as i64);
    let x1 = x.saturating_add(width as i64).clamp(x0, img_w as i64);
    let y1 = y.saturating_add(height as i64).clamp(y0, img_h as i64);
    (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
}

pub fn crop(src: &PixelBuffer, width: u32, height: u32, x: i64, y: i64) -> PixelBuffer {
    let (x0, y0, w, h) = crop_rect(src.width(), src.height(), width, height, x, y);
    if w == 0 || h == 0 {
        tracing::debug!(target: "raster_cmd::geometry", x, y, width, height, "crop misses the image");
        return PixelBuffer::new(w, h);
    }
    src.sub_image(x0, y0, w, h)
}

/// Bounding box of pixels whose RGB distance from the top-left pixel
/// exceeds `fuzz`, or None when every pixel is within tolerance.
pub fn trim_bounds(src: &PixelBuffer, fuzz: f64) -> Option<(u32, u32, u32, u32)> {
    let reference = src.get(0, 0)?;
    let fuzz_sq = fuzz * fuzz;
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;
    for y in 0..src.height() {
        for (x, px) in src.row(y).chunks_exact(CHANNELS).enumerate() {
            let dist_sq: f64 = (0..3)
                .map(|c| {
                    let d = px[c] as f64 - reference[c] as f64;
                    d * d
                })
                .sum();
            if dist_sq > fuzz_sq {
                let x = x as u32;
                found = true;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }
    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Remove the border that matches the top-left pixel within `fuzz`.
pub fn trim(src: &PixelBuffer, fuzz: f64) -> PixelBuffer {
    match trim_bounds(src, fuzz) {
        Some((x, y, w, h)) => src.sub_image(x, y, w, h),
        None => {
            tracing::debug!(target: "raster_cmd::geometry", fuzz, "trim found no content, returning clone");
            src.clone()
        }
    }
}
