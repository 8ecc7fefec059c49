// src/engine/sepia.rs
//
// Lab-space sepia toning toward #704214 with midtone weighting, highlight
// protection and an optional filmic lightness curve.

use super::buffer::{round_u8, PixelBuffer, CHANNELS};
use super::color::{lab_to_rgb, rgb_to_lab};
use super::pool;
use crate::ops::SepiaOptions;
use once_cell::sync::Lazy;

/// Rows below which toning runs on the calling thread.
pub const SEPIA_PARALLEL_MIN_ROWS: usize = 64;

/// Lab of the sepia target `#704214`.
pub static SEPIA_TARGET_LAB: Lazy<[f64; 3]> = Lazy::new(|| rgb_to_lab([0x70, 0x42, 0x14, 0xff]));

#[inline]
fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Bell weight around `center`; a non-positive sigma weighs everything fully.
#[inline]
fn midtone_weight(l: f64, center: f64, sigma: f64) -> f64 {
    if !(sigma > 0.0) {
        return 1.0;
    }
    let d = l - center;
    (-(d * d) / (2.0 * sigma * sigma)).exp()
}

/// 1 below `threshold`, easing to 0 over `softness` lightness units above it.
#[inline]
fn highlight_protect(l: f64, threshold: f64, softness: f64) -> f64 {
    if l <= threshold {
        1.0
    } else if !(softness > 0.0) {
        0.0
    } else {
        1.0 - smoothstep((l - threshold) / softness)
    }
}

/// Per-pixel blend factor toward the target.
///
/// The tonal weight is lifted toward 1 as `percentage` approaches 1, so a
/// full-strength tone reaches the target everywhere while weaker tones
/// concentrate on the midtones.
fn local_factor(l: f64, percentage: f64, opts: &SepiaOptions) -> f64 {
    let tone = midtone_weight(l, opts.midtone_center, opts.midtone_sigma)
        * highlight_protect(l, opts.highlight_threshold, opts.highlight_softness);
    percentage * (tone + (1.0 - tone) * percentage)
}

/// Filmic S-curve on lightness, scaled by `strength`.
#[inline]
fn film_curve(l: f64, strength: f64) -> f64 {
    if strength <= 0.0 {
        return l;
    }
    let s = smoothstep(l / 100.0) * 100.0;
    l + strength * (s - l)
}

fn tone_pixel(px: &mut [u8], percentage: f64, curve: f64, opts: &SepiaOptions) {
    if px[3] == 0 {
        return;
    }
    let lab = rgb_to_lab([px[0], px[1], px[2], px[3]]);
    let target = *SEPIA_TARGET_LAB;
    let k = local_factor(lab[0], percentage, opts);
    let mut blended = [
        lab[0] + (target[0] - lab[0]) * k,
        lab[1] + (target[1] - lab[1]) * k,
        lab[2] + (target[2] - lab[2]) * k,
    ];
    blended[0] = film_curve(blended[0], curve * k);
    let rgb = lab_to_rgb(blended);
    px[0] = round_u8(rgb[0]);
    px[1] = round_u8(rgb[1]);
    px[2] = round_u8(rgb[2]);
}

/// Tone `src` toward sepia. `percentage <= 0` returns a clone; values above
/// 1 are treated as 1. Fully transparent pixels are left untouched.
pub fn sepia(src: &PixelBuffer, opts: &SepiaOptions) -> PixelBuffer {
    let percentage = opts.percentage;
    if !(percentage > 0.0) || src.is_empty() {
        tracing::trace!(target: "raster_cmd::tone", percentage, "sepia strength is zero, returning clone");
        return src.clone();
    }
    let percentage = percentage.min(1.0);
    let curve = if opts.curve.is_finite() { opts.curve.clamp(0.0, 1.0) } else { 0.0 };

    let mut out = src.clone();
    let stride = src.stride();
    pool::for_each_row_band(out.data_mut(), stride, SEPIA_PARALLEL_MIN_ROWS, |_, band| {
        for px in band.chunks_exact_mut(CHANNELS) {
            tone_pixel(px, percentage, curve, opts);
        }
    });
    out
}
