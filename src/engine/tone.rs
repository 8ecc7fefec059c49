// src/engine/tone.rs
//
// Per-pixel tone and color adjustments. None of these touch alpha and all
// keep the input dimensions. Float results are clamped to [0, 255] and
// truncated, except posterize which snaps to the nearest level.

use super::buffer::{clamp_u8, luma709, PixelBuffer, CHANNELS};
use super::color::{hsl_to_rgb, rgb_to_hsl};
use super::pool;
use tracing::debug;

const TARGET: &str = "raster_cmd::tone";

/// Apply `f` to R, G and B of every pixel.
fn map_rgb(src: &PixelBuffer, f: impl Fn(u8) -> u8 + Sync + Send) -> PixelBuffer {
    src.map_pixels(|p| [f(p[0]), f(p[1]), f(p[2]), p[3]])
}

/// Black/white point stretch with an optional midtone gamma.
///
/// `white <= black` returns a clone; gamma is applied only when positive.
pub fn level(src: &PixelBuffer, black: f64, gamma: f64, white: f64) -> PixelBuffer {
    if !(white > black) {
        debug!(target: TARGET, black, white, "level with white <= black is a no-op");
        return src.clone();
    }
    let range = white - black;
    let inv_gamma = if gamma > 0.0 { Some(1.0 / gamma) } else { None };
    map_rgb(src, |v| {
        let mut n = ((v as f64 - black) / range).clamp(0.0, 1.0);
        if let Some(inv) = inv_gamma {
            n = n.powf(inv);
        }
        clamp_u8(n * 255.0)
    })
}

/// `pow(v/255, 1/g) * 255` per channel.
///
/// `g <= 0`, a non-finite `g` and `g == 1` all return a clone.
pub fn gamma(src: &PixelBuffer, g: f64) -> PixelBuffer {
    if !(g > 0.0) || !g.is_finite() {
        debug!(target: TARGET, gamma = g, "non-positive gamma is a no-op");
        return src.clone();
    }
    if g == 1.0 {
        return src.clone();
    }
    let inv = 1.0 / g;
    let lut: [u8; 256] = std::array::from_fn(|v| clamp_u8((v as f64 / 255.0).powf(inv) * 255.0));
    map_rgb(src, |v| lut[v as usize])
}

/// Per-channel observed `(min, max)` over R, G, B.
fn channel_extents(src: &PixelBuffer) -> [(u8, u8); 3] {
    let mut ext = [(255u8, 0u8); 3];
    for px in src.as_raw().chunks_exact(CHANNELS) {
        for c in 0..3 {
            ext[c].0 = ext[c].0.min(px[c]);
            ext[c].1 = ext[c].1.max(px[c]);
        }
    }
    ext
}

/// Stretch each channel's observed range to `[0, 255]`.
///
/// A channel with a single value keeps it.
pub fn normalize(src: &PixelBuffer) -> PixelBuffer {
    let ext = channel_extents(src);
    let luts: [[u8; 256]; 3] = std::array::from_fn(|c| {
        let (lo, hi) = ext[c];
        std::array::from_fn(|v| {
            if hi <= lo {
                // v / 255 * 255, without the float round trip
                return v as u8;
            }
            clamp_u8((v as f64 - lo as f64) / (hi as f64 - lo as f64) * 255.0)
        })
    });
    src.map_pixels(|p| {
        [
            luts[0][p[0] as usize],
            luts[1][p[1] as usize],
            luts[2][p[2] as usize],
            p[3],
        ]
    })
}

/// Alias of [`normalize`].
pub fn auto_level(src: &PixelBuffer) -> PixelBuffer {
    normalize(src)
}

/// Gamma that moves the mean Rec.709 luminance to 0.5, clamped to `[0.1, 10]`.
///
/// Returns None when the mean is 0 or 1 (or the image is empty).
pub fn auto_gamma_value(src: &PixelBuffer) -> Option<f64> {
    if src.is_empty() {
        return None;
    }
    let total = src.width() as f64 * src.height() as f64;
    let sum: f64 = src
        .as_raw()
        .chunks_exact(CHANNELS)
        .map(|p| luma709([p[0], p[1], p[2], p[3]]))
        .sum();
    let mean = sum / total;
    if mean <= 0.0 || mean >= 1.0 {
        return None;
    }
    let g = 0.5f64.ln() / mean.ln();
    g.is_finite().then(|| g.clamp(0.1, 10.0))
}

pub fn auto_gamma(src: &PixelBuffer) -> PixelBuffer {
    let Some(g) = auto_gamma_value(src) else {
        debug!(target: TARGET, "auto gamma undefined for this image, returning clone");
        return src.clone();
    };
    let lut: [u8; 256] = std::array::from_fn(|v| clamp_u8((v as f64 / 255.0).powf(g) * 255.0));
    map_rgb(src, |v| lut[v as usize])
}

/// Invert RGB. With `only_gray`, invert luminance only and rescale the
/// channels proportionally so the hue survives.
pub fn negate(src: &PixelBuffer, only_gray: bool) -> PixelBuffer {
    if !only_gray {
        return map_rgb(src, |v| 255 - v);
    }
    src.map_pixels(|p| {
        let lum = luma709(p);
        let inv = 1.0 - lum;
        if lum <= 0.0 {
            let g = clamp_u8(inv * 255.0);
            return [g, g, g, p[3]];
        }
        let scale = |v: u8| clamp_u8(inv * (v as f64 / 255.0 / lum) * 255.0);
        [scale(p[0]), scale(p[1]), scale(p[2]), p[3]]
    })
}

/// Binary threshold at `value` (clamped to 0..=255), on luminance or per channel.
pub fn threshold(src: &PixelBuffer, value: f64, per_channel: bool) -> PixelBuffer {
    let t = if value.is_nan() { 0.0 } else { value.clamp(0.0, 255.0) };
    let bin = |on: bool| if on { 255 } else { 0 };
    if per_channel {
        return map_rgb(src, |v| bin(v as f64 >= t));
    }
    src.map_pixels(|p| {
        let v = bin(luma709(p) * 255.0 >= t);
        [v, v, v, p[3]]
    })
}

/// Rec.709 luminance gray.
pub fn grayscale(src: &PixelBuffer) -> PixelBuffer {
    src.map_pixels(|p| {
        let v = clamp_u8(luma709(p) * 255.0);
        [v, v, v, p[3]]
    })
}

/// Quantize each channel to `levels` evenly spaced values.
pub fn posterize(src: &PixelBuffer, levels: i64) -> PixelBuffer {
    if levels < 2 {
        debug!(target: TARGET, levels, "posterize below two levels is a no-op");
        return src.clone();
    }
    let step = 255.0 / (levels - 1) as f64;
    map_rgb(src, |v| clamp_u8((v as f64 / step).round() * step))
}

/// HSL adjustment: lightness and saturation scale by percent, hue rotates by degrees.
pub fn modulate(src: &PixelBuffer, brightness: f64, saturation: f64, hue: f64) -> PixelBuffer {
    let b_factor = brightness / 100.0;
    let s_factor = saturation / 100.0;
    let shift = hue / 360.0;
    src.map_pixels(|p| {
        let (h, s, l) = rgb_to_hsl(
            p[0] as f64 / 255.0,
            p[1] as f64 / 255.0,
            p[2] as f64 / 255.0,
        );
        let h = (h + shift).rem_euclid(1.0);
        let s = (s * s_factor).clamp(0.0, 1.0);
        let l = (l * b_factor).clamp(0.0, 1.0);
        let (r, g, b) = hsl_to_rgb(h, s, l);
        [
            clamp_u8(r * 255.0),
            clamp_u8(g * 255.0),
            clamp_u8(b * 255.0),
            p[3],
        ]
    })
}

/// Radial darkening around `(cx, cy)`.
///
/// The mask rises from 0 at the center to 1 at `radius` following
/// `1 - exp(-d^2 / 2 sigma^2)`, normalized at `radius` and clamped. RGB is
/// scaled by `1 - mask * strength`.
pub fn vignette(src: &PixelBuffer, radius: f64, sigma: f64, cx: i64, cy: i64, strength: f64) -> PixelBuffer {
    let (w, h) = src.dimensions();
    let radius = if radius > 0.0 {
        radius
    } else {
        (w as f64).hypot(h as f64) / 2.0
    };
    let sigma = if sigma > 0.0 { sigma } else { radius / 3.0 };
    let strength = if strength.is_nan() { 1.0 } else { strength.clamp(0.0, 1.0) };
    let two_sigma_sq = 2.0 * sigma * sigma;
    let norm = 1.0 - (-(radius * radius) / two_sigma_sq).exp();

    let mut out = src.clone();
    let stride = src.stride();
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let ddy = (y0 + dy) as f64 - cy as f64;
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let ddx = x as f64 - cx as f64;
                let d_sq = ddx * ddx + ddy * ddy;
                let raw = 1.0 - (-d_sq / two_sigma_sq).exp();
                let mask = if norm > 0.0 { raw / norm } else { raw };
                let factor = 1.0 - mask.clamp(0.0, 1.0) * strength;
                for v in &mut px[..3] {
                    *v = clamp_u8(*v as f64 * factor);
                }
            }
        }
    });
    out
}
