// src/engine/adaptive.rs
//
// Content-adaptive filters built on integral images: variance-driven blur,
// gradient-estimated sharpening and local-mean thresholding.

use super::buffer::{round_u8, PixelBuffer, CHANNELS};
use super::convolution::{blur, unsharp};
use super::pool;
use tracing::debug;

/// Summed-area table of a scalar field and of its squares.
pub(crate) struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImage {
    /// Build over `values` laid out row-major as `width x height`.
    pub(crate) fn new(values: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1)];
        let mut sum_sq = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width {
                let v = values[y * width + x];
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }
        Self {
            width,
            height,
            sum,
            sum_sq,
        }
    }

    /// `(sum, sum of squares, pixel count)` over the inclusive rectangle
    /// `[x0, x1] x [y0, y1]`, clipped to the field.
    pub(crate) fn window(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> (f64, f64, f64) {
        if self.width == 0 || self.height == 0 {
            return (0.0, 0.0, 0.0);
        }
        let x0 = x0.clamp(0, self.width as i64 - 1) as usize;
        let y0 = y0.clamp(0, self.height as i64 - 1) as usize;
        let x1 = x1.clamp(0, self.width as i64 - 1) as usize;
        let y1 = y1.clamp(0, self.height as i64 - 1) as usize;
        if x1 < x0 || y1 < y0 {
            return (0.0, 0.0, 0.0);
        }
        let stride = self.width + 1;
        let a = y0 * stride + x0;
        let b = y0 * stride + x1 + 1;
        let c = (y1 + 1) * stride + x0;
        let d = (y1 + 1) * stride + x1 + 1;
        let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f64;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
            area,
        )
    }
}

/// Rec.709 luminance of every pixel, multiplied by `scale`.
fn luminance_field(src: &PixelBuffer, scale: f64) -> Vec<f64> {
    src.as_raw()
        .chunks_exact(CHANNELS)
        .map(|p| (0.2126 * p[0] as f64 + 0.7152 * p[1] as f64 + 0.0722 * p[2] as f64) * scale)
        .collect()
}

/// Most precomputed blur levels; larger requests are capped.
pub const MAX_BLUR_LEVELS: i64 = 64;

/// Blur less where local luminance variance is high.
///
/// `levels` Gaussian blurs are precomputed at sigmas evenly spaced from
/// `sigma_min` to `sigma_max`; each pixel interpolates RGB between the two
/// levels bracketing its normalized variance. Alpha is copied from `src`.
///
/// With `levels <= 1` or equal sigmas this is a plain Gaussian blur at
/// `sigma_max`, alpha included.
pub fn adaptive_blur(
    src: &PixelBuffer,
    radius: f64,
    sigma_min: f64,
    sigma_max: f64,
    levels: i64,
) -> PixelBuffer {
    let levels = levels.min(MAX_BLUR_LEVELS);
    if levels <= 1 || sigma_min == sigma_max {
        debug!(target: "raster_cmd::adaptive", levels, sigma_max, "adaptive blur degenerates to uniform blur");
        return blur(src, sigma_max);
    }
    if src.is_empty() {
        return src.clone();
    }
    let (w, h) = (src.width() as usize, src.height() as usize);
    let levels = levels as usize;
    let integral = IntegralImage::new(&luminance_field(src, 1.0 / 255.0), w, h);
    let r = if radius.is_finite() { radius.floor().max(1.0) as i64 } else { 1 };
    let r = r.min(w.max(h) as i64);

    let variances: Vec<f64> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x as i64, y as i64)))
        .map(|(x, y)| {
            let (s, s2, area) = integral.window(x - r, y - r, x + r, y + r);
            let mean = s / area;
            (s2 / area - mean * mean).max(0.0)
        })
        .collect();
    let min_var = variances.iter().copied().fold(f64::INFINITY, f64::min);
    let max_var = variances.iter().copied().fold(0.0, f64::max);

    let blurred: Vec<PixelBuffer> = (0..levels)
        .map(|i| {
            let sigma = sigma_min + (sigma_max - sigma_min) * i as f64 / (levels - 1) as f64;
            blur(src, sigma)
        })
        .collect();

    let mut out = src.clone();
    let stride = src.stride();
    let (blurred, variances) = (&blurred, &variances);
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let y = y0 + dy;
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let v = variances[y * w + x];
                let norm = if max_var > min_var {
                    ((v - min_var) / (max_var - min_var)).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let idx_f = (1.0 - norm) * (levels - 1) as f64;
                let idx0 = idx_f.floor() as usize;
                let o = x * CHANNELS;
                if idx0 >= levels - 1 {
                    let last = blurred[levels - 1].row(y as u32);
                    px[..3].copy_from_slice(&last[o..o + 3]);
                    continue;
                }
                let t = idx_f - idx0 as f64;
                let a = blurred[idx0].row(y as u32);
                let b = blurred[idx0 + 1].row(y as u32);
                for c in 0..3 {
                    px[c] = round_u8(a[o + c] as f64 * (1.0 - t) + b[o + c] as f64 * t);
                }
            }
        }
    });
    out
}

/// Blur sigma picked from mean luminance gradient: busier images get a
/// smaller sigma. Result is clamped to `[0.5, 2.0]`.
pub fn estimate_sharpen_sigma(src: &PixelBuffer) -> f64 {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let lum = luminance_field(src, 1.0);
    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            let v = lum[y * w + x];
            let dx = if x + 1 < w { lum[y * w + x + 1] - v } else { 0.0 };
            let dy = if y + 1 < h { lum[(y + 1) * w + x] - v } else { 0.0 };
            total += dx.abs() + dy.abs();
            count += 1;
        }
    }
    let mean_grad = total / (count + 1) as f64;
    (16.0 / (mean_grad + 1e-6)).clamp(0.5, 2.0)
}

/// Unsharp mask whose sigma is estimated when `radius == 0` or `sigma <= 0`.
pub fn adaptive_sharpen(src: &PixelBuffer, radius: f64, sigma: f64, amount: f64) -> PixelBuffer {
    let amount = if amount > 0.0 { amount } else { 1.0 };
    let sigma = if radius == 0.0 || !(sigma > 0.0) {
        estimate_sharpen_sigma(src)
    } else {
        sigma
    };
    unsharp(src, sigma, amount, 0.0)
}

/// Bilevel output: white where luminance exceeds the local window mean
/// minus `offset`. Non-positive window sides default to 15.
pub fn adaptive_threshold(src: &PixelBuffer, window_w: i64, window_h: i64, offset: f64) -> PixelBuffer {
    if src.is_empty() {
        return src.clone();
    }
    let window_w = if window_w > 0 { window_w } else { 15 };
    let window_h = if window_h > 0 { window_h } else { 15 };
    let (w, h) = (src.width() as usize, src.height() as usize);
    let lum = luminance_field(src, 1.0);
    let integral = IntegralImage::new(&lum, w, h);
    let (half_w, half_h) = (window_w / 2, window_h / 2);

    let mut out = src.clone();
    let stride = src.stride();
    let lum = &lum;
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let y = (y0 + dy) as i64;
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let xi = x as i64;
                let (s, _, area) = integral.window(xi - half_w, y - half_h, xi + half_w, y + half_h);
                let mean = s / area;
                let v = if lum[y as usize * w + x] > mean - offset { 255 } else { 0 };
                px[..3].fill(v);
            }
        }
    });
    out
}
