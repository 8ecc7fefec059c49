// src/engine/floodfill.rs
//
// Perceptual flood fill: Lab distance matching, span-based 8-connected
// region discovery into a 1-bit mask, and straight-alpha fill compositing.

use super::buffer::{blend_over, Pixel, PixelBuffer, CHANNELS};
use super::color::{lab_distance_sq, rgb_to_lab};
use super::pool;

/// Largest accepted fuzz, in Lab Delta-E units.
pub const MAX_FUZZ: f64 = 200.0;

/// One bit per pixel, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionMask {
    width: u32,
    height: u32,
    words: Vec<u64>,
}

impl RegionMask {
    pub fn new(width: u32, height: u32) -> Self {
        let bits = width as usize * height as usize;
        Self {
            width,
            height,
            words: vec![0; bits.div_ceil(64)],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Out-of-range coordinates read as unset.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = self.index(x, y);
        self.words[i / 64] >> (i % 64) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.words[i / 64] |= 1 << (i % 64);
        }
    }

    /// Flip every bit inside the image.
    pub fn invert(&mut self) {
        for w in &mut self.words {
            *w = !*w;
        }
        let bits = self.width as usize * self.height as usize;
        if bits % 64 != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << (bits % 64)) - 1;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Pixel acceptance test for a single fill.
struct Matcher {
    reference: [f64; 3],
    border: bool,
    fuzz_sq: f64,
}

impl Matcher {
    /// Without a border, pixels near the seed color match. With one, every
    /// pixel matches except those near the border color.
    fn new(seed: Pixel, border: Option<Pixel>, fuzz: f64) -> Self {
        let fuzz = if fuzz.is_nan() { 0.0 } else { fuzz.clamp(0.0, MAX_FUZZ) };
        Self {
            reference: rgb_to_lab(border.unwrap_or(seed)),
            border: border.is_some(),
            fuzz_sq: fuzz * fuzz,
        }
    }

    #[inline]
    fn matches(&self, px: Pixel) -> bool {
        let near = lab_distance_sq(rgb_to_lab(px), self.reference) <= self.fuzz_sq;
        near != self.border
    }
}

/// Span fill from `(sx, sy)`: each popped seed grows left and right into a
/// run, then the rows above and below are scanned over the run widened by
/// one pixel on each side, pushing one seed per unvisited matching run.
fn span_fill(src: &PixelBuffer, matcher: &Matcher, sx: u32, sy: u32, mask: &mut RegionMask) {
    let (w, h) = src.dimensions();
    let fillable = |mask: &RegionMask, x: u32, y: u32| {
        !mask.get(x, y) && src.get(x, y).is_some_and(|p| matcher.matches(p))
    };
    let mut stack = vec![(sx, sy)];
    while let Some((x, y)) = stack.pop() {
        if !fillable(mask, x, y) {
            continue;
        }
        let mut left = x;
        while left > 0 && fillable(mask, left - 1, y) {
            left -= 1;
        }
        let mut right = x;
        while right + 1 < w && fillable(mask, right + 1, y) {
            right += 1;
        }
        for xi in left..=right {
            mask.set(xi, y);
        }

        let from = left.saturating_sub(1);
        let to = (right + 1).min(w - 1);
        for ny in [y.checked_sub(1), Some(y + 1).filter(|&v| v < h)].into_iter().flatten() {
            let mut nx = from;
            while nx <= to {
                if !fillable(mask, nx, ny) {
                    nx += 1;
                    continue;
                }
                stack.push((nx, ny));
                nx += 1;
                while nx <= to && fillable(mask, nx, ny) {
                    nx += 1;
                }
            }
        }
    }
}

/// Region selected by a fill from `(x, y)` (clamped into the image).
///
/// With `invert` and no border, matching is evaluated over the whole image
/// instead of by connectivity before the mask is flipped.
pub fn region_mask(
    src: &PixelBuffer,
    fuzz: f64,
    border: Option<Pixel>,
    x: i64,
    y: i64,
    invert: bool,
) -> RegionMask {
    let (w, h) = src.dimensions();
    let mut mask = RegionMask::new(w, h);
    if src.is_empty() {
        return mask;
    }
    let sx = x.clamp(0, w as i64 - 1) as u32;
    let sy = y.clamp(0, h as i64 - 1) as u32;
    let matcher = Matcher::new(src.sample_clamped(sx as i64, sy as i64), border, fuzz);

    if invert && border.is_none() {
        for py in 0..h {
            for (px, p) in src.row(py).chunks_exact(CHANNELS).enumerate() {
                if matcher.matches([p[0], p[1], p[2], p[3]]) {
                    mask.set(px as u32, py);
                }
            }
        }
    } else {
        span_fill(src, &matcher, sx, sy, &mut mask);
    }
    if invert {
        mask.invert();
    }
    mask
}

/// Straight-alpha "over" of `fill` onto every masked pixel.
pub fn paint_mask(src: &PixelBuffer, mask: &RegionMask, fill: Pixel) -> PixelBuffer {
    let mut out = src.clone();
    let stride = src.stride();
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let y = (y0 + dy) as u32;
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                if mask.get(x as u32, y) {
                    blend_over(px, fill);
                }
            }
        }
    });
    out
}

/// Flood fill from `(x, y)` with `fill`, composited over the source.
///
/// `fuzz` is a Lab Delta-E tolerance clamped to `[0, 200]`; `border`, when
/// present, turns the fill into "everything up to this color".
pub fn floodfill_paint(
    src: &PixelBuffer,
    fill: Pixel,
    fuzz: f64,
    border: Option<Pixel>,
    x: i64,
    y: i64,
    invert: bool,
) -> PixelBuffer {
    let mask = region_mask(src, fuzz, border, x, y, invert);
    tracing::trace!(target: "raster_cmd::floodfill", filled = mask.count(), invert, "flood fill region");
    paint_mask(src, &mask, fill)
}
