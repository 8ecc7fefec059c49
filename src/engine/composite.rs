// src/engine/composite.rs
//
// Blend-mode compositing of one buffer onto another at an offset.

use super::buffer::{round_u8, PixelBuffer, CHANNELS};
use crate::ops::BlendMode;

impl BlendMode {
    /// Blend one normalized source channel with the destination channel.
    #[inline]
    pub fn blend(self, s: f64, d: f64) -> f64 {
        match self {
            Self::Multiply => s * d,
            Self::Screen => 1.0 - (1.0 - s) * (1.0 - d),
            Self::Overlay => {
                if d < 0.5 {
                    2.0 * s * d
                } else {
                    1.0 - 2.0 * (1.0 - s) * (1.0 - d)
                }
            }
            Self::Add => (s + d).clamp(0.0, 1.0),
            Self::Difference => (d - s).abs(),
            // Dissolve is driven entirely by source alpha.
            Self::Over | Self::Dissolve => s,
        }
    }
}

/// Overlap of a `src_w x src_h` rectangle placed at `(x, y)` with the
/// destination, as half-open `(x0, y0, x1, y1)` in destination coordinates.
pub fn overlap(dst_w: u32, dst_h: u32, src_w: u32, src_h: u32, x: i64, y: i64) -> Option<(u32, u32, u32, u32)> {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = x.saturating_add(src_w as i64).min(dst_w as i64);
    let y1 = y.saturating_add(src_h as i64).min(dst_h as i64);
    (x0 < x1 && y0 < y1).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Blend `src` onto a copy of `dst` with its top-left corner at `(x, y)`.
///
/// The blended color is laid over the destination with straight alpha:
/// `out_a = sa + da * (1 - sa)`, `out_c = (1 - sa) * d + sa * blend(s, d)`.
/// Pixels outside the source footprint are untouched.
pub fn composite(dst: &PixelBuffer, src: &PixelBuffer, mode: BlendMode, x: i64, y: i64) -> PixelBuffer {
    let mut out = dst.clone();
    let Some((x0, y0, x1, y1)) = overlap(dst.width(), dst.height(), src.width(), src.height(), x, y) else {
        tracing::debug!(target: "raster_cmd::composite", x, y, "composite source misses the destination");
        return out;
    };
    let stride = out.stride();
    let data = out.data_mut();
    for dy in y0..y1 {
        let src_row = src.row((dy as i64 - y) as u32);
        for dx in x0..x1 {
            let so = (dx as i64 - x) as usize * CHANNELS;
            let s = &src_row[so..so + CHANNELS];
            let o = dy as usize * stride + dx as usize * CHANNELS;
            let d = &mut data[o..o + CHANNELS];

            let sa = s[3] as f64 / 255.0;
            let da = d[3] as f64 / 255.0;
            for c in 0..3 {
                let sc = s[c] as f64 / 255.0;
                let dc = d[c] as f64 / 255.0;
                let blended = mode.blend(sc, dc);
                d[c] = round_u8(((1.0 - sa) * dc + sa * blended) * 255.0);
            }
            d[3] = round_u8((sa + da * (1.0 - sa)) * 255.0);
        }
    }
    out
}
