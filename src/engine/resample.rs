// src/engine/resample.rs
//
// Lanczos resampling and arbitrary-angle rotation.

use super::buffer::{round_u8, PixelBuffer, CHANNELS};
use super::pool;
use std::f64::consts::PI;

/// Default Lanczos window.
pub const DEFAULT_LANCZOS_A: f64 = 3.0;

/// Extents within this distance of an integer do not round up.
const EXTENT_EPSILON: f64 = 1e-9;

#[inline]
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// `sinc(x) * sinc(x / a)` inside the window, 0 outside.
#[inline]
pub fn lanczos_kernel(x: f64, a: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else if x.abs() >= a {
        0.0
    } else {
        sinc(x) * sinc(x / a)
    }
}

/// Source taps for one destination coordinate on one axis.
struct Taps {
    start: i64,
    weights: Vec<f64>,
    sum: f64,
}

fn axis_taps(dst_len: u32, src_len: u32, a: f64) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|i| {
            let center = (i as f64 + 0.5) * scale - 0.5;
            let start = (center - a + 1.0).floor() as i64;
            let end = (center + a - 1.0).ceil() as i64;
            let weights: Vec<f64> = (start..=end)
                .map(|s| lanczos_kernel(center - s as f64, a))
                .collect();
            let sum = weights.iter().sum();
            Taps {
                start,
                weights,
                sum,
            }
        })
        .collect()
}

/// Resize to exactly `dst_w x dst_h` with a Lanczos window of `a` lobes.
///
/// Source taps outside the image are clamped to the edge. A zero target
/// dimension yields an empty buffer; a non-positive `a` uses the default.
pub fn resize_lanczos(src: &PixelBuffer, dst_w: u32, dst_h: u32, a: f64) -> PixelBuffer {
    if dst_w == 0 || dst_h == 0 {
        return PixelBuffer::new(dst_w, dst_h);
    }
    if src.is_empty() {
        return PixelBuffer::new(dst_w, dst_h);
    }
    let a = if a > 0.0 && a.is_finite() {
        a
    } else {
        DEFAULT_LANCZOS_A
    };
    let xs = axis_taps(dst_w, src.width(), a);
    let ys = axis_taps(dst_h, src.height(), a);

    let mut out = PixelBuffer::new(dst_w, dst_h);
    let stride = out.stride();
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let ty = &ys[y0 + dy];
            for (px, tx) in row.chunks_exact_mut(CHANNELS).zip(xs.iter()) {
                let mut acc = [0.0f64; 4];
                for (j, wy) in ty.weights.iter().enumerate() {
                    if *wy == 0.0 {
                        continue;
                    }
                    let sy = ty.start + j as i64;
                    for (i, wx) in tx.weights.iter().enumerate() {
                        let w = wx * wy;
                        if w == 0.0 {
                            continue;
                        }
                        let p = src.sample_clamped(tx.start + i as i64, sy);
                        for c in 0..CHANNELS {
                            acc[c] += p[c] as f64 * w;
                        }
                    }
                }
                let mut norm = tx.sum * ty.sum;
                if norm == 0.0 {
                    norm = 1.0;
                }
                for c in 0..CHANNELS {
                    px[c] = round_u8(acc[c] / norm);
                }
            }
        }
    });
    out
}

/// Output size for `adaptiveResize`: a zero side follows the source aspect.
///
/// Returns None when both sides are zero or a side ends up non-positive.
pub fn adaptive_dimensions(src_w: u32, src_h: u32, width: i64, height: i64) -> Option<(u32, u32)> {
    if (width == 0 && height == 0) || src_w == 0 || src_h == 0 {
        return None;
    }
    let (sw, sh) = (src_w as f64, src_h as f64);
    let w = if width == 0 {
        (sw * height as f64 / sh).trunc() as i64
    } else {
        width
    };
    let h = if height == 0 {
        (sh * width as f64 / sw).trunc() as i64
    } else {
        height
    };
    if w <= 0 || h <= 0 || w > u32::MAX as i64 || h > u32::MAX as i64 {
        return None;
    }
    Some((w as u32, h as u32))
}

/// Aspect-preserving Lanczos resize; degenerate targets return a clone.
pub fn adaptive_resize(src: &PixelBuffer, width: i64, height: i64, a: f64) -> PixelBuffer {
    match adaptive_dimensions(src.width(), src.height(), width, height) {
        Some((w, h)) => resize_lanczos(src, w, h, a),
        None => src.clone(),
    }
}

fn rotation_extent(w: u32, h: u32, degrees: f64) -> (f64, f64) {
    let rad = degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    let corners = [(-cx, -cy), (cx, -cy), (-cx, cy), (cx, cy)];
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let rx = x * cos - y * sin;
        let ry = x * sin + y * cos;
        min_x = min_x.min(rx);
        max_x = max_x.max(rx);
        min_y = min_y.min(ry);
        max_y = max_y.max(ry);
    }
    (max_x - min_x, max_y - min_y)
}

/// Bounding box of the image rotated by `degrees` about its center.
pub fn rotated_dimensions(w: u32, h: u32, degrees: f64) -> (u64, u64) {
    if !degrees.is_finite() {
        return (w as u64, h as u64);
    }
    let (ew, eh) = rotation_extent(w, h, degrees);
    let snap = |v: f64| (v - EXTENT_EPSILON).ceil().max(0.0) as u64;
    (snap(ew), snap(eh))
}

/// Rotate about the center into the full bounding box.
///
/// Each output pixel center is inverse-mapped into the source and sampled
/// bilinearly with clamping, so corners outside the source repeat the edge
/// rather than becoming transparent.
pub fn rotate(src: &PixelBuffer, degrees: f64) -> PixelBuffer {
    if src.is_empty() || !degrees.is_finite() {
        return src.clone();
    }
    let (nw, nh) = rotated_dimensions(src.width(), src.height(), degrees);
    let (nw, nh) = (nw as u32, nh as u32);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = src.width() as f64 / 2.0;
    let cy = src.height() as f64 / 2.0;
    let ncx = nw as f64 / 2.0;
    let ncy = nh as f64 / 2.0;

    let mut out = PixelBuffer::new(nw, nh);
    let stride = out.stride();
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let y_rel = (y0 + dy) as f64 + 0.5 - ncy;
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let x_rel = x as f64 + 0.5 - ncx;
                let sx = x_rel * cos + y_rel * sin + cx - 0.5;
                let sy = -x_rel * sin + y_rel * cos + cy - 0.5;
                let s = src.sample_bilinear(sx, sy);
                for c in 0..CHANNELS {
                    px[c] = round_u8(s[c]);
                }
            }
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::from_fn(w, h, |x, y| [(x * 40) as u8, (y * 40) as u8, ((x + y) * 10) as u8, 255])
    }

    mod lanczos {
        use super::*;

        #[test]
        fn kernel_shape() {
            assert_eq!(lanczos_kernel(0.0, 3.0), 1.0);
            assert_eq!(lanczos_kernel(3.0, 3.0), 0.0);
            assert_eq!(lanczos_kernel(-4.0, 3.0), 0.0);
            assert!(lanczos_kernel(1.0, 3.0).abs() < 1e-12);
            assert!(lanczos_kernel(0.5, 3.0) > 0.5);
        }

        #[test]
        fn output_has_requested_size() {
            let src = pattern(7, 5);
            for (w, h) in [(14, 10), (3, 2), (1, 1), (7, 20)] {
                assert_eq!(resize_lanczos(&src, w, h, 3.0).dimensions(), (w, h));
            }
        }

        #[test]
        fn zero_target_is_empty() {
            let out = resize_lanczos(&pattern(4, 4), 0, 9, 3.0);
            assert!(out.is_empty());
            assert_eq!(out.as_raw().len(), 0);
        }

        #[test]
        fn identity_size_preserves_pixels() {
            let src = pattern(6, 4);
            assert_eq!(resize_lanczos(&src, 6, 4, 3.0), src);
        }

        #[test]
        fn uniform_stays_uniform() {
            let src = PixelBuffer::filled(5, 5, [33, 66, 99, 200]);
            let out = resize_lanczos(&src, 13, 2, 3.0);
            assert!(out.as_raw().chunks_exact(4).all(|p| p == [33, 66, 99, 200]));
        }
    }

    mod adaptive {
        use super::*;

        #[test]
        fn derives_missing_side_from_aspect() {
            assert_eq!(adaptive_dimensions(200, 100, 50, 0), Some((50, 25)));
            assert_eq!(adaptive_dimensions(200, 100, 0, 30), Some((60, 30)));
        }

        #[test]
        fn degenerate_targets() {
            assert_eq!(adaptive_dimensions(200, 100, 0, 0), None);
            assert_eq!(adaptive_dimensions(200, 100, -5, 10), None);
            assert_eq!(adaptive_dimensions(1, 100, 0, 1), None);
            let src = pattern(3, 3);
            assert_eq!(adaptive_resize(&src, 0, 0, 3.0), src);
        }
    }

    mod rotation {
        use super::*;

        #[test]
        fn right_angles_swap_dimensions() {
            assert_eq!(rotated_dimensions(6, 4, 90.0), (4, 6));
            assert_eq!(rotated_dimensions(6, 4, 180.0), (6, 4));
            assert_eq!(rotated_dimensions(6, 4, -270.0), (4, 6));
        }

        #[test]
        fn diagonal_grows_box() {
            let (w, h) = rotated_dimensions(10, 10, 45.0);
            assert_eq!((w, h), (15, 15));
        }

        #[test]
        fn zero_degrees_is_identity() {
            let src = pattern(5, 3);
            assert_eq!(rotate(&src, 0.0), src);
        }

        #[test]
        fn ninety_degrees_moves_corners() {
            let src = pattern(4, 2);
            let out = rotate(&src, 90.0);
            assert_eq!(out.dimensions(), (2, 4));
            // Clockwise in image coordinates: source bottom-left lands top-left.
            assert_eq!(out.get(0, 0), src.get(0, 1));
            assert_eq!(out.get(1, 3), src.get(3, 0));
        }

        #[test]
        fn empty_and_non_finite() {
            let empty = PixelBuffer::new(0, 0);
            assert!(rotate(&empty, 30.0).is_empty());
            let src = pattern(3, 3);
            assert_eq!(rotate(&src, f64::NAN), src);
        }
    }
}
