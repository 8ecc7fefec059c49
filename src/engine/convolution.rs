// src/engine/convolution.rs
//
// Neighbourhood filters: separable Gaussian blur, unsharp masking,
// Sobel edge magnitude and the sliding-histogram median filter.
//
// All passes clamp neighbour coordinates into the image, so borders are
// edge-extended. Output rows are written in disjoint bands on the worker pool.

use super::buffer::{luma709, round_u8, PixelBuffer, CHANNELS};
use super::pool;
use std::borrow::Cow;

/// Upper bound on the Gaussian kernel radius.
pub const MAX_KERNEL_RADIUS: i64 = 2048;

/// Normalized 1-D Gaussian weights with radius `ceil(3 * sigma)`, capped at
/// [`MAX_KERNEL_RADIUS`].
///
/// A non-positive or non-finite sigma gives the single tap `[1.0]`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return vec![1.0];
    }
    let radius = ((3.0 * sigma).ceil() as i64).min(MAX_KERNEL_RADIUS);
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / two_sigma_sq).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Separable Gaussian blur over all four channels.
pub fn blur(src: &PixelBuffer, sigma: f64) -> PixelBuffer {
    let kernel = gaussian_kernel(sigma);
    if kernel.len() == 1 || src.is_empty() {
        return src.clone();
    }
    let radius = (kernel.len() / 2) as i64;
    let (w, h) = src.dimensions();
    let stride = src.stride();
    let last_x = w as i64 - 1;
    let last_y = h as i64 - 1;

    let mut horizontal = PixelBuffer::new(w, h);
    pool::for_each_row_band(horizontal.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let srow = src.row((y0 + dy) as u32);
            for x in 0..w as i64 {
                let mut acc = [0.0f64; 4];
                for (k, wt) in kernel.iter().enumerate() {
                    let sx = (x + k as i64 - radius).clamp(0, last_x) as usize * CHANNELS;
                    for c in 0..CHANNELS {
                        acc[c] += srow[sx + c] as f64 * wt;
                    }
                }
                let o = x as usize * CHANNELS;
                for c in 0..CHANNELS {
                    row[o + c] = round_u8(acc[c]);
                }
            }
        }
    });

    let mut out = PixelBuffer::new(w, h);
    let horizontal = &horizontal;
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let y = (y0 + dy) as i64;
            for (i, value) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, wt) in kernel.iter().enumerate() {
                    let sy = (y + k as i64 - radius).clamp(0, last_y) as u32;
                    acc += horizontal.row(sy)[i] as f64 * wt;
                }
                *value = round_u8(acc);
            }
        }
    });
    out
}

/// Unsharp mask: `s + amount * (s - blur(s))` on every channel.
///
/// With `threshold > 0`, pixels whose RGB mask magnitude is below the
/// threshold on all three channels are copied unchanged.
pub fn unsharp(src: &PixelBuffer, sigma: f64, amount: f64, threshold: f64) -> PixelBuffer {
    let blurred = blur(src, sigma);
    let mut out = src.clone();
    let stride = src.stride();
    let blurred = &blurred;
    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let brow = blurred.row((y0 + dy) as u32);
            for (px, bpx) in row
                .chunks_exact_mut(CHANNELS)
                .zip(brow.chunks_exact(CHANNELS))
            {
                if threshold > 0.0
                    && (0..3).all(|c| (px[c] as f64 - bpx[c] as f64).abs() < threshold)
                {
                    continue;
                }
                for c in 0..CHANNELS {
                    let s = px[c] as f64;
                    px[c] = round_u8(s + amount * (s - bpx[c] as f64));
                }
            }
        }
    });
    out
}

/// Sobel gradient magnitude of Rec.709 luminance, rendered as opaque gray.
///
/// The magnitude is scaled by `scale` when positive, then normalized so the
/// strongest edge is 255. A positive `threshold` either zeroes weaker
/// responses or, in `binary` mode, maps every pixel to 0 or 255.
pub fn edge(src: &PixelBuffer, sigma: f64, scale: f64, threshold: f64, binary: bool) -> PixelBuffer {
    if src.is_empty() {
        return src.clone();
    }
    let base: Cow<'_, PixelBuffer> = if sigma > 0.0 {
        Cow::Owned(blur(src, sigma))
    } else {
        Cow::Borrowed(src)
    };
    let (w, h) = base.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let lum: Vec<f64> = base
        .as_raw()
        .chunks_exact(CHANNELS)
        .map(|p| luma709([p[0], p[1], p[2], p[3]]))
        .collect();
    let at = |x: i64, y: i64| lum[(y.clamp(0, hi - 1) * wi + x.clamp(0, wi - 1)) as usize];

    let rows: Vec<Vec<f64>> = pool::par_collect(h as usize, |y| {
        let y = y as i64;
        (0..wi)
            .map(|x| {
                let gx = -at(x - 1, y - 1) + at(x + 1, y - 1) - 2.0 * at(x - 1, y)
                    + 2.0 * at(x + 1, y)
                    - at(x - 1, y + 1)
                    + at(x + 1, y + 1);
                let gy = -at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1)
                    + at(x - 1, y + 1)
                    + 2.0 * at(x, y + 1)
                    + at(x + 1, y + 1);
                let m = (gx * gx + gy * gy).sqrt();
                if scale > 0.0 {
                    m * scale
                } else {
                    m
                }
            })
            .collect()
    });
    let max = rows.iter().flatten().fold(0.0f64, |a, &b| a.max(b));

    let mut out = PixelBuffer::new(w, h);
    for (y, row) in rows.iter().enumerate() {
        for (x, &raw) in row.iter().enumerate() {
            let mut m = if max > 0.0 { raw / max * 255.0 } else { 0.0 };
            if threshold > 0.0 {
                if binary {
                    m = if m >= threshold { 255.0 } else { 0.0 };
                } else if m < threshold {
                    m = 0.0;
                }
            }
            let v = round_u8(m);
            out.put(x as u32, y as u32, [v, v, v, 255]);
        }
    }
    out
}

/// Per-channel median over a `(2r+1)^2` window clipped to the image.
///
/// Each row keeps four 256-bucket histograms and a running median per
/// channel; sliding one column updates the buckets and walks the median
/// pointer until the count of values at or below it straddles the midpoint.
/// `radius <= 0` returns a clone.
pub fn median(src: &PixelBuffer, radius: i64) -> PixelBuffer {
    if radius <= 0 || src.is_empty() {
        return src.clone();
    }
    let (w, h) = src.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let r = radius.min(wi.max(hi));
    let stride = src.stride();
    let mut out = PixelBuffer::new(w, h);

    pool::for_each_row_band(out.data_mut(), stride, 1, |y0, band| {
        for (dy, row) in band.chunks_exact_mut(stride).enumerate() {
            let y = (y0 + dy) as i64;
            let ya = (y - r).max(0) as u32;
            let yb = (y + r).min(hi - 1) as u32;
            let column_len = yb - ya + 1;
            let mut hist = [[0u32; 256]; CHANNELS];
            let mut count = 0u32;

            let mut med = [0usize; CHANNELS];
            let mut cum = [0u32; CHANNELS];
            for x in 0..=r.min(wi - 1) {
                shift_column(src, ya..=yb, x as usize, true, &mut hist, &med, &mut cum);
                count += column_len;
            }

            let half = (count + 1) / 2;
            for c in 0..CHANNELS {
                let mut acc = 0;
                for (v, &n) in hist[c].iter().enumerate() {
                    acc += n;
                    if acc >= half {
                        med[c] = v;
                        cum[c] = acc;
                        break;
                    }
                }
            }

            for x in 0..wi {
                let o = x as usize * CHANNELS;
                for c in 0..CHANNELS {
                    row[o + c] = med[c] as u8;
                }

                let leaving = x - r;
                if leaving >= 0 {
                    shift_column(src, ya..=yb, leaving as usize, false, &mut hist, &med, &mut cum);
                    count -= column_len;
                }
                let entering = x + r + 1;
                if entering < wi {
                    shift_column(src, ya..=yb, entering as usize, true, &mut hist, &med, &mut cum);
                    count += column_len;
                }

                let half = (count + 1) / 2;
                for c in 0..CHANNELS {
                    while med[c] > 0 && cum[c] - hist[c][med[c]] >= half {
                        cum[c] -= hist[c][med[c]];
                        med[c] -= 1;
                    }
                    while med[c] < 255 && cum[c] < half {
                        med[c] += 1;
                        cum[c] += hist[c][med[c]];
                    }
                }
            }
        }
    });
    out
}

/// Add or remove one window column from the histograms, keeping `cum`
/// (the count of values at or below each running median) in step.
fn shift_column(
    src: &PixelBuffer,
    rows: std::ops::RangeInclusive<u32>,
    x: usize,
    add: bool,
    hist: &mut [[u32; 256]; CHANNELS],
    med: &[usize; CHANNELS],
    cum: &mut [u32; CHANNELS],
) {
    let xo = x * CHANNELS;
    for yy in rows {
        let srow = src.row(yy);
        for c in 0..CHANNELS {
            let v = srow[xo + c] as usize;
            let below = v <= med[c];
            if add {
                hist[c][v] += 1;
                cum[c] += below as u32;
            } else {
                hist[c][v] -= 1;
                cum[c] -= below as u32;
            }
        }
    }
}

/// Median filter with a small default window; `radius <= 0` means 1.
pub fn despeckle(src: &PixelBuffer, radius: i64) -> PixelBuffer {
    median(src, if radius <= 0 { 1 } else { radius })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
    }

    mod kernel {
        use super::*;

        #[test]
        fn kernel_is_normalized_and_symmetric() {
            let k = gaussian_kernel(1.5);
            assert_eq!(k.len(), 11);
            assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            for i in 0..k.len() / 2 {
                assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-15);
            }
        }

        #[test]
        fn non_positive_sigma_is_single_tap() {
            assert_eq!(gaussian_kernel(0.0), vec![1.0]);
            assert_eq!(gaussian_kernel(-2.0), vec![1.0]);
            assert_eq!(gaussian_kernel(f64::NAN), vec![1.0]);
        }
    }

    mod blur_tests {
        use super::*;

        #[test]
        fn zero_sigma_is_clone() {
            let src = checker(6, 4);
            assert_eq!(blur(&src, 0.0), src);
        }

        #[test]
        fn uniform_image_stays_uniform() {
            let src = PixelBuffer::filled(9, 7, [120, 30, 200, 255]);
            assert_eq!(blur(&src, 2.0), src);
        }

        #[test]
        fn checkerboard_is_smoothed() {
            let out = blur(&checker(8, 8), 1.0);
            let p = out.get(4, 4).unwrap();
            assert!(p[0] > 60 && p[0] < 200, "got {p:?}");
            assert_eq!(p[3], 255);
        }
    }

    mod median_tests {
        use super::*;

        #[test]
        fn removes_single_impulse() {
            let mut src = PixelBuffer::filled(5, 5, [90, 90, 90, 255]);
            src.put(2, 2, [255, 0, 255, 0]);
            let out = median(&src, 1);
            assert_eq!(out.get(2, 2), Some([90, 90, 90, 255]));
        }

        #[test]
        fn non_positive_radius_is_clone() {
            let src = checker(4, 4);
            assert_eq!(median(&src, 0), src);
            assert_eq!(median(&src, -3), src);
        }

        #[test]
        fn matches_brute_force() {
            let src = PixelBuffer::from_fn(9, 6, |x, y| {
                let v = ((x * 37 + y * 91) % 256) as u8;
                [v, v.wrapping_mul(3), 255 - v, (x * 20) as u8]
            });
            let r = 2i64;
            let out = median(&src, r);
            for y in 0..6i64 {
                for x in 0..9i64 {
                    for c in 0..4 {
                        let mut vals = Vec::new();
                        for yy in (y - r).max(0)..=(y + r).min(5) {
                            for xx in (x - r).max(0)..=(x + r).min(8) {
                                vals.push(src.get(xx as u32, yy as u32).unwrap()[c]);
                            }
                        }
                        vals.sort_unstable();
                        let expected = vals[(vals.len() + 1) / 2 - 1];
                        assert_eq!(
                            out.get(x as u32, y as u32).unwrap()[c],
                            expected,
                            "pixel ({x},{y}) channel {c}"
                        );
                    }
                }
            }
        }

        #[test]
        fn despeckle_defaults_radius() {
            let src = checker(5, 5);
            assert_eq!(despeckle(&src, 0), median(&src, 1));
        }
    }

    mod edge_tests {
        use super::*;

        #[test]
        fn flat_image_has_no_edges() {
            let out = edge(&PixelBuffer::filled(5, 5, [80, 80, 80, 10]), 0.0, 1.0, 0.0, false);
            assert!(out.as_raw().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
        }

        #[test]
        fn step_edge_is_strongest_at_boundary() {
            let src = PixelBuffer::from_fn(8, 3, |x, _| if x < 4 { [0, 0, 0, 255] } else { [255; 4] });
            let out = edge(&src, 0.0, 1.0, 0.0, false);
            assert_eq!(out.get(3, 1).unwrap()[0], 255);
            assert_eq!(out.get(0, 1).unwrap()[0], 0);
        }

        #[test]
        fn binary_threshold_is_bilevel() {
            let src = PixelBuffer::from_fn(8, 3, |x, _| [(x * 30) as u8, 0, 0, 255]);
            let out = edge(&src, 0.0, 1.0, 128.0, true);
            assert!(out
                .as_raw()
                .chunks_exact(4)
                .all(|p| p[0] == 0 || p[0] == 255));
        }
    }

    mod unsharp_tests {
        use super::*;

        #[test]
        fn uniform_image_is_unchanged() {
            let src = PixelBuffer::filled(6, 6, [10, 20, 30, 255]);
            assert_eq!(unsharp(&src, 1.0, 2.0, 0.0), src);
        }

        #[test]
        fn increases_local_contrast() {
            let src = PixelBuffer::from_fn(8, 1, |x, _| if x < 4 { [100; 4] } else { [150; 4] });
            let out = unsharp(&src, 1.0, 1.0, 0.0);
            assert!(out.get(3, 0).unwrap()[0] < 100);
            assert!(out.get(4, 0).unwrap()[0] > 150);
        }

        #[test]
        fn threshold_protects_low_contrast() {
            let src = PixelBuffer::from_fn(8, 1, |x, _| if x < 4 { [100; 4] } else { [104; 4] });
            assert_eq!(unsharp(&src, 1.0, 1.0, 10.0), src);
        }
    }
}
