// src/engine/histogram.rs
//
// Per-channel histograms, CDF equalization and the overlaid chart renderer.

use super::buffer::{round_u8, PixelBuffer, CHANNELS};
use super::text::{draw_text, ClipRect};

pub const CHART_WIDTH: u32 = 512;
pub const CHART_HEIGHT: u32 = 120;
/// Default moving-average window used to find the chart scale.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 20;
/// Most bins the dispatcher accepts.
pub const MAX_BINS: usize = 65_536;

const PANEL_OUTER: [u8; 3] = [20, 20, 20];
const PANEL_INNER: [u8; 3] = [28, 28, 28];
const GRID: [u8; 3] = [60, 60, 60];
const LABEL: [u8; 4] = [200, 200, 200, 255];
const GRID_LINES: u32 = 4;
const PERCENTILE: f64 = 0.99;
const HEADROOM: f64 = 0.05;

/// Bin counts for R, G and B; bin 0 is the darkest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    pub red: Vec<u64>,
    pub green: Vec<u64>,
    pub blue: Vec<u64>,
}

impl Histogram {
    /// Count every pixel into `bins` buckets per channel via
    /// `floor(v * bins / 256)`. Zero bins means 256.
    pub fn compute(src: &PixelBuffer, bins: usize) -> Self {
        let bins = if bins == 0 { 256 } else { bins };
        let mut hist = Self {
            red: vec![0; bins],
            green: vec![0; bins],
            blue: vec![0; bins],
        };
        let index = |v: u8| ((v as usize * bins) / 256).min(bins - 1);
        for px in src.as_raw().chunks_exact(CHANNELS) {
            hist.red[index(px[0])] += 1;
            hist.green[index(px[1])] += 1;
            hist.blue[index(px[2])] += 1;
        }
        hist
    }

    pub fn bins(&self) -> usize {
        self.red.len()
    }

    pub fn channels(&self) -> [&[u64]; 3] {
        [&self.red, &self.green, &self.blue]
    }

    /// Rec.601 weighted luminosity per bin.
    pub fn luminosity(&self) -> Vec<f64> {
        (0..self.bins())
            .map(|i| 0.299 * self.red[i] as f64 + 0.587 * self.green[i] as f64 + 0.114 * self.blue[i] as f64)
            .collect()
    }
}

/// 256-entry remap table `round(cdf / total * 255)`.
pub fn equalization_map(counts: &[u64], total: u64) -> [u8; 256] {
    let mut map = [0u8; 256];
    let mut cdf = 0u64;
    for (v, slot) in map.iter_mut().enumerate() {
        cdf += counts.get(v).copied().unwrap_or(0);
        *slot = round_u8(cdf as f64 / total as f64 * 255.0);
    }
    map
}

/// Spread each channel's values along its cumulative distribution.
pub fn equalize(src: &PixelBuffer) -> PixelBuffer {
    let total = src.width() as u64 * src.height() as u64;
    if total == 0 {
        return src.clone();
    }
    let hist = Histogram::compute(src, 256);
    let maps = hist.channels().map(|counts| equalization_map(counts, total));
    src.map_pixels(move |p| [maps[0][p[0] as usize], maps[1][p[1] as usize], maps[2][p[2] as usize], p[3]])
}

/// Linear resample of `values` onto `width` points spanning first to last.
fn resample(values: &[f64], width: usize) -> Vec<f64> {
    if values.is_empty() || width == 0 {
        return vec![0.0; width];
    }
    if width == 1 {
        return vec![values.iter().sum::<f64>() / values.len() as f64];
    }
    let last = (values.len() - 1) as f64;
    (0..width)
        .map(|i| {
            let pos = i as f64 * last / (width - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (pos.ceil() as usize).min(values.len() - 1);
            let t = pos - lo as f64;
            values[lo] * (1.0 - t) + values[hi] * t
        })
        .collect()
}

/// Centered moving average, window clipped at the ends.
fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    let half = (window / 2) as isize;
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let lo = (i - half).max(0) as usize;
            let hi = (i + half).min(n - 1) as usize;
            let span = &values[lo..=hi];
            span.iter().sum::<f64>() / span.len() as f64
        })
        .collect()
}

/// Vertical scale for the chart: the larger of the smoothed maximum and
/// the 99th percentile of all samples, plus headroom.
pub fn chart_scale(curves: &[&[f64]], window: usize) -> f64 {
    let raw_max = curves
        .iter()
        .flat_map(|c| c.iter().copied())
        .fold(0.0, f64::max);
    let raw_max = if raw_max > 0.0 { raw_max } else { 1.0 };

    let mut all: Vec<f64> = curves.iter().flat_map(|c| c.iter().copied()).collect();
    all.sort_by(f64::total_cmp);
    let percentile = match all.len() {
        0 => raw_max,
        n => {
            let v = all[(PERCENTILE * (n - 1) as f64).floor() as usize];
            if v > 0.0 {
                v
            } else {
                raw_max
            }
        }
    };

    let smoothed = curves
        .iter()
        .flat_map(|c| smooth(c, window))
        .fold(0.0, f64::max);
    let smoothed = if smoothed > 0.0 { smoothed } else { raw_max };

    smoothed.max(percentile) * (1.0 + HEADROOM)
}

struct Plot {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl Plot {
    fn row_for(&self, value: f64, scale: f64) -> u32 {
        let v = (value / scale).clamp(0.0, 1.0);
        let span = (self.height - 1) as f64;
        self.top + self.height - 1 - (v * span).round() as u32
    }
}

fn blend_rgb(px: &mut [u8], color: [u8; 3], alpha: f64) {
    for c in 0..3 {
        px[c] = round_u8(alpha * color[c] as f64 + (1.0 - alpha) * px[c] as f64);
    }
}

fn fill_rect(out: &mut PixelBuffer, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
    let stride = out.stride();
    let data = out.data_mut();
    for y in y0..y1 {
        for x in x0..x1 {
            let o = y as usize * stride + x as usize * CHANNELS;
            data[o..o + 3].copy_from_slice(&color);
            data[o + 3] = 255;
        }
    }
}

fn fill_area(out: &mut PixelBuffer, plot: &Plot, values: &[f64], scale: f64, color: [u8; 3], alpha: f64) {
    let stride = out.stride();
    let data = out.data_mut();
    for (i, &v) in values.iter().enumerate() {
        let x = plot.left as usize + i;
        for y in plot.row_for(v, scale)..plot.top + plot.height {
            let o = y as usize * stride + x * CHANNELS;
            blend_rgb(&mut data[o..o + 3], color, alpha);
        }
    }
}

fn stroke(out: &mut PixelBuffer, plot: &Plot, values: &[f64], scale: f64, color: [u8; 3], alpha: f64) {
    let stride = out.stride();
    let data = out.data_mut();
    for (i, &v) in values.iter().enumerate() {
        let y = plot.row_for(v, scale);
        let o = y as usize * stride + (plot.left as usize + i) * CHANNELS;
        blend_rgb(&mut data[o..o + 3], color, alpha);
    }
}

/// Draw the chart for `hist` into a fresh `width x height` image.
pub fn render(hist: &Histogram, width: u32, height: u32, window: usize) -> PixelBuffer {
    let mut out = PixelBuffer::filled(width, height, [PANEL_OUTER[0], PANEL_OUTER[1], PANEL_OUTER[2], 255]);
    let pad = ((height as f64 * 0.06).round() as u32).max(6);
    let (mut left, mut right) = (pad + 8, width.saturating_sub(pad + 8));
    let (top, bottom) = (pad, height.saturating_sub(pad));
    if left >= right {
        left = pad;
        right = width.saturating_sub(pad);
    }
    if left >= right || top >= bottom {
        return out;
    }
    fill_rect(&mut out, left, top, right, bottom, PANEL_INNER);

    let plot = Plot {
        left,
        top,
        width: right - left,
        height: bottom - top,
    };
    let as_f64 = |c: &[u64]| c.iter().map(|&v| v as f64).collect::<Vec<_>>();
    let w = plot.width as usize;
    let red = resample(&as_f64(&hist.red), w);
    let green = resample(&as_f64(&hist.green), w);
    let blue = resample(&as_f64(&hist.blue), w);
    let lum = resample(&hist.luminosity(), w);
    let scale = chart_scale(&[&red, &green, &blue, &lum], window);

    let clip = ClipRect {
        left: left as i64,
        top: top as i64,
        right: right as i64,
        bottom: bottom as i64,
    };
    for gi in 0..=GRID_LINES {
        let y = top + (plot.height as f64 * gi as f64 / GRID_LINES as f64).round() as u32;
        if y >= bottom {
            continue;
        }
        fill_rect(&mut out, left, y, right, y + 1, GRID);
        let label = format!("{:.0}", (1.0 - gi as f64 / GRID_LINES as f64) * scale);
        let mut label_y = y.saturating_sub(3).max(top) as i64;
        if label_y + 5 >= bottom as i64 {
            label_y = bottom as i64 - 6;
        }
        draw_text(&mut out, left as i64 + 4, label_y, &label, LABEL, 1, clip);
    }

    fill_area(&mut out, &plot, &lum, scale, [100, 110, 120], 0.45);
    fill_area(&mut out, &plot, &blue, scale, [65, 120, 210], 0.20);
    fill_area(&mut out, &plot, &green, scale, [70, 200, 120], 0.18);
    fill_area(&mut out, &plot, &red, scale, [220, 90, 90], 0.16);

    stroke(&mut out, &plot, &blue, scale, [80, 140, 230], 0.9);
    stroke(&mut out, &plot, &green, scale, [120, 230, 140], 0.9);
    stroke(&mut out, &plot, &red, scale, [250, 120, 120], 0.9);
    stroke(&mut out, &plot, &lum, scale, [180, 180, 180], 0.35);
    out
}

/// Histogram chart of `src` at the standard 512x120 size.
pub fn render_histogram(src: &PixelBuffer, bins: usize, window: usize) -> PixelBuffer {
    render(&Histogram::compute(src, bins), CHART_WIDTH, CHART_HEIGHT, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::from_fn(w, h, |x, y| [(x * 255 / (w - 1)) as u8, (y * 10) as u8, 128, 255])
    }

    mod counting {
        use super::*;

        #[test]
        fn counts_sum_to_pixel_count() {
            let src = ramp(37, 11);
            for bins in [1, 7, 64, 256, 1000] {
                let h = Histogram::compute(&src, bins);
                for ch in h.channels() {
                    assert_eq!(ch.len(), bins);
                    assert_eq!(ch.iter().sum::<u64>(), 37 * 11);
                }
            }
        }

        #[test]
        fn bin_index_is_floor_scaled() {
            let src = PixelBuffer::from_fn(3, 1, |x, _| [[0, 127, 255][x as usize], 0, 0, 255]);
            let h = Histogram::compute(&src, 2);
            assert_eq!(h.red, vec![2, 1]);
            assert_eq!(Histogram::compute(&src, 0).bins(), 256);
        }
    }

    mod equalization {
        use super::*;

        #[test]
        fn map_is_monotonic_and_ends_at_white() {
            let src = ramp(20, 20);
            let h = Histogram::compute(&src, 256);
            for ch in h.channels() {
                let map = equalization_map(ch, 400);
                assert!(map.windows(2).all(|w| w[0] <= w[1]));
                assert_eq!(map[255], 255);
            }
        }

        #[test]
        fn alpha_is_untouched() {
            let src = PixelBuffer::from_fn(4, 4, |x, y| [(x * 60) as u8, (y * 60) as u8, 9, (x + y) as u8]);
            let out = equalize(&src);
            for (o, s) in out.as_raw().chunks_exact(4).zip(src.as_raw().chunks_exact(4)) {
                assert_eq!(o[3], s[3]);
            }
        }

        #[test]
        fn empty_image_is_cloned() {
            let src = PixelBuffer::new(0, 5);
            assert_eq!(equalize(&src), src);
        }
    }

    mod chart {
        use super::*;

        #[test]
        fn resample_hits_endpoints() {
            let v = resample(&[0.0, 10.0, 20.0], 5);
            assert_eq!(v, vec![0.0, 5.0, 10.0, 15.0, 20.0]);
            assert_eq!(resample(&[2.0, 4.0], 1), vec![3.0]);
        }

        #[test]
        fn smoothing_averages_clipped_window() {
            let v = smooth(&[0.0, 0.0, 9.0, 0.0, 0.0], 3);
            assert_eq!(v, vec![0.0, 3.0, 3.0, 3.0, 0.0]);
        }

        #[test]
        fn single_spike_does_not_set_scale() {
            let mut curve = vec![10.0; 400];
            curve[200] = 10_000.0;
            let scale = chart_scale(&[&curve], 20);
            assert!(scale < 1000.0, "scale {scale}");
            assert!(scale >= 10.0);
        }

        #[test]
        fn renders_fixed_size_panel() {
            let out = render_histogram(&ramp(16, 16), 256, DEFAULT_SMOOTHING_WINDOW);
            assert_eq!(out.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
            assert_eq!(out.get(0, 0), Some([20, 20, 20, 255]));
            assert!(out.as_raw().chunks_exact(4).all(|p| p[3] == 255));
        }

        #[test]
        fn tiny_canvas_is_only_panel() {
            let out = render(&Histogram::compute(&ramp(4, 4), 16), 10, 10, 20);
            assert!(out.as_raw().chunks_exact(4).all(|p| p == [20, 20, 20, 255]));
        }
    }
}
