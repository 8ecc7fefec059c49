// src/engine/buffer.rs
//
// Owned, bounds-checked RGBA8 pixel storage.
//
// Every buffer upholds `data.len() == 4 * width * height`. Constructors are
// the only way to build one, and all coordinate access goes through either a
// checked getter or a clamping sampler, so operations never compute a raw
// offset into storage they have not validated.

use super::pool;
use crate::error::{RasterError, Result};
use image::{DynamicImage, RgbaImage};

/// Non-premultiplied RGBA, 8 bits per channel.
pub type Pixel = [u8; 4];

pub const CHANNELS: usize = 4;

/// Clamp a float into `[0, 255]` and truncate toward zero.
#[inline]
pub(crate) fn clamp_u8(v: f64) -> u8 {
    if v.is_nan() || v <= 0.0 {
        0
    } else if v >= 255.0 {
        255
    } else {
        v as u8
    }
}

/// Clamp a float into `[0, 255]` and round to nearest.
#[inline]
pub(crate) fn round_u8(v: f64) -> u8 {
    clamp_u8(v.round())
}

/// Rec.709 luminance of an 8-bit pixel, in `[0, 1]`.
#[inline]
pub(crate) fn luma709(px: Pixel) -> f64 {
    (0.2126 * px[0] as f64 + 0.7152 * px[1] as f64 + 0.0722 * px[2] as f64) / 255.0
}

/// Straight-alpha "over" of `fill` onto the pixel stored in `px`.
#[inline]
pub(crate) fn blend_over(px: &mut [u8], fill: Pixel) {
    let fa = fill[3] as f64 / 255.0;
    let sa = px[3] as f64 / 255.0;
    let out_a = fa + sa * (1.0 - fa);
    for c in 0..3 {
        px[c] = if out_a > 0.0 {
            round_u8((fill[c] as f64 * fa + px[c] as f64 * sa * (1.0 - fa)) / out_a)
        } else {
            0
        };
    }
    px[3] = round_u8(out_a * 255.0);
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Fully transparent black buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * CHANNELS],
        }
    }

    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&pixel);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap existing interleaved RGBA bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(RasterError::invalid_buffer(width, height, data.len()));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Pixel) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// Checked pixel read.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Checked pixel write. Returns false when `(x, y)` is outside the buffer.
    #[inline]
    pub fn put(&mut self, x: u32, y: u32, pixel: Pixel) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = self.offset(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&pixel);
        true
    }

    /// Point sample with coordinates clamped into the buffer.
    ///
    /// An empty buffer samples as transparent black.
    #[inline]
    pub fn sample_clamped(&self, x: i64, y: i64) -> Pixel {
        if self.is_empty() {
            return [0; 4];
        }
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        let i = self.offset(cx, cy);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Bilinear sample at floating coordinates, including alpha.
    ///
    /// The four neighbours are fetched through `sample_clamped`, so any
    /// coordinate is valid and areas outside the buffer are edge-extended.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> [f64; 4] {
        let fx = x.floor();
        let fy = y.floor();
        let x0 = fx as i64;
        let y0 = fy as i64;
        let c00 = self.sample_clamped(x0, y0);
        let c10 = self.sample_clamped(x0 + 1, y0);
        let c01 = self.sample_clamped(x0, y0 + 1);
        let c11 = self.sample_clamped(x0 + 1, y0 + 1);
        let tx = x - fx;
        let ty = y - fy;
        let mut out = [0.0; 4];
        for c in 0..CHANNELS {
            let top = c00[c] as f64 * (1.0 - tx) + c10[c] as f64 * tx;
            let bottom = c01[c] as f64 * (1.0 - tx) + c11[c] as f64 * tx;
            out[c] = top * (1.0 - ty) + bottom * ty;
        }
        out
    }

    /// Raw bytes of row `y`, or an empty slice when out of range.
    pub fn row(&self, y: u32) -> &[u8] {
        if y >= self.height {
            return &[];
        }
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Apply `f` to every pixel, producing a new buffer of the same size.
    ///
    /// Rows are split into bands on the shared worker pool.
    pub fn map_pixels<F>(&self, f: F) -> Self
    where
        F: Fn(Pixel) -> Pixel + Sync + Send,
    {
        let mut out = self.clone();
        let stride = self.stride();
        pool::for_each_row_band(out.data_mut(), stride, 1, |_, band| {
            for px in band.chunks_exact_mut(CHANNELS) {
                let mapped = f([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&mapped);
            }
        });
        out
    }

    /// Copy the rectangle `[x, x+w) x [y, y+h)` into a new buffer.
    ///
    /// Callers must pass a rectangle inside the buffer; anything outside is
    /// clipped away first.
    pub(crate) fn sub_image(&self, x: u32, y: u32, w: u32, h: u32) -> Self {
        let x0 = x.min(self.width);
        let y0 = y.min(self.height);
        let w = w.min(self.width - x0);
        let h = h.min(self.height - y0);
        let mut data = Vec::with_capacity(w as usize * h as usize * CHANNELS);
        for row in y0..y0 + h {
            let start = self.offset(x0, row);
            data.extend_from_slice(&self.data[start..start + w as usize * CHANNELS]);
        }
        Self {
            width: w,
            height: h,
            data,
        }
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

impl From<&DynamicImage> for PixelBuffer {
    fn from(img: &DynamicImage) -> Self {
        Self::from(img.to_rgba8())
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buf: PixelBuffer) -> Self {
        let (width, height) = buf.dimensions();
        // Length invariant is upheld by every constructor.
        RgbaImage::from_raw(width, height, buf.data).unwrap_or_else(|| RgbaImage::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::from_fn(w, h, |x, y| [(x * 10) as u8, (y * 10) as u8, 7, 255])
    }

    mod construction {
        use super::*;

        #[test]
        fn from_raw_rejects_wrong_length() {
            let err = PixelBuffer::from_raw(2, 2, vec![0; 15]).unwrap_err();
            assert!(matches!(err, RasterError::InvalidBuffer { expected: 16, .. }));
        }

        #[test]
        fn from_raw_accepts_exact_length() {
            let buf = PixelBuffer::from_raw(2, 3, vec![1; 24]).unwrap();
            assert_eq!(buf.dimensions(), (2, 3));
            assert_eq!(buf.as_raw().len(), 24);
        }

        #[test]
        fn filled_repeats_pixel() {
            let buf = PixelBuffer::filled(3, 2, [1, 2, 3, 4]);
            assert!(buf.as_raw().chunks_exact(4).all(|p| p == [1, 2, 3, 4]));
        }

        #[test]
        fn zero_sized_is_empty() {
            assert!(PixelBuffer::new(0, 5).is_empty());
            assert!(PixelBuffer::new(5, 0).as_raw().is_empty());
        }
    }

    mod sampling {
        use super::*;

        #[test]
        fn clamped_sampling_never_escapes() {
            let buf = gradient(4, 3);
            assert_eq!(buf.sample_clamped(-5, -5), buf.get(0, 0).unwrap());
            assert_eq!(buf.sample_clamped(100, 1), buf.get(3, 1).unwrap());
            assert_eq!(buf.sample_clamped(2, 99), buf.get(2, 2).unwrap());
        }

        #[test]
        fn clamped_sampling_on_empty_buffer() {
            assert_eq!(PixelBuffer::new(0, 0).sample_clamped(0, 0), [0; 4]);
        }

        #[test]
        fn bilinear_midpoint_averages() {
            let buf = PixelBuffer::from_fn(2, 1, |x, _| if x == 0 { [0; 4] } else { [200; 4] });
            let s = buf.sample_bilinear(0.5, 0.0);
            for c in s {
                assert!((c - 100.0).abs() < 1e-9);
            }
        }

        #[test]
        fn bilinear_at_integer_coordinate_is_exact() {
            let buf = gradient(5, 5);
            let s = buf.sample_bilinear(2.0, 3.0);
            let p = buf.get(2, 3).unwrap();
            for c in 0..4 {
                assert_eq!(s[c], p[c] as f64);
            }
        }
    }

    mod access {
        use super::*;

        #[test]
        fn checked_get_and_put() {
            let mut buf = PixelBuffer::new(2, 2);
            assert!(buf.put(1, 1, [9, 8, 7, 6]));
            assert!(!buf.put(2, 0, [1; 4]));
            assert_eq!(buf.get(1, 1), Some([9, 8, 7, 6]));
            assert_eq!(buf.get(0, 2), None);
        }

        #[test]
        fn sub_image_copies_rows() {
            let buf = gradient(4, 4);
            let sub = buf.sub_image(1, 2, 2, 2);
            assert_eq!(sub.dimensions(), (2, 2));
            assert_eq!(sub.get(0, 0), buf.get(1, 2));
            assert_eq!(sub.get(1, 1), buf.get(2, 3));
        }

        #[test]
        fn map_pixels_visits_every_pixel() {
            let buf = gradient(7, 9);
            let out = buf.map_pixels(|p| [255 - p[0], p[1], p[2], p[3]]);
            for y in 0..9 {
                for x in 0..7 {
                    let a = buf.get(x, y).unwrap();
                    let b = out.get(x, y).unwrap();
                    assert_eq!(b[0], 255 - a[0]);
                    assert_eq!(b[1..], a[1..]);
                }
            }
        }

        #[test]
        fn rgba_image_round_trip() {
            let buf = gradient(3, 2);
            let img: RgbaImage = buf.clone().into();
            assert_eq!(PixelBuffer::from(img), buf);
        }
    }

    #[test]
    fn clamp_helpers() {
        assert_eq!(clamp_u8(-3.0), 0);
        assert_eq!(clamp_u8(254.9), 254);
        assert_eq!(clamp_u8(900.0), 255);
        assert_eq!(clamp_u8(f64::NAN), 0);
        assert_eq!(round_u8(254.5), 255);
    }
}
