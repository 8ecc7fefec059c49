// src/engine/text.rs
//
// Built-in 3x5 bitmap font used for histogram axis labels and `annotate`.

use super::buffer::{blend_over, Pixel, PixelBuffer};

pub const GLYPH_WIDTH: u32 = 3;
pub const GLYPH_HEIGHT: u32 = 5;
/// Horizontal advance per character at scale 1, including spacing.
pub const GLYPH_ADVANCE: u32 = 4;

/// Rows top to bottom; bit 2 is the leftmost column.
type Glyph = [u8; 5];

const GLYPHS: &[(char, Glyph)] = &[
    ('0', [0x7, 0x5, 0x5, 0x5, 0x7]),
    ('1', [0x2, 0x6, 0x2, 0x2, 0x7]),
    ('2', [0x7, 0x1, 0x7, 0x4, 0x7]),
    ('3', [0x7, 0x1, 0x7, 0x1, 0x7]),
    ('4', [0x5, 0x5, 0x7, 0x1, 0x1]),
    ('5', [0x7, 0x4, 0x7, 0x1, 0x7]),
    ('6', [0x7, 0x4, 0x7, 0x5, 0x7]),
    ('7', [0x7, 0x1, 0x2, 0x4, 0x4]),
    ('8', [0x7, 0x5, 0x7, 0x5, 0x7]),
    ('9', [0x7, 0x5, 0x7, 0x1, 0x7]),
    ('A', [0x2, 0x5, 0x7, 0x5, 0x5]),
    ('B', [0x6, 0x5, 0x6, 0x5, 0x6]),
    ('C', [0x3, 0x4, 0x4, 0x4, 0x3]),
    ('D', [0x6, 0x5, 0x5, 0x5, 0x6]),
    ('E', [0x7, 0x4, 0x6, 0x4, 0x7]),
    ('F', [0x7, 0x4, 0x6, 0x4, 0x4]),
    ('G', [0x3, 0x4, 0x5, 0x5, 0x3]),
    ('H', [0x5, 0x5, 0x7, 0x5, 0x5]),
    ('I', [0x7, 0x2, 0x2, 0x2, 0x7]),
    ('J', [0x1, 0x1, 0x1, 0x5, 0x2]),
    ('K', [0x5, 0x5, 0x6, 0x5, 0x5]),
    ('L', [0x4, 0x4, 0x4, 0x4, 0x7]),
    ('M', [0x5, 0x7, 0x7, 0x5, 0x5]),
    ('N', [0x6, 0x5, 0x5, 0x5, 0x5]),
    ('O', [0x2, 0x5, 0x5, 0x5, 0x2]),
    ('P', [0x6, 0x5, 0x6, 0x4, 0x4]),
    ('Q', [0x2, 0x5, 0x5, 0x6, 0x3]),
    ('R', [0x6, 0x5, 0x6, 0x5, 0x5]),
    ('S', [0x3, 0x4, 0x2, 0x1, 0x6]),
    ('T', [0x7, 0x2, 0x2, 0x2, 0x2]),
    ('U', [0x5, 0x5, 0x5, 0x5, 0x7]),
    ('V', [0x5, 0x5, 0x5, 0x5, 0x2]),
    ('W', [0x5, 0x5, 0x7, 0x7, 0x5]),
    ('X', [0x5, 0x5, 0x2, 0x5, 0x5]),
    ('Y', [0x5, 0x5, 0x2, 0x2, 0x2]),
    ('Z', [0x7, 0x1, 0x2, 0x4, 0x7]),
    (' ', [0x0, 0x0, 0x0, 0x0, 0x0]),
    ('.', [0x0, 0x0, 0x0, 0x6, 0x6]),
    (',', [0x0, 0x0, 0x0, 0x2, 0x4]),
    (':', [0x0, 0x2, 0x0, 0x2, 0x0]),
    (';', [0x0, 0x2, 0x0, 0x2, 0x4]),
    ('!', [0x2, 0x2, 0x2, 0x0, 0x2]),
    ('?', [0x6, 0x1, 0x2, 0x0, 0x2]),
    ('-', [0x0, 0x0, 0x7, 0x0, 0x0]),
    ('+', [0x0, 0x2, 0x7, 0x2, 0x0]),
    ('=', [0x0, 0x7, 0x0, 0x7, 0x0]),
    ('_', [0x0, 0x0, 0x0, 0x0, 0x7]),
    ('/', [0x1, 0x1, 0x2, 0x4, 0x4]),
    ('(', [0x1, 0x2, 0x2, 0x2, 0x1]),
    (')', [0x4, 0x2, 0x2, 0x2, 0x4]),
    ('%', [0x5, 0x1, 0x2, 0x4, 0x5]),
    ('#', [0x5, 0x7, 0x5, 0x7, 0x5]),
    ('*', [0x0, 0x5, 0x2, 0x5, 0x0]),
    ('\'', [0x2, 0x2, 0x0, 0x0, 0x0]),
    ('"', [0x5, 0x5, 0x0, 0x0, 0x0]),
    ('<', [0x1, 0x2, 0x4, 0x2, 0x1]),
    ('>', [0x4, 0x2, 0x1, 0x2, 0x4]),
];

/// Bitmap for `ch`; lowercase letters use the uppercase shapes.
pub fn glyph(ch: char) -> Option<[u8; 5]> {
    let ch = ch.to_ascii_uppercase();
    GLYPHS.iter().find(|(c, _)| *c == ch).map(|(_, g)| *g)
}

/// Half-open pixel rectangle that drawing is confined to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl ClipRect {
    pub fn of(buf: &PixelBuffer) -> Self {
        Self {
            left: 0,
            top: 0,
            right: buf.width() as i64,
            bottom: buf.height() as i64,
        }
    }
}

/// Width in pixels of `text` at `scale`, without trailing spacing.
pub fn text_width(text: &str, scale: u32) -> u64 {
    let n = text.chars().count() as u64;
    if n == 0 {
        return 0;
    }
    ((n - 1) * GLYPH_ADVANCE as u64 + GLYPH_WIDTH as u64) * scale.max(1) as u64
}

/// Draw `text` with its top-left corner at `(x, top)`, each font pixel
/// becoming a `scale x scale` block blended over `dst`.
///
/// Unknown characters advance without drawing. Pixels outside `clip` are
/// skipped.
pub fn draw_text(dst: &mut PixelBuffer, x: i64, top: i64, text: &str, color: Pixel, scale: u32, clip: ClipRect) {
    let scale = scale.max(1) as i64;
    let clip = ClipRect {
        left: clip.left.max(0),
        top: clip.top.max(0),
        right: clip.right.min(dst.width() as i64),
        bottom: clip.bottom.min(dst.height() as i64),
    };
    let stride = dst.stride();
    let mut cx = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (ry, bits) in rows.iter().enumerate() {
                for rx in 0..GLYPH_WIDTH {
                    if bits >> (GLYPH_WIDTH - 1 - rx) & 1 == 0 {
                        continue;
                    }
                    let bx = cx.saturating_add(rx as i64 * scale);
                    let by = top.saturating_add(ry as i64 * scale);
                    let (x0, x1) = (bx.max(clip.left), bx.saturating_add(scale).min(clip.right));
                    let (y0, y1) = (by.max(clip.top), by.saturating_add(scale).min(clip.bottom));
                    for py in y0..y1 {
                        for px in x0..x1 {
                            let o = py as usize * stride + px as usize * 4;
                            blend_over(&mut dst.data_mut()[o..o + 4], color);
                        }
                    }
                }
            }
        }
        cx = cx.saturating_add(GLYPH_ADVANCE as i64 * scale);
    }
}

/// Glyph scale for a requested font size in points.
pub fn scale_for_size(size: f64) -> u32 {
    if !size.is_finite() {
        return 1;
    }
    (size / GLYPH_HEIGHT as f64).round().clamp(1.0, 1024.0) as u32
}

/// Draw `text` with its baseline-left origin at `(x, y)`.
///
/// Outline fonts are not loaded; a non-empty `font_path` is ignored.
pub fn annotate(
    src: &PixelBuffer,
    text: &str,
    font_path: Option<&str>,
    size: f64,
    x: i64,
    y: i64,
    color: Pixel,
) -> PixelBuffer {
    if let Some(path) = font_path.filter(|p| !p.is_empty()) {
        tracing::warn!(target: "raster_cmd::text", path, "outline fonts are not supported, using the built-in bitmap font");
    }
    let scale = scale_for_size(size);
    let mut out = src.clone();
    let clip = ClipRect::of(&out);
    let top = y.saturating_sub(GLYPH_HEIGHT as i64 * scale as i64);
    draw_text(&mut out, x, top, text, color, scale, clip);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Pixel = [255, 255, 255, 255];
    const BLACK: Pixel = [0, 0, 0, 255];

    fn changed(a: &PixelBuffer, b: &PixelBuffer) -> usize {
        a.as_raw()
            .chunks_exact(4)
            .zip(b.as_raw().chunks_exact(4))
            .filter(|(p, q)| p != q)
            .count()
    }

    mod glyphs {
        use super::*;

        #[test]
        fn table_covers_alphanumerics() {
            for ch in ('A'..='Z').chain('a'..='z').chain('0'..='9') {
                assert!(glyph(ch).is_some(), "{ch}");
            }
            assert!(glyph('~').is_none());
        }

        #[test]
        fn glyph_rows_fit_three_bits() {
            for (_, g) in GLYPHS {
                assert!(g.iter().all(|row| *row < 8));
            }
        }

        #[test]
        fn width_accounts_for_spacing() {
            assert_eq!(text_width("", 1), 0);
            assert_eq!(text_width("A", 1), 3);
            assert_eq!(text_width("AB", 2), 14);
        }
    }

    mod drawing {
        use super::*;

        #[test]
        fn draws_digit_one() {
            let mut buf = PixelBuffer::filled(5, 7, WHITE);
            draw_text(&mut buf, 1, 1, "1", BLACK, 1, ClipRect::of(&PixelBuffer::new(5, 7)));
            // '1' lights 1+2+1+1+3 cells.
            assert_eq!(changed(&buf, &PixelBuffer::filled(5, 7, WHITE)), 8);
            assert_eq!(buf.get(2, 1), Some(BLACK));
            assert_eq!(buf.get(1, 1), Some(WHITE));
        }

        #[test]
        fn scale_multiplies_area() {
            let base = PixelBuffer::filled(40, 40, WHITE);
            let mut one = base.clone();
            let mut three = base.clone();
            draw_text(&mut one, 0, 0, "8", BLACK, 1, ClipRect::of(&base));
            draw_text(&mut three, 0, 0, "8", BLACK, 3, ClipRect::of(&base));
            assert_eq!(changed(&three, &base), 9 * changed(&one, &base));
        }

        #[test]
        fn clip_and_bounds_are_respected() {
            let base = PixelBuffer::filled(6, 6, WHITE);
            let mut buf = base.clone();
            draw_text(&mut buf, -2, -2, "WWW", BLACK, 4, ClipRect::of(&base));
            assert!(changed(&buf, &base) > 0);
            let mut clipped = base.clone();
            let clip = ClipRect { left: 0, top: 0, right: 2, bottom: 2 };
            draw_text(&mut clipped, 0, 0, "8", BLACK, 1, clip);
            assert_eq!(changed(&clipped, &base), 3);
        }
    }

    mod annotation {
        use super::*;

        #[test]
        fn baseline_origin() {
            let src = PixelBuffer::filled(60, 30, [200, 200, 200, 255]);
            let out = annotate(&src, "Hi", None, 10.0, 5, 20, BLACK);
            // Scale 2: glyph rows span y in [10, 20).
            for y in 0..src.height() {
                for x in 0..src.width() {
                    if out.get(x, y) != src.get(x, y) {
                        assert!((10..20).contains(&y), "({x},{y})");
                        assert!(x >= 5);
                    }
                }
            }
            assert!(changed(&out, &src) > 0);
        }

        #[test]
        fn font_path_is_ignored() {
            let src = PixelBuffer::filled(40, 20, WHITE);
            let a = annotate(&src, "OK", Some("/no/such/font.ttf"), 12.0, 2, 15, BLACK);
            let b = annotate(&src, "OK", None, 12.0, 2, 15, BLACK);
            assert_eq!(a, b);
        }

        #[test]
        fn translucent_color_blends() {
            let src = PixelBuffer::filled(10, 10, WHITE);
            let out = annotate(&src, "I", None, 5.0, 0, 5, [0, 0, 0, 128]);
            assert_eq!(out.get(0, 0), Some([127, 127, 127, 255]));
        }
    }
}
