// src/engine/io.rs
//
// Composite source loading: Source enum, file reading and decoding to RGBA.

use super::buffer::PixelBuffer;
use super::limits::EngineLimits;
use crate::error::{RasterError, Result};
use image::ImageReader;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where encoded image bytes come from.
#[derive(Clone, Debug)]
pub enum Source {
    /// Already in memory
    Memory(Arc<Vec<u8>>),
    /// Read from disk when loaded
    Path(PathBuf),
}

impl Source {
    /// Load the encoded bytes.
    pub fn load(&self) -> Result<Arc<Vec<u8>>> {
        match self {
            Source::Memory(data) => Ok(data.clone()),
            Source::Path(path) => std::fs::read(path)
                .map(Arc::new)
                .map_err(|e| read_error(path, e)),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) => None,
        }
    }
}

fn read_error(path: &Path, err: std::io::Error) -> RasterError {
    let display = path.to_string_lossy().into_owned();
    if err.kind() == ErrorKind::NotFound {
        RasterError::file_not_found(display)
    } else {
        RasterError::file_read_failed(display, err)
    }
}

/// Decode PNG, JPEG or WebP bytes to RGBA8, rejecting images whose header
/// dimensions exceed `limits` before any pixel data is decoded.
pub fn decode(bytes: &[u8], limits: &EngineLimits) -> Result<PixelBuffer> {
    let reader = || {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RasterError::decode_failed(format!("unrecognized image data: {e}")))
    };
    let (w, h) = reader()?
        .into_dimensions()
        .map_err(|e| RasterError::decode_failed(e.to_string()))?;
    limits.enforce_dimensions(w as u64, h as u64)?;
    let img = reader()?
        .decode()
        .map_err(|e| RasterError::decode_failed(e.to_string()))?;
    Ok(PixelBuffer::from(&img))
}

/// Load and decode a source.
pub fn load_source(source: &Source, limits: &EngineLimits) -> Result<PixelBuffer> {
    let bytes = source.load()?;
    let buffer = decode(&bytes, limits)?;
    tracing::debug!(
        target: "raster_cmd::io",
        path = ?source.as_path(),
        width = buffer.width(),
        height = buffer.height(),
        "decoded composite source"
    );
    Ok(buffer)
}

/// Load the image at `path` for compositing.
pub fn load_image(path: impl AsRef<Path>, limits: &EngineLimits) -> Result<PixelBuffer> {
    load_source(&Source::Path(path.as_ref().to_path_buf()), limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use image::{ImageFormat, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(w, h, |x, y| image::Rgba([x as u8, y as u8, 7, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    mod decoding {
        use super::*;

        #[test]
        fn decodes_png_from_memory() {
            let src = Source::Memory(Arc::new(png_bytes(3, 2)));
            let buf = load_source(&src, &EngineLimits::default()).unwrap();
            assert_eq!(buf.dimensions(), (3, 2));
            assert_eq!(buf.get(2, 1), Some([2, 1, 7, 200]));
        }

        #[test]
        fn garbage_is_decode_error() {
            let err = decode(b"definitely not an image", &EngineLimits::default()).unwrap_err();
            assert!(matches!(err, RasterError::DecodeFailed { .. }));
            assert_eq!(err.category(), ErrorCategory::CodecError);
        }

        #[test]
        fn header_dimensions_are_limited() {
            let err = decode(&png_bytes(40, 4), &EngineLimits::custom(16, 1_000)).unwrap_err();
            assert!(matches!(err, RasterError::DimensionExceedsLimit { .. }));
        }
    }

    mod files {
        use super::*;

        #[test]
        fn missing_file_is_not_found() {
            let err = load_image("/definitely/not/here.png", &EngineLimits::default()).unwrap_err();
            assert!(matches!(err, RasterError::FileNotFound { .. }));
        }

        #[test]
        fn reads_from_disk() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("src.png");
            std::fs::write(&path, png_bytes(5, 5)).unwrap();
            let buf = load_image(&path, &EngineLimits::default()).unwrap();
            assert_eq!(buf.dimensions(), (5, 5));
        }

        #[test]
        fn directory_is_read_failure() {
            let dir = tempfile::tempdir().unwrap();
            let err = load_image(dir.path(), &EngineLimits::default()).unwrap_err();
            assert!(matches!(err, RasterError::FileReadFailed { .. }));
        }
    }
}
