// tests/integration_tests.rs
//
// Integration tests for the public dispatcher API.
// Every command goes through apply_command exactly as a shell would call it:
// a name plus string arguments.

use image::{ImageFormat, Rgba, RgbaImage};
use raster_cmd::{apply_command, apply_command_with, EngineLimits, PixelBuffer, RasterError, COMMANDS};
use raster_cmd::ops::OperationEffect;
use std::io::Cursor;

// Helper to create a deterministic RGBA test image
fn create_test_image(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        [
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ]
    })
}

fn run(buf: &PixelBuffer, name: &str, args: &[&str]) -> PixelBuffer {
    apply_command(buf, name, args)
        .unwrap_or_else(|e| panic!("{name} {args:?} failed: {e}"))
        .unwrap_or_else(|| panic!("{name} produced no buffer"))
}

fn write_png(path: &std::path::Path, img: &RgbaImage) {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    std::fs::write(path, bytes.into_inner()).unwrap();
}

mod every_command {
    use super::*;

    // Smallest valid invocation per command.
    fn sample_args(name: &str) -> Vec<&'static str> {
        match name {
            "resize" => vec!["12", "9"],
            "rotate" => vec!["30"],
            "blur" => vec!["1.2"],
            "medianFilter" => vec!["1"],
            "level" => vec!["10", "1.2", "240"],
            "gamma" => vec!["2.2"],
            "threshold" => vec!["128"],
            "modulate" => vec!["110", "80", "30"],
            "vignette" => vec!["0", "0", "8", "8"],
            "crop" => vec!["5", "5", "2", "2"],
            "posterize" => vec!["4"],
            "autoOrient" => vec!["5"],
            "trim" => vec!["5%"],
            "floodfillPaint" => vec!["#00ff00", "10", "", "0", "0"],
            "annotate" => vec!["OK", "10", "1", "12", "white"],
            _ => vec![],
        }
    }

    #[test]
    fn all_registered_commands_run() {
        let src = create_test_image(16, 16);
        for spec in COMMANDS.iter().filter(|c| c.name != "composite") {
            let args = sample_args(spec.name);
            let result = apply_command(&src, spec.name, args.as_slice());
            let out = result.unwrap_or_else(|e| panic!("{}: {e}", spec.name));
            match spec.name {
                "identify" => assert!(out.is_none()),
                _ => assert!(out.is_some(), "{}", spec.name),
            }
        }
    }

    #[test]
    fn contract_flags_match_outputs() {
        let src = PixelBuffer::from_fn(16, 12, |x, y| [(x * 15) as u8, (y * 20) as u8, 70, (40 + x * 9 + y) as u8]);
        for spec in COMMANDS.iter().filter(|c| c.name != "composite") {
            let args = sample_args(spec.name);
            let effects = raster_cmd::engine::parse(spec.name, args.as_slice()).unwrap().contract().effects;
            let Some(out) = apply_command(&src, spec.name, args.as_slice()).unwrap() else {
                assert!(effects.contains(OperationEffect::METADATA_ONLY), "{}", spec.name);
                continue;
            };
            if !effects.contains(OperationEffect::CHANGES_DIMENSIONS) {
                assert_eq!(out.dimensions(), src.dimensions(), "{}", spec.name);
            }
            if effects.contains(OperationEffect::PRESERVES_ALPHA) && out.dimensions() == src.dimensions() {
                let alpha = |b: &PixelBuffer| b.as_raw().chunks_exact(4).map(|p| p[3]).collect::<Vec<_>>();
                assert_eq!(alpha(&out), alpha(&src), "{}", spec.name);
            }
        }
    }

    #[test]
    fn unknown_command_is_error() {
        let err = apply_command(&create_test_image(2, 2), "liquify", &[] as &[&str]).unwrap_err();
        assert!(matches!(err, RasterError::UnsupportedCommand { .. }));
        assert!(err.is_recoverable());
    }
}

mod geometry_tests {
    use super::*;

    #[test]
    fn resize_exact_dimensions() {
        let out = run(&create_test_image(40, 30), "resize", &["17", "11"]);
        assert_eq!(out.dimensions(), (17, 11));
    }

    #[test]
    fn resize_argument_errors() {
        let src = create_test_image(4, 4);
        let err = apply_command(&src, "resize", &["10"]).unwrap_err();
        assert!(matches!(err, RasterError::ArgumentCount { .. }));
        let err = apply_command(&src, "resize", &["wide", "10"]).unwrap_err();
        assert_eq!(err.parameter(), Some("width"));
    }

    #[test]
    fn rotate_right_angle_swaps() {
        let out = run(&create_test_image(10, 4), "rotate", &["90"]);
        assert_eq!(out.dimensions(), (4, 10));
    }

    #[test]
    fn crop_intersects_bounds() {
        let src = create_test_image(10, 10);
        let out = run(&src, "crop", &["8", "8", "6", "-2"]);
        assert_eq!(out.dimensions(), (4, 6));
        assert_eq!(out.get(0, 0), src.get(6, 0));
    }

    #[test]
    fn flip_then_flop_is_rotate_180() {
        let src = create_test_image(7, 5);
        let a = run(&run(&src, "flip", &[]), "flop", &[]);
        let b = run(&src, "autoOrient", &["3"]);
        assert_eq!(a, b);
    }

    #[test]
    fn adaptive_resize_keeps_aspect() {
        let out = run(&create_test_image(40, 20), "adaptiveResize", &["20"]);
        assert_eq!(out.dimensions(), (20, 10));
    }

    #[test]
    fn trim_removes_uniform_border() {
        let src = PixelBuffer::from_fn(10, 8, |x, y| {
            if (3..6).contains(&x) && (2..5).contains(&y) {
                [200, 10, 10, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        let out = run(&src, "trim", &["0"]);
        assert_eq!(out.dimensions(), (3, 3));
    }
}

mod tone_tests {
    use super::*;

    #[test]
    fn gamma_one_is_identity() {
        let src = create_test_image(9, 9);
        assert_eq!(run(&src, "gamma", &["1"]), src);
    }

    #[test]
    fn negate_twice_is_identity() {
        let src = create_test_image(9, 9);
        assert_eq!(run(&run(&src, "negate", &[]), "negate", &[]), src);
    }

    #[test]
    fn grayscale_equal_channels() {
        let out = run(&create_test_image(6, 6), "grayscale", &[]);
        for p in out.as_raw().chunks_exact(4) {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
        }
    }

    #[test]
    fn sepia_zero_is_identity() {
        let src = create_test_image(8, 8);
        assert_eq!(run(&src, "sepia", &["0"]), src);
    }

    #[test]
    fn noise_is_reproducible_per_seed() {
        let src = create_test_image(12, 12);
        let a = run(&src, "addNoise", &["GAUSSIAN", "20", "7"]);
        let b = run(&src, "addNoise", &["GAUSSIAN", "20", "7"]);
        let c = run(&src, "addNoise", &["GAUSSIAN", "20", "8"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        // seed 0 is a fixed default, not time based
        assert_eq!(
            run(&src, "addNoise", &["POISSON", "30", "0"]),
            run(&src, "addNoise", &["POISSON", "30", "0"])
        );
    }

    #[test]
    fn equalize_keeps_alpha() {
        let src = PixelBuffer::from_fn(8, 8, |x, y| [(x * 8) as u8, (y * 8) as u8, 3, (x * 30) as u8]);
        let out = run(&src, "equalize", &[]);
        for (a, b) in src.as_raw().chunks_exact(4).zip(out.as_raw().chunks_exact(4)) {
            assert_eq!(a[3], b[3]);
        }
    }
}

mod composite_tests {
    use super::*;

    #[test]
    fn composite_from_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        write_png(&path, &RgbaImage::from_pixel(3, 3, Rgba([0, 0, 255, 128])));

        let dst = PixelBuffer::filled(10, 10, [255, 0, 0, 255]);
        let out = run(&dst, "composite", &[path.to_str().unwrap(), "over", "4", "4"]);
        assert_eq!(out.dimensions(), (10, 10));
        for y in 0..10 {
            for x in 0..10 {
                let inside = (4..7).contains(&x) && (4..7).contains(&y);
                assert_eq!(out.get(x, y) != dst.get(x, y), inside, "({x},{y})");
            }
        }
    }

    #[test]
    fn composite_clipped_at_edge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.png");
        write_png(&path, &RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));

        let dst = PixelBuffer::filled(5, 5, [255, 255, 255, 255]);
        let out = run(&dst, "composite", &[path.to_str().unwrap(), "multiply", "3", "-2"]);
        assert_eq!(out.get(4, 0), Some([0, 0, 0, 255]));
        assert_eq!(out.get(4, 2), Some([255, 255, 255, 255]));
    }

    #[test]
    fn composite_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"not really a png").unwrap();
        let err = apply_command(&create_test_image(2, 2), "composite", &[path.to_str().unwrap(), "over", "0", "0"])
            .unwrap_err();
        assert!(matches!(err, RasterError::DecodeFailed { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn composite_source_respects_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        write_png(&path, &RgbaImage::new(80, 2));
        let limits = EngineLimits::custom(64, 10_000);
        let err = apply_command_with(&limits, &create_test_image(2, 2), "composite", &[path.to_str().unwrap(), "over", "0", "0"])
            .unwrap_err();
        assert!(matches!(err, RasterError::DimensionExceedsLimit { .. }));
    }
}

mod fill_and_text_tests {
    use super::*;

    #[test]
    fn floodfill_square() {
        let a = [200, 30, 30, 255];
        let b = [20, 20, 220, 255];
        let src = PixelBuffer::from_fn(5, 5, |x, y| {
            if (1..4).contains(&x) && (1..4).contains(&y) {
                a
            } else {
                b
            }
        });
        let out = run(&src, "floodfillPaint", &["#00ff00", "0", "", "2", "2"]);
        let changed = src
            .as_raw()
            .chunks_exact(4)
            .zip(out.as_raw().chunks_exact(4))
            .filter(|(p, q)| p != q)
            .count();
        assert_eq!(changed, 9);
    }

    #[test]
    fn annotate_draws_inside_image() {
        let src = PixelBuffer::filled(40, 20, [0, 0, 0, 255]);
        let out = run(&src, "annotate", &["HI", "", "10", "2", "15", "#ffffff"]);
        assert_ne!(out, src);
        assert_eq!(out.dimensions(), src.dimensions());
    }

    #[test]
    fn histogram_is_chart_sized() {
        let out = run(&create_test_image(30, 30), "histogram", &["64", "10"]);
        assert_eq!(out.dimensions(), (512, 120));
    }
}
