//! Regression tests for hostile command arguments.
//! Each test should be cheap and run in the normal test suite. None of these
//! inputs may panic; errors are fine.

use raster_cmd::{apply_command, apply_command_with, EngineLimits, PixelBuffer, COMMANDS};

const HOSTILE: &[&str] = &[
    "",
    " ",
    "-",
    "%",
    "-%",
    "1e309",
    "-1e309",
    "NaN",
    "inf",
    "-inf",
    "9223372036854775807",
    "-9223372036854775808",
    "99999999999999999999999",
    "4294967296",
    "0x10",
    "#",
    "#12",
    "#ggg",
    "#ffffffffff",
    "rgb(1,2,3)",
    "\u{0}",
    "💥",
    "1.5.5",
    "--1",
    "1%%",
];

fn sample() -> PixelBuffer {
    PixelBuffer::from_fn(7, 5, |x, y| [(x * 36) as u8, (y * 50) as u8, 90, 200])
}

#[test]
fn hostile_single_values_in_every_position() {
    let src = sample();
    let limits = EngineLimits::strict();
    for spec in COMMANDS.iter().filter(|c| c.name != "composite") {
        for count in spec.min_args..=spec.max_args() {
            for pos in 0..count {
                for bad in HOSTILE {
                    let mut args = vec!["1"; count];
                    args[pos] = bad;
                    let _ = apply_command_with(&limits, &src, spec.name, args.as_slice());
                }
            }
        }
    }
}

#[test]
fn wrong_arity_never_panics() {
    let src = sample();
    for spec in COMMANDS {
        for count in 0..=spec.max_args() + 2 {
            let args = vec!["2"; count];
            let result = apply_command(&src, spec.name, args.as_slice());
            if !spec.accepts(count) {
                assert!(result.is_err(), "{} accepted {count} args", spec.name);
            }
        }
    }
}

#[test]
fn extreme_but_valid_numbers() {
    let src = sample();
    let limits = EngineLimits::strict();
    let cases: &[(&str, &[&str])] = &[
        ("rotate", &["1e300"]),
        ("rotate", &["-7777777.5"]),
        ("blur", &["-5"]),
        ("medianFilter", &["9223372036854775807"]),
        ("despeckle", &["-9223372036854775808"]),
        ("level", &["-1e300", "1e-300", "1e300"]),
        ("modulate", &["1e300", "-1e300", "1e300"]),
        ("vignette", &["1e300", "1e-300", "9223372036854775807", "-9223372036854775808", "1e300%"]),
        ("edge", &["0", "-1e300", "1e300", "true"]),
        ("adaptiveBlur", &["1e9", "-3", "1e3", "9223372036854775807"]),
        ("adaptiveResize", &["-5", "0", "-1"]),
        ("adaptiveThreshold", &["-9223372036854775808", "9223372036854775807", "1e300"]),
        ("sharpen", &["1e-300", "1e300", "-4"]),
        ("addNoise", &["UNIFORM", "1e300", "-9223372036854775808"]),
        ("addNoise", &["POISSON", "1e300", "1"]),
        ("crop", &["4294967295", "4294967295", "-9223372036854775808", "9223372036854775807"]),
        ("posterize", &["9223372036854775807"]),
        ("autoOrient", &["-9223372036854775808"]),
        ("histogram", &["9999999", "9999999"]),
        ("trim", &["-1e300%"]),
        ("floodfillPaint", &["#0000", "-1e300", "#fff", "9223372036854775807", "-9223372036854775808", "1"]),
        ("annotate", &["~~~ unicode ✓ ~~~", "1e300", "-9223372036854775808", "9223372036854775807", "red"]),
        ("annotate", &["A", "", "-1e300", "0", "0", "red"]),
        ("sepia", &["1e300%", "-1e300", "1e-300", "1e300", "-1", "1e300"]),
    ];
    for (name, args) in cases {
        let _ = apply_command_with(&limits, &src, name, args);
    }
}

#[test]
fn adaptive_blur_huge_radius_is_bounded() {
    // A radius far beyond the image must not allocate per-radius state.
    let src = sample();
    let out = apply_command(&src, "adaptiveBlur", &["1e12", "0.5", "2", "3"]).unwrap();
    assert_eq!(out.map(|b| b.dimensions()), Some((7, 5)));
}
