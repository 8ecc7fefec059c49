// src/engine/dispatch.rs
//
// Command dispatcher: (name, string args) -> typed Operation -> new buffer.
//
// Parsing and application are separate stages. `parse` validates arity and
// every argument against the registry; `apply` is an exhaustive match over
// the parsed operation and never sees raw text.

use super::adaptive;
use super::buffer::{Pixel, PixelBuffer, CHANNELS};
use super::color::parse_color;
use super::composite;
use super::convolution;
use super::floodfill;
use super::geometry;
use super::histogram;
use super::io;
use super::limits::EngineLimits;
use super::noise;
use super::pool;
use super::resample;
use super::sepia;
use super::text;
use super::tone;
use crate::commands::{self, CommandSpec};
use crate::error::{RasterError, Result};
use crate::ops::{BlendMode, NoiseKind, Operation, OperationEffect, Orientation, SepiaOptions};
use std::path::PathBuf;
use std::time::Instant;

/// Positional arguments of one command, with parse helpers that name the
/// offending parameter on failure.
struct ArgReader<'a> {
    spec: &'static CommandSpec,
    args: &'a [&'a str],
}

impl<'a> ArgReader<'a> {
    fn new(spec: &'static CommandSpec, args: &'a [&'a str]) -> Result<Self> {
        if !spec.accepts(args.len()) {
            return Err(RasterError::argument_count(
                spec.name,
                spec.arity(),
                args.len(),
                spec.usage,
            ));
        }
        Ok(Self { spec, args })
    }

    fn name(&self, index: usize) -> &'static str {
        self.spec.arg(index).map_or("argument", |a| a.name)
    }

    fn invalid(&self, index: usize, value: &str, reason: &'static str) -> RasterError {
        RasterError::invalid_argument(self.name(index), value.to_string(), reason)
    }

    /// Raw text at `index`, `None` when absent or blank.
    fn raw(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).copied().filter(|s| !s.trim().is_empty())
    }

    fn required(&self, index: usize) -> Result<&'a str> {
        self.raw(index)
            .ok_or_else(|| self.invalid(index, "", "a value is required"))
    }

    fn parse_i64(&self, index: usize, s: &str) -> Result<i64> {
        s.trim()
            .parse::<i64>()
            .map_err(|_| self.invalid(index, s, "expected an integer"))
    }

    fn parse_f64(&self, index: usize, s: &str) -> Result<f64> {
        match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(self.invalid(index, s, "expected a finite number")),
            Err(_) => Err(self.invalid(index, s, "expected a number")),
        }
    }

    fn parse_bool(&self, index: usize, s: &str) -> Result<bool> {
        match s.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(self.invalid(index, s, "expected a boolean (true/false/1/0)")),
        }
    }

    /// Returns the number and whether it carried a `%` suffix.
    fn parse_percent(&self, index: usize, s: &str) -> Result<(f64, bool)> {
        match s.trim().strip_suffix('%') {
            Some(num) => Ok((self.parse_f64(index, num)?, true)),
            None => Ok((self.parse_f64(index, s)?, false)),
        }
    }

    fn parse_color(&self, index: usize, s: &str) -> Result<Pixel> {
        parse_color(s).ok_or_else(|| self.invalid(index, s, "expected a CSS color name or #hex"))
    }

    fn int(&self, index: usize) -> Result<i64> {
        self.parse_i64(index, self.required(index)?)
    }

    fn float(&self, index: usize) -> Result<f64> {
        self.parse_f64(index, self.required(index)?)
    }

    fn int_or(&self, index: usize, default: i64) -> Result<i64> {
        self.raw(index).map_or(Ok(default), |s| self.parse_i64(index, s))
    }

    fn float_or(&self, index: usize, default: f64) -> Result<f64> {
        self.raw(index).map_or(Ok(default), |s| self.parse_f64(index, s))
    }

    fn bool_or(&self, index: usize, default: bool) -> Result<bool> {
        self.raw(index).map_or(Ok(default), |s| self.parse_bool(index, s))
    }

    fn color(&self, index: usize) -> Result<Pixel> {
        self.parse_color(index, self.required(index)?)
    }

    /// A non-negative size that fits in `u32`.
    fn size(&self, index: usize) -> Result<u32> {
        let s = self.required(index)?;
        let v = self.parse_i64(index, s)?;
        if v < 0 {
            return Err(self.invalid(index, s, "must not be negative"));
        }
        u32::try_from(v).map_err(|_| self.invalid(index, s, "too large"))
    }
}

fn sepia_options(r: &ArgReader<'_>) -> Result<SepiaOptions> {
    let d = SepiaOptions::default();
    let percentage = match r.raw(0) {
        None => d.percentage,
        Some(s) => match r.parse_percent(0, s)? {
            (v, true) => v / 100.0,
            (v, false) if v > 1.0 => v / 100.0,
            (v, false) => v,
        },
    };
    let midtone_sigma = r.float_or(2, d.midtone_sigma)?;
    Ok(SepiaOptions {
        percentage: percentage.clamp(0.0, 1.0),
        midtone_center: r.float_or(1, d.midtone_center)?.clamp(0.0, 100.0),
        midtone_sigma: if midtone_sigma <= 0.0 { 1.0 } else { midtone_sigma },
        highlight_threshold: r.float_or(3, d.highlight_threshold)?.clamp(0.0, 100.0),
        highlight_softness: r.float_or(4, d.highlight_softness)?.max(0.0),
        curve: r.float_or(5, d.curve)?.clamp(0.0, 1.0),
    })
}

fn parse_annotate(r: &ArgReader<'_>, args: &[&str]) -> Result<Operation> {
    // Registry indices assume the six-argument form; the five-argument form
    // has no font path and everything after the text shifts left by one.
    let (font_path, shift) = if args.len() == 6 {
        (Some(args[1].to_string()).filter(|p| !p.trim().is_empty()), 0)
    } else {
        (None, 1)
    };
    let field = |registry: usize| args.get(registry - shift).copied().unwrap_or("");
    Ok(Operation::Annotate {
        text: args[0].to_string(),
        font_path,
        size: r.parse_f64(2, field(2))?,
        x: r.parse_i64(3, field(3))?,
        y: r.parse_i64(4, field(4))?,
        color: r.parse_color(5, field(5))?,
    })
}

/// Parse a command name and its textual arguments into an operation.
///
/// Fails with `UnsupportedCommand`, `ArgumentCount` or `InvalidArgument`;
/// no pixels are touched.
pub fn parse<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Operation> {
    let spec = commands::find(name).ok_or_else(|| RasterError::unsupported_command(name.to_string()))?;
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    let r = ArgReader::new(spec, &args)?;

    let op = match spec.name {
        "resize" => Operation::Resize {
            width: r.size(0)?,
            height: r.size(1)?,
        },
        "rotate" => Operation::Rotate { degrees: r.float(0)? },
        "blur" => Operation::Blur { sigma: r.float(0)? },
        "medianFilter" => Operation::MedianFilter { radius: r.int(0)? },
        "despeckle" => Operation::Despeckle { radius: r.int_or(0, 1)? },
        "level" => Operation::Level {
            black: r.float(0)?,
            gamma: r.float(1)?,
            white: r.float(2)?,
        },
        "normalize" => Operation::Normalize,
        "autoLevel" => Operation::AutoLevel,
        "autoGamma" => Operation::AutoGamma,
        "gamma" => Operation::Gamma { gamma: r.float(0)? },
        "negate" => Operation::Negate {
            only_gray: r.bool_or(0, false)?,
        },
        "threshold" => Operation::Threshold {
            value: r.float(0)?,
            per_channel: r.bool_or(1, false)?,
        },
        "modulate" => Operation::Modulate {
            brightness: r.float(0)?,
            saturation: r.float(1)?,
            hue: r.float(2)?,
        },
        "vignette" => {
            let strength = match r.raw(4) {
                None => 1.0,
                Some(s) => match r.parse_percent(4, s)? {
                    (v, true) => v / 100.0,
                    (v, false) => v,
                },
            };
            Operation::Vignette {
                radius: r.float(0)?,
                sigma: r.float(1)?,
                x: r.int(2)?,
                y: r.int(3)?,
                strength: strength.clamp(0.0, 1.0),
            }
        }
        "sepia" => Operation::Sepia(sepia_options(&r)?),
        "grayscale" => Operation::Grayscale,
        "edge" => Operation::Edge {
            sigma: r.float_or(0, 0.0)?,
            scale: r.float_or(1, 1.0)?,
            threshold: r.float_or(2, 0.0)?,
            binary: r.bool_or(3, false)?,
        },
        "adaptiveBlur" => Operation::AdaptiveBlur {
            radius: r.float_or(0, 1.0)?,
            sigma_min: r.float_or(1, 0.5)?,
            sigma_max: r.float_or(2, 1.0)?,
            levels: r.int_or(3, 6)?,
        },
        "adaptiveResize" => Operation::AdaptiveResize {
            width: r.int_or(0, 0)?,
            height: r.int_or(1, 0)?,
            a: r.float_or(2, resample::DEFAULT_LANCZOS_A)?,
        },
        "adaptiveSharpen" => Operation::AdaptiveSharpen {
            radius: r.float_or(0, 0.0)?,
            sigma: r.float_or(1, 1.0)?,
            amount: r.float_or(2, 1.0)?,
        },
        "adaptiveThreshold" => Operation::AdaptiveThreshold {
            window_width: r.int_or(0, 15)?,
            window_height: r.int_or(1, 15)?,
            offset: r.float_or(2, 0.0)?,
        },
        "sharpen" => Operation::Sharpen {
            sigma: r.float_or(0, 1.0)?,
            amount: r.float_or(1, 1.0)?,
            threshold: r.float_or(2, 0.0)?,
        },
        "addNoise" => {
            let kind = match r.raw(0) {
                None => NoiseKind::Gaussian,
                Some(s) => NoiseKind::from_name(s)
                    .ok_or_else(|| r.invalid(0, s, "expected GAUSSIAN, UNIFORM or POISSON"))?,
            };
            Operation::AddNoise {
                kind,
                amount: r.float_or(1, 10.0)?,
                seed: r.int_or(2, 0)?,
            }
        }
        "crop" => Operation::Crop {
            width: r.size(0)?,
            height: r.size(1)?,
            x: r.int(2)?,
            y: r.int(3)?,
        },
        "flip" => Operation::Flip,
        "flop" => Operation::Flop,
        "posterize" => Operation::Posterize { levels: r.int(0)? },
        "autoOrient" => Operation::AutoOrient {
            orientation: Orientation::from_exif(r.int(0)?),
        },
        "histogram" => {
            let positive = |index: usize, default: i64| -> Result<usize> {
                let v = r.int_or(index, default)?;
                if v <= 0 {
                    return Err(r.invalid(index, &v.to_string(), "must be positive"));
                }
                usize::try_from(v).map_err(|_| r.invalid(index, &v.to_string(), "too large"))
            };
            let bins = positive(0, 256)?;
            if bins > histogram::MAX_BINS {
                return Err(r.invalid(0, &bins.to_string(), "too many bins"));
            }
            Operation::Histogram {
                bins,
                window: positive(1, histogram::DEFAULT_SMOOTHING_WINDOW as i64)?,
            }
        }
        "equalize" => Operation::Equalize,
        "trim" => {
            let (v, percent) = r.parse_percent(0, r.required(0)?)?;
            Operation::Trim {
                fuzz: if percent { v * 255.0 / 100.0 } else { v },
            }
        }
        "floodfillPaint" => {
            // Percent fuzz maps straight onto 0..100 Delta-E.
            let (fuzz, _) = r.parse_percent(1, r.required(1)?)?;
            let border = match r.raw(2) {
                None => None,
                Some(s) => Some(r.parse_color(2, s)?).filter(|c| *c != [0, 0, 0, 0]),
            };
            Operation::FloodfillPaint {
                fill: r.color(0)?,
                fuzz: fuzz.clamp(0.0, floodfill::MAX_FUZZ),
                border,
                x: r.int(3)?,
                y: r.int(4)?,
                invert: r.bool_or(5, false)?,
            }
        }
        "annotate" => parse_annotate(&r, &args)?,
        "composite" => Operation::Composite {
            source: PathBuf::from(r.required(0)?),
            mode: BlendMode::from_name(r.raw(1).unwrap_or("over")),
            x: r.int(2)?,
            y: r.int(3)?,
        },
        "identify" => Operation::Identify,
        "strip" => Operation::Strip,
        other => return Err(RasterError::internal(format!("registered command without a parser: {other}"))),
    };
    Ok(op)
}

/// Run a parsed operation. `None` means the operation produces no buffer.
///
/// Operations that allocate a new size check it against `limits` first.
/// Row-parallel passes stay single-threaded below `limits.parallel_min_rows`.
/// The result is checked against the operation's contract: only
/// dimension-changing operations may return a different size, and one that
/// grows the image is checked against `limits` again.
pub fn apply(op: &Operation, src: &PixelBuffer, limits: &EngineLimits) -> Result<Option<PixelBuffer>> {
    let effects = op.contract().effects;
    if effects.contains(OperationEffect::METADATA_ONLY) {
        return Ok(None);
    }
    let Some(out) = pool::with_min_rows(limits.parallel_min_rows, || run(op, src, limits))? else {
        return Ok(None);
    };

    if effects.contains(OperationEffect::CHANGES_DIMENSIONS) {
        if out.width() > src.width() || out.height() > src.height() {
            limits.enforce_dimensions(out.width() as u64, out.height() as u64)?;
        }
    } else if out.dimensions() != src.dimensions() {
        return Err(RasterError::internal(format!(
            "{} changed dimensions from {:?} to {:?}",
            op.name(),
            src.dimensions(),
            out.dimensions()
        )));
    }
    if effects.contains(OperationEffect::PRESERVES_ALPHA) && out.dimensions() == src.dimensions() {
        debug_assert!(
            same_alpha(src, &out),
            "{} altered alpha although its contract preserves it",
            op.name()
        );
    }
    Ok(Some(out))
}

fn same_alpha(a: &PixelBuffer, b: &PixelBuffer) -> bool {
    a.as_raw()
        .chunks_exact(CHANNELS)
        .zip(b.as_raw().chunks_exact(CHANNELS))
        .all(|(p, q)| p[3] == q[3])
}

fn run(op: &Operation, src: &PixelBuffer, limits: &EngineLimits) -> Result<Option<PixelBuffer>> {
    let out = match op {
        Operation::Resize { width, height } => {
            limits.enforce_dimensions(*width as u64, *height as u64)?;
            resample::resize_lanczos(src, *width, *height, resample::DEFAULT_LANCZOS_A)
        }
        Operation::Rotate { degrees } => {
            let (w, h) = resample::rotated_dimensions(src.width(), src.height(), *degrees);
            limits.enforce_dimensions(w, h)?;
            resample::rotate(src, *degrees)
        }
        Operation::Blur { sigma } => convolution::blur(src, *sigma),
        Operation::MedianFilter { radius } => convolution::median(src, *radius),
        Operation::Despeckle { radius } => convolution::despeckle(src, *radius),
        Operation::Level { black, gamma, white } => tone::level(src, *black, *gamma, *white),
        Operation::Normalize => tone::normalize(src),
        Operation::AutoLevel => tone::auto_level(src),
        Operation::AutoGamma => tone::auto_gamma(src),
        Operation::Gamma { gamma } => tone::gamma(src, *gamma),
        Operation::Negate { only_gray } => tone::negate(src, *only_gray),
        Operation::Threshold { value, per_channel } => tone::threshold(src, *value, *per_channel),
        Operation::Modulate {
            brightness,
            saturation,
            hue,
        } => tone::modulate(src, *brightness, *saturation, *hue),
        Operation::Vignette {
            radius,
            sigma,
            x,
            y,
            strength,
        } => tone::vignette(src, *radius, *sigma, *x, *y, *strength),
        Operation::Sepia(opts) => sepia::sepia(src, opts),
        Operation::Grayscale => tone::grayscale(src),
        Operation::Edge {
            sigma,
            scale,
            threshold,
            binary,
        } => convolution::edge(src, *sigma, *scale, *threshold, *binary),
        Operation::AdaptiveBlur {
            radius,
            sigma_min,
            sigma_max,
            levels,
        } => adaptive::adaptive_blur(src, *radius, *sigma_min, *sigma_max, *levels),
        Operation::AdaptiveResize { width, height, a } => {
            if let Some((w, h)) = resample::adaptive_dimensions(src.width(), src.height(), *width, *height) {
                limits.enforce_dimensions(w as u64, h as u64)?;
            }
            resample::adaptive_resize(src, *width, *height, *a)
        }
        Operation::AdaptiveSharpen { radius, sigma, amount } => {
            adaptive::adaptive_sharpen(src, *radius, *sigma, *amount)
        }
        Operation::AdaptiveThreshold {
            window_width,
            window_height,
            offset,
        } => adaptive::adaptive_threshold(src, *window_width, *window_height, *offset),
        Operation::Sharpen {
            sigma,
            amount,
            threshold,
        } => convolution::unsharp(src, *sigma, *amount, *threshold),
        Operation::AddNoise { kind, amount, seed } => noise::add_noise(src, *kind, *amount, *seed),
        Operation::Crop { width, height, x, y } => geometry::crop(src, *width, *height, *x, *y),
        Operation::Flip => geometry::flip(src),
        Operation::Flop => geometry::flop(src),
        Operation::Posterize { levels } => tone::posterize(src, *levels),
        Operation::AutoOrient { orientation } => geometry::auto_orient(src, *orientation),
        Operation::Histogram { bins, window } => {
            limits.enforce_dimensions(histogram::CHART_WIDTH as u64, histogram::CHART_HEIGHT as u64)?;
            histogram::render_histogram(src, *bins, *window)
        }
        Operation::Equalize => histogram::equalize(src),
        Operation::Trim { fuzz } => geometry::trim(src, *fuzz),
        Operation::FloodfillPaint {
            fill,
            fuzz,
            border,
            x,
            y,
            invert,
        } => floodfill::floodfill_paint(src, *fill, *fuzz, *border, *x, *y, *invert),
        Operation::Annotate {
            text,
            font_path,
            size,
            x,
            y,
            color,
        } => text::annotate(src, text, font_path.as_deref(), *size, *x, *y, *color),
        Operation::Composite { source, mode, x, y } => {
            let overlay = io::load_image(source, limits)?;
            composite::composite(src, &overlay, *mode, *x, *y)
        }
        Operation::Identify => return Ok(None),
        Operation::Strip => src.clone(),
    };
    Ok(Some(out))
}

/// Parse and apply one command with the default limits.
///
/// The input buffer is never modified. On error no buffer is produced.
pub fn apply_command<S: AsRef<str>>(buffer: &PixelBuffer, name: &str, args: &[S]) -> Result<Option<PixelBuffer>> {
    apply_command_with(&EngineLimits::default(), buffer, name, args)
}

/// Parse and apply one command under explicit limits.
pub fn apply_command_with<S: AsRef<str>>(
    limits: &EngineLimits,
    buffer: &PixelBuffer,
    name: &str,
    args: &[S],
) -> Result<Option<PixelBuffer>> {
    let started = Instant::now();
    let op = parse(name, args)?;

    #[cfg(feature = "trace-timing")]
    tracing::trace!(
        target: "raster_cmd::dispatch",
        command = op.name(),
        parse_us = started.elapsed().as_micros() as u64,
        "parsed"
    );

    let result = apply(&op, buffer, limits);
    let contract = op.contract();
    tracing::debug!(
        target: "raster_cmd::dispatch",
        command = contract.name,
        stochastic = contract.effects.contains(OperationEffect::STOCHASTIC),
        reads_external = contract.effects.contains(OperationEffect::READS_EXTERNAL),
        width = buffer.width(),
        height = buffer.height(),
        elapsed_us = started.elapsed().as_micros() as u64,
        ok = result.is_ok(),
        "command applied"
    );
    result
}
