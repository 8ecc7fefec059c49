// lib.rs
//
// raster-cmd: an in-memory RGBA image processing engine driven by textual
// commands.
//
// A command name plus string arguments is parsed into a typed Operation and
// applied to a PixelBuffer:
//
//     let out = raster_cmd::apply_command(&buffer, "blur", &["1.5"])?;
//
// Design goals:
// - Every command validated before any pixel is touched
// - Inputs never mutated; outputs freshly allocated
// - Numerically safe at image borders, no panics on hostile arguments
// - Data-parallel where it pays off, on one shared worker pool
//
// Logging goes through `tracing`; installing a subscriber is the caller's job.

pub mod commands;
pub mod engine;
pub mod error;
pub mod ops;

pub use commands::{ArgSpec, ArgType, CommandSpec, COMMANDS};
pub use engine::{apply_command, apply_command_with, EngineLimits, Pixel, PixelBuffer};
pub use error::{ErrorCategory, RasterError, Result};
pub use ops::{BlendMode, NoiseKind, Operation, Orientation, SepiaOptions};
