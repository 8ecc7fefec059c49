// src/engine.rs
//
// The processing engine. Every transform reads an immutable PixelBuffer and
// returns a freshly allocated one; the dispatcher ties them to command names.
//
// This file is a facade over the modules in engine/.

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod adaptive;
pub mod buffer;
pub mod color;
pub mod composite;
pub mod convolution;
pub mod dispatch;
pub mod floodfill;
pub mod geometry;
pub mod histogram;
pub mod io;
pub mod limits;
pub mod noise;
pub mod pool;
pub mod resample;
pub mod sepia;
pub mod text;
pub mod tone;

// Re-export commonly used types and functions
pub use buffer::{Pixel, PixelBuffer, CHANNELS};
pub use dispatch::{apply, apply_command, apply_command_with, parse};
pub use floodfill::RegionMask;
pub use histogram::Histogram;
pub use io::Source;
pub use limits::{EngineLimits, LimitsPolicy, MAX_DIMENSION, MAX_PIXELS};
