// src/engine/limits.rs
//
// Output-size limits and their enforcement helpers.

use crate::error::{RasterError, Result};

/// Maximum allowed image dimension (width or height) under the default policy.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels under the default policy (~10K x 10K).
pub const MAX_PIXELS: u64 = 100_000_000;

const STRICT_MAX_DIMENSION: u32 = 8192;
const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_DIMENSION: u32 = 65535;
const LENIENT_MAX_PIXELS: u64 = 400_000_000;

/// Below this many rows a pass runs single-threaded.
pub const DEFAULT_PARALLEL_MIN_ROWS: usize = 1;

pub const ENV_MAX_DIMENSION: &str = "RASTER_CMD_MAX_DIMENSION";
pub const ENV_MAX_PIXELS: &str = "RASTER_CMD_MAX_PIXELS";
pub const ENV_THREADS: &str = "RASTER_CMD_THREADS";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitsPolicy {
    Default,
    Strict,
    Lenient,
    Unbounded,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineLimits {
    pub policy: LimitsPolicy,
    pub max_dimension: u32,
    pub max_pixels: u64,
    /// Passes over fewer rows than this run on the calling thread. Sepia
    /// never fans out below its own floor of 64 rows.
    pub parallel_min_rows: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            policy: LimitsPolicy::Default,
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
            parallel_min_rows: DEFAULT_PARALLEL_MIN_ROWS,
        }
    }
}

impl EngineLimits {
    pub fn strict() -> Self {
        Self {
            policy: LimitsPolicy::Strict,
            max_dimension: STRICT_MAX_DIMENSION,
            max_pixels: STRICT_MAX_PIXELS,
            ..Self::default()
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: LimitsPolicy::Lenient,
            max_dimension: LENIENT_MAX_DIMENSION,
            max_pixels: LENIENT_MAX_PIXELS,
            ..Self::default()
        }
    }

    /// No size checks at all. Allocation failures become the caller's problem.
    pub fn unbounded() -> Self {
        Self {
            policy: LimitsPolicy::Unbounded,
            max_dimension: u32::MAX,
            max_pixels: u64::MAX,
            ..Self::default()
        }
    }

    pub fn custom(max_dimension: u32, max_pixels: u64) -> Self {
        Self {
            policy: LimitsPolicy::Custom,
            max_dimension,
            max_pixels,
            ..Self::default()
        }
    }

    pub fn with_parallel_min_rows(mut self, rows: usize) -> Self {
        self.parallel_min_rows = rows;
        self
    }

    pub fn apply_policy(policy: LimitsPolicy) -> Self {
        match policy {
            LimitsPolicy::Default => Self::default(),
            LimitsPolicy::Strict => Self::strict(),
            LimitsPolicy::Lenient => Self::lenient(),
            LimitsPolicy::Unbounded => Self::unbounded(),
            LimitsPolicy::Custom => Self::custom(MAX_DIMENSION, MAX_PIXELS),
        }
    }

    /// Defaults overridden by RASTER_CMD_MAX_DIMENSION / RASTER_CMD_MAX_PIXELS.
    ///
    /// Unparsable or zero values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut limits = Self::default();
        if let Some(v) = parse_positive::<u32>(ENV_MAX_DIMENSION, lookup(ENV_MAX_DIMENSION)) {
            limits.max_dimension = v;
            limits.policy = LimitsPolicy::Custom;
        }
        if let Some(v) = parse_positive::<u64>(ENV_MAX_PIXELS, lookup(ENV_MAX_PIXELS)) {
            limits.max_pixels = v;
            limits.policy = LimitsPolicy::Custom;
        }
        limits
    }

    /// Reject an output of `width x height` that exceeds these limits.
    pub fn enforce_dimensions(&self, width: u64, height: u64) -> Result<()> {
        if self.policy == LimitsPolicy::Unbounded {
            return Ok(());
        }
        let max_dim = self.max_dimension as u64;
        if width > max_dim || height > max_dim {
            return Err(RasterError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width.saturating_mul(height);
        if pixels > self.max_pixels {
            return Err(RasterError::pixel_count_exceeds_limit(pixels, self.max_pixels));
        }
        Ok(())
    }
}

/// Worker thread override from RASTER_CMD_THREADS.
pub fn configured_threads() -> Option<usize> {
    parse_positive::<usize>(ENV_THREADS, std::env::var(ENV_THREADS).ok())
}

fn parse_positive<T>(key: &str, raw: Option<String>) -> Option<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => Some(v),
        _ => {
            tracing::warn!(
                target: "raster_cmd::limits",
                key,
                value = %raw,
                "ignoring invalid limit override"
            );
            None
        }
    }
}
