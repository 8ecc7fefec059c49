// src/ops.rs
//
// Typed operations.
// The dispatcher parses (name, args) into one of these; applying it is an
// exhaustive match, so every command has exactly one code path.

use crate::engine::buffer::Pixel;
use bitflags::bitflags;
use std::path::PathBuf;

/// One parsed command with strongly typed parameters.
///
/// Operations are plain data: no references, no lifetimes. Cloning one is
/// cheap apart from the few that carry text or a path.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Lanczos (a=3) resize to an exact size
    Resize { width: u32, height: u32 },

    /// Arbitrary-angle rotation into the full bounding box
    Rotate { degrees: f64 },

    /// Separable Gaussian blur
    Blur { sigma: f64 },

    MedianFilter { radius: i64 },

    Despeckle { radius: i64 },

    Level { black: f64, gamma: f64, white: f64 },

    Normalize,

    /// Same stretch as Normalize
    AutoLevel,

    AutoGamma,

    Gamma { gamma: f64 },

    Negate { only_gray: bool },

    Threshold { value: f64, per_channel: bool },

    /// Brightness and saturation in percent, hue in degrees
    Modulate {
        brightness: f64,
        saturation: f64,
        hue: f64,
    },

    Vignette {
        radius: f64,
        sigma: f64,
        x: i64,
        y: i64,
        strength: f64,
    },

    Sepia(SepiaOptions),

    Grayscale,

    Edge {
        sigma: f64,
        scale: f64,
        threshold: f64,
        binary: bool,
    },

    AdaptiveBlur {
        radius: f64,
        sigma_min: f64,
        sigma_max: f64,
        levels: i64,
    },

    /// A zero side follows the source aspect ratio
    AdaptiveResize { width: i64, height: i64, a: f64 },

    AdaptiveSharpen { radius: f64, sigma: f64, amount: f64 },

    AdaptiveThreshold {
        window_width: i64,
        window_height: i64,
        offset: f64,
    },

    /// Unsharp mask
    Sharpen {
        sigma: f64,
        amount: f64,
        threshold: f64,
    },

    AddNoise { kind: NoiseKind, amount: f64, seed: i64 },

    /// Rectangle intersected with the image bounds
    Crop {
        width: u32,
        height: u32,
        x: i64,
        y: i64,
    },

    /// Vertical mirror
    Flip,

    /// Horizontal mirror
    Flop,

    Posterize { levels: i64 },

    AutoOrient { orientation: Orientation },

    /// Render a histogram chart in place of the image
    Histogram { bins: usize, window: usize },

    Equalize,

    /// Crop away the border matching the top-left pixel within `fuzz`
    Trim { fuzz: f64 },

    FloodfillPaint {
        fill: Pixel,
        fuzz: f64,
        border: Option<Pixel>,
        x: i64,
        y: i64,
        invert: bool,
    },

    Annotate {
        text: String,
        font_path: Option<String>,
        size: f64,
        x: i64,
        y: i64,
        color: Pixel,
    },

    Composite {
        source: PathBuf,
        mode: BlendMode,
        x: i64,
        y: i64,
    },

    /// Metadata-only; produces no buffer
    Identify,

    /// Metadata removal is an encoder concern; pixels pass through
    Strip,
}

/// Tonal controls for Lab-space sepia toning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SepiaOptions {
    /// Blend strength in 0..1
    pub percentage: f64,
    /// Lightness (0..100) receiving the strongest toning
    pub midtone_center: f64,
    /// Width of the midtone bell
    pub midtone_sigma: f64,
    /// Lightness where highlight protection starts
    pub highlight_threshold: f64,
    /// Ramp width of highlight protection; 0 is a hard cut
    pub highlight_softness: f64,
    /// Filmic S-curve strength in 0..1
    pub curve: f64,
}

impl Default for SepiaOptions {
    fn default() -> Self {
        Self {
            percentage: 1.0,
            midtone_center: 50.0,
            midtone_sigma: 20.0,
            highlight_threshold: 80.0,
            highlight_softness: 10.0,
            curve: 0.12,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
    Gaussian,
    Uniform,
    Poisson,
}

impl NoiseKind {
    /// Case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "GAUSSIAN" => Some(Self::Gaussian),
            "UNIFORM" => Some(Self::Uniform),
            "POISSON" => Some(Self::Poisson),
            _ => None,
        }
    }
}

/// Per-channel blend applied before straight-alpha "over".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Over,
    Multiply,
    Screen,
    Overlay,
    Add,
    Difference,
    Dissolve,
}

impl BlendMode {
    /// Case-insensitive name lookup; unknown names fall back to `Over`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "MULTIPLY" => Self::Multiply,
            "SCREEN" => Self::Screen,
            "OVERLAY" => Self::Overlay,
            "ADD" | "PLUS" | "SUM" => Self::Add,
            "DIFFERENCE" => Self::Difference,
            "DISSOLVE" => Self::Dissolve,
            _ => Self::Over,
        }
    }
}

/// EXIF orientation tag values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// 1: as stored
    TopLeft,
    /// 2: mirrored horizontally
    TopRight,
    /// 3: rotated 180
    BottomRight,
    /// 4: mirrored vertically
    BottomLeft,
    /// 5: transposed
    LeftTop,
    /// 6: needs 90 CW
    RightTop,
    /// 7: transversed
    RightBottom,
    /// 8: needs 90 CCW
    LeftBottom,
}

impl Orientation {
    /// Map an EXIF code; anything outside 1..=8 is the identity.
    pub fn from_exif(code: i64) -> Self {
        match code {
            2 => Self::TopRight,
            3 => Self::BottomRight,
            4 => Self::BottomLeft,
            5 => Self::LeftTop,
            6 => Self::RightTop,
            7 => Self::RightBottom,
            8 => Self::LeftBottom,
            _ => Self::TopLeft,
        }
    }

    pub fn exif_code(self) -> u8 {
        match self {
            Self::TopLeft => 1,
            Self::TopRight => 2,
            Self::BottomRight => 3,
            Self::BottomLeft => 4,
            Self::LeftTop => 5,
            Self::RightTop => 6,
            Self::RightBottom => 7,
            Self::LeftBottom => 8,
        }
    }

    /// The orientation whose correction undoes this one.
    pub fn inverse(self) -> Self {
        match self {
            Self::RightTop => Self::LeftBottom,
            Self::LeftBottom => Self::RightTop,
            other => other,
        }
    }

    /// Whether correcting this orientation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::LeftTop | Self::RightTop | Self::RightBottom | Self::LeftBottom
        )
    }
}

bitflags! {
    /// Observable effects of an operation on its input.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OperationEffect: u8 {
        /// Output size may differ from input size
        const CHANGES_DIMENSIONS = 1 << 0;
        /// No output buffer is produced
        const METADATA_ONLY = 1 << 1;
        /// Reads a file in addition to the input buffer
        const READS_EXTERNAL = 1 << 2;
        /// Alpha of every output pixel equals the input pixel's alpha
        const PRESERVES_ALPHA = 1 << 3;
        /// Output depends on a random seed
        const STOCHASTIC = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationContract {
    pub name: &'static str,
    pub effects: OperationEffect,
}

impl Operation {
    /// Command name as accepted by the dispatcher.
    pub fn name(&self) -> &'static str {
        self.contract().name
    }

    pub fn contract(&self) -> OperationContract {
        use OperationEffect as E;
        let (name, effects) = match self {
            Self::Resize { .. } => ("resize", E::CHANGES_DIMENSIONS),
            Self::Rotate { .. } => ("rotate", E::CHANGES_DIMENSIONS),
            Self::Blur { .. } => ("blur", E::empty()),
            Self::MedianFilter { .. } => ("medianFilter", E::empty()),
            Self::Despeckle { .. } => ("despeckle", E::empty()),
            Self::Level { .. } => ("level", E::PRESERVES_ALPHA),
            Self::Normalize => ("normalize", E::PRESERVES_ALPHA),
            Self::AutoLevel => ("autoLevel", E::PRESERVES_ALPHA),
            Self::AutoGamma => ("autoGamma", E::PRESERVES_ALPHA),
            Self::Gamma { .. } => ("gamma", E::PRESERVES_ALPHA),
            Self::Negate { .. } => ("negate", E::PRESERVES_ALPHA),
            Self::Threshold { .. } => ("threshold", E::PRESERVES_ALPHA),
            Self::Modulate { .. } => ("modulate", E::PRESERVES_ALPHA),
            Self::Vignette { .. } => ("vignette", E::PRESERVES_ALPHA),
            Self::Sepia(_) => ("sepia", E::PRESERVES_ALPHA),
            Self::Grayscale => ("grayscale", E::PRESERVES_ALPHA),
            Self::Edge { .. } => ("edge", E::empty()),
            Self::AdaptiveBlur { .. } => ("adaptiveBlur", E::empty()),
            Self::AdaptiveResize { .. } => ("adaptiveResize", E::CHANGES_DIMENSIONS),
            Self::AdaptiveSharpen { .. } => ("adaptiveSharpen", E::empty()),
            Self::AdaptiveThreshold { .. } => ("adaptiveThreshold", E::PRESERVES_ALPHA),
            Self::Sharpen { .. } => ("sharpen", E::empty()),
            Self::AddNoise { .. } => ("addNoise", E::PRESERVES_ALPHA | E::STOCHASTIC),
            Self::Crop { .. } => ("crop", E::CHANGES_DIMENSIONS | E::PRESERVES_ALPHA),
            Self::Flip => ("flip", E::empty()),
            Self::Flop => ("flop", E::empty()),
            Self::Posterize { .. } => ("posterize", E::PRESERVES_ALPHA),
            Self::AutoOrient { .. } => ("autoOrient", E::CHANGES_DIMENSIONS),
            Self::Histogram { .. } => ("histogram", E::CHANGES_DIMENSIONS),
            Self::Equalize => ("equalize", E::PRESERVES_ALPHA),
            Self::Trim { .. } => ("trim", E::CHANGES_DIMENSIONS),
            Self::FloodfillPaint { .. } => ("floodfillPaint", E::empty()),
            Self::Annotate { .. } => ("annotate", E::empty()),
            Self::Composite { .. } => ("composite", E::READS_EXTERNAL),
            Self::Identify => ("identify", E::METADATA_ONLY),
            Self::Strip => ("strip", E::PRESERVES_ALPHA),
        };
        OperationContract { name, effects }
    }
}
