// src/commands.rs
//
// Command registry: names, ordered argument descriptors and help text.
// Shells read this for prompting and completion. Parsing itself lives in
// engine::dispatch, which validates independently.

use std::fmt;

/// Textual type of an argument, for help and pre-validation UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Float,
    Bool,
    /// Free text
    Text,
    Path,
    /// A number, or a number followed by `%`
    FloatOrPercent,
    /// CSS name or `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`
    Color,
    /// One of a fixed set of names
    Enum,
    /// A path, or an empty string for none
    PathOrEmpty,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Text => "string",
            Self::Path => "path",
            Self::FloatOrPercent => "float_or_percent",
            Self::Color => "color",
            Self::Enum => "enum",
            Self::PathOrEmpty => "path_or_empty",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
    /// Textual default, empty when there is none
    pub default: &'static str,
    pub description: &'static str,
}

/// One command accepted by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub args: &'static [ArgSpec],
    /// Fewest positional arguments accepted. Can exceed the number of
    /// required arguments when an optional one sits in the middle.
    pub min_args: usize,
    pub usage: &'static str,
    pub description: &'static str,
}

impl CommandSpec {
    /// Most positional arguments accepted.
    pub fn max_args(&self) -> usize {
        self.args.len()
    }

    pub fn accepts(&self, count: usize) -> bool {
        (self.min_args..=self.max_args()).contains(&count)
    }

    /// Human form of the accepted arity, e.g. `2`, `0 to 4`.
    pub fn arity(&self) -> String {
        if self.min_args == self.max_args() {
            self.min_args.to_string()
        } else {
            format!("{} to {}", self.min_args, self.max_args())
        }
    }

    pub fn arg(&self, index: usize) -> Option<&'static ArgSpec> {
        self.args.get(index)
    }
}

const fn req(name: &'static str, ty: ArgType, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        ty,
        required: true,
        default: "",
        description,
    }
}

const fn opt(name: &'static str, ty: ArgType, default: &'static str, description: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        ty,
        required: false,
        default,
        description,
    }
}

use ArgType::*;

/// Every command the dispatcher implements, in help order.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "resize",
        args: &[req("width", Int, "output width"), req("height", Int, "output height")],
        min_args: 2,
        usage: "resize <width> <height>",
        description: "Resize image using Lanczos resampling (a=3).",
    },
    CommandSpec {
        name: "rotate",
        args: &[req("degrees", Float, "rotation degrees")],
        min_args: 1,
        usage: "rotate <degrees>",
        description: "Rotate image using inverse mapping with bilinear sampling.",
    },
    CommandSpec {
        name: "blur",
        args: &[req("sigma", Float, "gaussian sigma")],
        min_args: 1,
        usage: "blur <sigma>",
        description: "Separable Gaussian blur.",
    },
    CommandSpec {
        name: "medianFilter",
        args: &[req("radius", Int, "median radius")],
        min_args: 1,
        usage: "medianFilter <radius>",
        description: "Median filter (sliding-window histogram).",
    },
    CommandSpec {
        name: "despeckle",
        args: &[opt("radius", Int, "1", "optional radius")],
        min_args: 0,
        usage: "despeckle [radius]",
        description: "Despeckle (median filter).",
    },
    CommandSpec {
        name: "level",
        args: &[
            req("blackPoint", Float, "black point"),
            req("gamma", Float, "gamma"),
            req("whitePoint", Float, "white point"),
        ],
        min_args: 3,
        usage: "level <blackPoint> <gamma> <whitePoint>",
        description: "Adjust levels (black/gamma/white).",
    },
    CommandSpec {
        name: "normalize",
        args: &[],
        min_args: 0,
        usage: "normalize",
        description: "Stretch per-channel extremes to full [0,255].",
    },
    CommandSpec {
        name: "autoLevel",
        args: &[],
        min_args: 0,
        usage: "autoLevel",
        description: "Automatic level normalization.",
    },
    CommandSpec {
        name: "autoGamma",
        args: &[],
        min_args: 0,
        usage: "autoGamma",
        description: "Automatic gamma correction.",
    },
    CommandSpec {
        name: "gamma",
        args: &[req("gamma", Float, "gamma value")],
        min_args: 1,
        usage: "gamma <gamma>",
        description: "Apply gamma correction.",
    },
    CommandSpec {
        name: "negate",
        args: &[opt("onlyGray", Bool, "false", "invert luminance only")],
        min_args: 0,
        usage: "negate [onlyGray]",
        description: "Invert colors (optional only-gray).",
    },
    CommandSpec {
        name: "threshold",
        args: &[
            req("value", Float, "threshold value"),
            opt("perChannel", Bool, "false", "apply per-channel"),
        ],
        min_args: 1,
        usage: "threshold <value> [perChannel]",
        description: "Threshold image by value (luminance or per-channel).",
    },
    CommandSpec {
        name: "modulate",
        args: &[
            req("brightness", Float, "brightness percent (e.g. 100)"),
            req("saturation", Float, "saturation percent"),
            req("hue", Float, "hue degrees"),
        ],
        min_args: 3,
        usage: "modulate <brightness> <saturation> <hue>",
        description: "Adjust brightness, saturation and hue.",
    },
    CommandSpec {
        name: "vignette",
        args: &[
            req("radius", Float, "radius (0 = half diagonal)"),
            req("sigma", Float, "sigma (0 = radius/3)"),
            req("x", Int, "center x"),
            req("y", Int, "center y"),
            opt("strength", FloatOrPercent, "1.0", "0..1 or percent like 50%"),
        ],
        min_args: 4,
        usage: "vignette <radius> <sigma> <x> <y> [strength]",
        description: "Apply vignette effect centered at (x,y).",
    },
    CommandSpec {
        name: "sepia",
        args: &[
            opt("percentage", FloatOrPercent, "100%", "sepia intensity (0..100% or 0..1)"),
            opt("midtoneCenter", Float, "50", "midtone center L (0..100)"),
            opt("midtoneSigma", Float, "20", "midtone width (sigma)"),
            opt("highlightThreshold", Float, "80", "L at which protection starts"),
            opt("highlightSoftness", Float, "10", "softness for highlight protection"),
            opt("curve", Float, "0.12", "filmic S-curve strength (0..1)"),
        ],
        min_args: 0,
        usage: "sepia [percentage] [midtoneCenter] [midtoneSigma] [highlightThreshold] [highlightSoftness] [curve]",
        description: "Apply Sepia tone with optional intensity and tonal controls.",
    },
    CommandSpec {
        name: "grayscale",
        args: &[],
        min_args: 0,
        usage: "grayscale",
        description: "Convert to luminance (Rec.709).",
    },
    CommandSpec {
        name: "edge",
        args: &[
            opt("sigma", Float, "0.0", "pre-blur sigma"),
            opt("scale", Float, "1.0", "edge scale multiplier"),
            opt("threshold", Float, "0.0", "threshold value"),
            opt("binary", Bool, "false", "binary output"),
        ],
        min_args: 0,
        usage: "edge [sigma] [scale] [threshold] [binary]",
        description: "Sobel-based edge detector with options.",
    },
    CommandSpec {
        name: "adaptiveBlur",
        args: &[
            opt("radius", Float, "1.0", "variance neighborhood radius"),
            opt("sigmaMin", Float, "0.5", "min sigma (for high variance)"),
            opt("sigmaMax", Float, "1.0", "max sigma (for low variance)"),
            opt("levels", Int, "6", "discrete levels to precompute"),
        ],
        min_args: 0,
        usage: "adaptiveBlur [radius] [sigmaMin] [sigmaMax] [levels]",
        description: "Variance-driven per-pixel adaptive blur.",
    },
    CommandSpec {
        name: "adaptiveResize",
        args: &[
            opt("width", Int, "0", "target width (0 = preserve aspect)"),
            opt("height", Int, "0", "target height (0 = preserve aspect)"),
            opt("a", Float, "3.0", "Lanczos window"),
        ],
        min_args: 0,
        usage: "adaptiveResize [width] [height] [a]",
        description: "Resize using Lanczos resampling with aspect-preserve semantics.",
    },
    CommandSpec {
        name: "adaptiveSharpen",
        args: &[
            opt("radius", Float, "0.0", "blur radius (0 = auto)"),
            opt("sigma", Float, "1.0", "sigma for blur"),
            opt("amount", Float, "1.0", "sharpen amount"),
        ],
        min_args: 0,
        usage: "adaptiveSharpen [radius] [sigma] [amount]",
        description: "Unsharp mask with an estimated sigma.",
    },
    CommandSpec {
        name: "adaptiveThreshold",
        args: &[
            opt("windowWidth", Int, "15", "local window width"),
            opt("windowHeight", Int, "15", "local window height"),
            opt("offset", Float, "0.0", "subtracted from the local mean"),
        ],
        min_args: 0,
        usage: "adaptiveThreshold [windowWidth] [windowHeight] [offset]",
        description: "Local threshold using moving window mean (bilevel output).",
    },
    CommandSpec {
        name: "sharpen",
        args: &[
            opt("sigma", Float, "1.0", "blur sigma"),
            opt("amount", Float, "1.0", "sharpen amount"),
            opt("threshold", Float, "0.0", "minimum difference to sharpen"),
        ],
        min_args: 0,
        usage: "sharpen [sigma] [amount] [threshold]",
        description: "Unsharp mask.",
    },
    CommandSpec {
        name: "addNoise",
        args: &[
            opt("type", Enum, "GAUSSIAN", "noise type (GAUSSIAN|UNIFORM|POISSON)"),
            opt("amount", Float, "10.0", "noise strength (stddev or range)"),
            opt("seed", Int, "0", "random seed (0 = fixed default)"),
        ],
        min_args: 0,
        usage: "addNoise [type] [amount] [seed]",
        description: "Add Gaussian, uniform or Poisson noise.",
    },
    CommandSpec {
        name: "crop",
        args: &[
            req("width", Int, "crop width"),
            req("height", Int, "crop height"),
            req("x", Int, "x offset"),
            req("y", Int, "y offset"),
        ],
        min_args: 4,
        usage: "crop <width> <height> <x> <y>",
        description: "Crop image (intersected with bounds).",
    },
    CommandSpec {
        name: "flip",
        args: &[],
        min_args: 0,
        usage: "flip",
        description: "Vertical flip.",
    },
    CommandSpec {
        name: "flop",
        args: &[],
        min_args: 0,
        usage: "flop",
        description: "Horizontal flip.",
    },
    CommandSpec {
        name: "posterize",
        args: &[req("levels", Int, "levels per channel")],
        min_args: 1,
        usage: "posterize <levels>",
        description: "Reduce each channel to evenly spaced levels.",
    },
    CommandSpec {
        name: "autoOrient",
        args: &[req("orientation", Int, "EXIF orientation 1..8")],
        min_args: 1,
        usage: "autoOrient <orientation>",
        description: "Apply the transform an EXIF orientation code implies.",
    },
    CommandSpec {
        name: "histogram",
        args: &[
            opt("bins", Int, "256", "number of bins"),
            opt("pixelWindow", Int, "20", "smoothing window in samples; larger zooms in"),
        ],
        min_args: 0,
        usage: "histogram [bins] [pixelWindow]",
        description: "Render a histogram image (returns image).",
    },
    CommandSpec {
        name: "equalize",
        args: &[],
        min_args: 0,
        usage: "equalize",
        description: "Equalize histogram per-channel.",
    },
    CommandSpec {
        name: "trim",
        args: &[req("fuzz", FloatOrPercent, "fuzz numeric or percent (e.g. 5 or 5%)")],
        min_args: 1,
        usage: "trim <fuzz>",
        description: "Trim borders within fuzz tolerance.",
    },
    CommandSpec {
        name: "floodfillPaint",
        args: &[
            req("fillColor", Color, "CSS color or hex (e.g. #ff0000)"),
            req("fuzz", FloatOrPercent, "Lab delta-E, or percent (e.g. 5 or 50%)"),
            opt("borderColor", Color, "", "border color, or empty string for none"),
            req("x", Int, "start x"),
            req("y", Int, "start y"),
            opt("invert", Bool, "false", "invert fill region"),
        ],
        min_args: 5,
        usage: "floodfillPaint <fillColor> <fuzz> <borderColor> <x> <y> [invert]",
        description: "Flood-fill region starting at (x,y) using perceptual fuzz (Lab delta-E).",
    },
    CommandSpec {
        name: "annotate",
        args: &[
            req("text", Text, "text to draw"),
            opt("fontPath", PathOrEmpty, "", "font path (ignored, bitmap font is used)"),
            req("size", Float, "font size"),
            req("x", Int, "x position"),
            req("y", Int, "baseline y position"),
            req("color", Color, "CSS hex or name (e.g. #ff0000)"),
        ],
        min_args: 5,
        usage: "annotate <text> [fontPath] <size> <x> <y> <color>",
        description: "Draw text; supports 5 or 6 args (font optional).",
    },
    CommandSpec {
        name: "composite",
        args: &[
            req("srcImagePath", Path, "path to source image"),
            req("operator", Text, "compose operator (e.g. OVER)"),
            req("x", Int, "x offset"),
            req("y", Int, "y offset"),
        ],
        min_args: 4,
        usage: "composite <srcImagePath> <operator> <x> <y>",
        description: "Composite an image loaded from disk at offset using operator.",
    },
    CommandSpec {
        name: "identify",
        args: &[],
        min_args: 0,
        usage: "identify",
        description: "Report image metadata; returns no image.",
    },
    CommandSpec {
        name: "strip",
        args: &[],
        min_args: 0,
        usage: "strip",
        description: "Strip metadata; returns image unchanged.",
    },
];

/// Look up a command by its exact name.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}
