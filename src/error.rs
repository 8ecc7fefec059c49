// src/error.rs
//
// Unified error handling for raster-cmd
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: bad arguments or unknown commands, recoverable
// - CodecError: composite source could not be decoded
// - ResourceLimit: output dimension limits, unreadable files
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers driving the dispatcher.
///
/// - UserError: Invalid input, recoverable by user
/// - CodecError: Format/decoding issues
/// - ResourceLimit: Memory/dimension limits and I/O
/// - InternalBug: Library bugs (should not happen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/decoding issues
    CodecError,
    /// Memory/dimension limits and I/O
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// raster-cmd error types
///
/// Argument errors always carry the offending parameter name.
#[derive(Debug, Error)]
pub enum RasterError {
    // Argument Errors
    #[error("Invalid value for {name}: '{value}'. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("{command} expects {expected} argument(s), got {got}. Usage: {usage}")]
    ArgumentCount {
        command: Cow<'static, str>,
        expected: Cow<'static, str>,
        got: usize,
        usage: Cow<'static, str>,
    },

    #[error("Unsupported command: '{name}'")]
    UnsupportedCommand { name: Cow<'static, str> },

    // File I/O Errors (composite sources)
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u64, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Buffer construction
    #[error("Pixel storage of {len} bytes does not match {width}x{height} RGBA (expected {expected})")]
    InvalidBuffer {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

impl Clone for RasterError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::ArgumentCount {
                command,
                expected,
                got,
                usage,
            } => Self::ArgumentCount {
                command: command.clone(),
                expected: expected.clone(),
                got: *got,
                usage: usage.clone(),
            },
            Self::UnsupportedCommand { name } => Self::UnsupportedCommand { name: name.clone() },
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::InvalidBuffer {
                width,
                height,
                len,
                expected,
            } => Self::InvalidBuffer {
                width: *width,
                height: *height,
                len: *len,
                expected: *expected,
            },
            Self::Internal { message } => Self::Internal {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl RasterError {
    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn argument_count(
        command: impl Into<Cow<'static, str>>,
        expected: impl Into<Cow<'static, str>>,
        got: usize,
        usage: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ArgumentCount {
            command: command.into(),
            expected: expected.into(),
            got,
            usage: usage.into(),
        }
    }

    pub fn unsupported_command(name: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedCommand { name: name.into() }
    }

    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u64, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_buffer(width: u32, height: u32, len: usize) -> Self {
        Self::InvalidBuffer {
            width,
            height,
            len,
            expected: width as usize * height as usize * 4,
        }
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Name of the offending parameter for argument errors.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { name, .. } => Some(name.as_ref()),
            _ => None,
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable,
    /// CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. }
            | Self::ArgumentCount { .. }
            | Self::UnsupportedCommand { .. }
            | Self::FileNotFound { .. }
            | Self::InvalidBuffer { .. } => ErrorCategory::UserError,

            Self::DecodeFailed { .. } => ErrorCategory::CodecError,

            // FileReadFailed sits here: permissions, locks and exhausted handles
            // are environmental rather than malformed input.
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileReadFailed { .. } => ErrorCategory::ResourceLimit,

            Self::Internal { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, RasterError>;
