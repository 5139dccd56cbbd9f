//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the [`pipeline`](crate::pipeline) (which decides what to
//! produce) and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`OutputFormat`] — The closed set of compress targets: WebP, JPEG, AVIF.
//! - [`EncodedFormat`] — Any encoding a result can carry, including the fixed PNG resize output.
//! - [`ResizeParams`] / [`CompressParams`] — One request each; [`TransformRequest`] is either.

use super::backend::Dimensions;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quality setting for lossy image encoding (1-100).
///
/// Only [`Quality::new`] builds one, so the value is always in range:
///
/// ```compile_fail
/// let q = pixpress::imaging::Quality(500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality mapped linearly onto `0.0..=1.0`.
    pub fn normalized(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported format '{0}' (expected webp, jpeg or avif)")]
pub struct ParseFormatError(pub String);

/// Target encoding for a compress request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::WebP, Self::Jpeg, Self::Avif];

    /// File extension, which is also the format's name on the command line.
    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        EncodedFormat::from(self).mime_type()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ParseFormatError;

    /// Accepts the bare name (`webp`) or the MIME type (`image/webp`).
    /// `jpg` is accepted as an alias for `jpeg`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("image/").unwrap_or(&lower);
        match name {
            "webp" => Ok(Self::WebP),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "avif" => Ok(Self::Avif),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

/// Encoding of a produced result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodedFormat {
    Png,
    WebP,
    Jpeg,
    Avif,
}

impl EncodedFormat {
    /// Resize output is always lossless PNG, whatever the input was.
    pub const RESIZE: EncodedFormat = EncodedFormat::Png;

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Avif => "image/avif",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Avif => ImageFormat::Avif,
        }
    }
}

impl From<OutputFormat> for EncodedFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::WebP => Self::WebP,
            OutputFormat::Jpeg => Self::Jpeg,
            OutputFormat::Avif => Self::Avif,
        }
    }
}

/// Parameters for a resize: stretch to exactly `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub target: Dimensions,
}

/// Parameters for a compress: re-encode at natural size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressParams {
    pub format: OutputFormat,
    pub quality: Quality,
}

/// One transform request issued against a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformRequest {
    Resize(ResizeParams),
    Compress(CompressParams),
}

impl TransformRequest {
    pub fn resize(width: u32, height: u32) -> Self {
        Self::Resize(ResizeParams {
            target: Dimensions { width, height },
        })
    }

    pub fn compress(format: OutputFormat, quality: Quality) -> Self {
        Self::Compress(CompressParams { format, quality })
    }
}
