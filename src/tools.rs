//! The two user-facing tools: resize and compress.
//!
//! Each tool owns a [`Session`] over one source and turns edits into
//! pipeline requests. Edits return immediately; the result shows up once the
//! session settles.

use crate::config::Config;
use crate::imaging::{
    AspectRatio, Dimensions, ImageBackend, OutputFormat, Quality, TransformRequest,
    on_height_change, on_lock_toggle, on_width_change,
};
use crate::naming::{compressed_file_name, resized_file_name};
use crate::pipeline::{Pipeline, PipelineError, TransformResult};
use crate::session::{RequestToken, Session, SessionError};
use crate::size::{format_file_size, percent_of_original};
use crate::source::ImageSource;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("image has an empty axis ({0}x{1})")]
    EmptyImage(u32, u32),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no result to download yet")]
    NoResult,
}

/// Resize tool state: the target dimensions and the aspect lock.
pub struct ResizeTool<B> {
    session: Session<B>,
    original: Dimensions,
    ratio: AspectRatio,
    dimensions: Dimensions,
    locked: bool,
}

impl<B: ImageBackend + 'static> ResizeTool<B> {
    /// Identify the source and start at its natural size. Nothing is
    /// submitted until the dimensions change.
    pub fn open(
        pipeline: Arc<Pipeline<B>>,
        source: ImageSource,
        config: &Config,
    ) -> Result<Self, ToolError> {
        let original = pipeline.identify(&source)?;
        let ratio = AspectRatio::of(original)
            .ok_or(ToolError::EmptyImage(original.width, original.height))?;
        Ok(Self {
            session: Session::new(pipeline, source, config.debounce()),
            original,
            ratio,
            dimensions: original,
            locked: config.resize.lock_aspect_ratio,
        })
    }

    pub fn original(&self) -> Dimensions {
        self.original
    }

    pub fn ratio(&self) -> AspectRatio {
        self.ratio
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<B> {
        &mut self.session
    }

    pub fn set_width(&mut self, width: u32) -> Option<RequestToken> {
        self.dimensions = on_width_change(width, self.locked, self.ratio, self.dimensions);
        self.request()
    }

    pub fn set_height(&mut self, height: u32) -> Option<RequestToken> {
        self.dimensions = on_height_change(height, self.locked, self.ratio, self.dimensions);
        self.request()
    }

    pub fn set_lock(&mut self, locked: bool) -> Option<RequestToken> {
        self.dimensions = on_lock_toggle(locked, self.dimensions, self.ratio);
        self.locked = locked;
        self.request()
    }

    /// File name and bytes of the current result.
    pub fn download(&self) -> Result<(String, &TransformResult), ToolError> {
        let result = self.session.current().ok_or(ToolError::NoResult)?;
        let name = resized_file_name(self.session.source().file_name(), result.dimensions);
        Ok((name, result))
    }

    /// Whether the current dimensions call for a new image: `Ok(false)` at
    /// the natural size, an error when an axis is empty.
    pub fn needs_resize(&self) -> Result<bool, PipelineError> {
        let Dimensions { width, height } = self.dimensions;
        if !self.dimensions.is_valid() {
            return Err(PipelineError::InvalidDimensions { width, height });
        }
        Ok(self.dimensions != self.original)
    }

    /// Submit the current dimensions. When there is nothing to produce,
    /// earlier requests are withdrawn and their results dropped instead.
    fn request(&mut self) -> Option<RequestToken> {
        if !matches!(self.needs_resize(), Ok(true)) {
            self.session.clear();
            return None;
        }
        let dims = self.dimensions;
        Some(
            self.session
                .submit(TransformRequest::resize(dims.width, dims.height)),
        )
    }
}

/// Original vs compressed byte counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeReport {
    pub original: u64,
    pub compressed: u64,
    pub percent: Option<u32>,
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_file_size(self.compressed))?;
        if let Some(percent) = self.percent {
            write!(f, " ({percent}% of original)")?;
        }
        Ok(())
    }
}

/// Compress tool state: target format and quality.
pub struct CompressTool<B> {
    session: Session<B>,
    format: OutputFormat,
    quality: Quality,
}

impl<B: ImageBackend + 'static> CompressTool<B> {
    /// Open with the configured defaults and submit the first request.
    pub fn open(pipeline: Arc<Pipeline<B>>, source: ImageSource, config: &Config) -> Self {
        let mut tool = Self {
            session: Session::new(pipeline, source, config.debounce()),
            format: config.compress.format,
            quality: config.default_quality(),
        };
        tool.request();
        tool
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<B> {
        &mut self.session
    }

    pub fn set_format(&mut self, format: OutputFormat) -> RequestToken {
        self.format = format;
        self.request()
    }

    /// Out-of-range values are clamped to 1-100.
    pub fn set_quality(&mut self, quality: u32) -> RequestToken {
        self.quality = Quality::new(quality);
        self.request()
    }

    pub fn size_report(&self) -> Option<SizeReport> {
        let result = self.session.current()?;
        let original = self.session.source().byte_size();
        Some(SizeReport {
            original,
            compressed: result.byte_size,
            percent: percent_of_original(result.byte_size, original),
        })
    }

    pub fn download(&self) -> Result<(String, &TransformResult), ToolError> {
        let result = self.session.current().ok_or(ToolError::NoResult)?;
        let name = compressed_file_name(self.session.source().file_name(), result.format);
        Ok((name, result))
    }

    fn request(&mut self) -> RequestToken {
        self.session
            .submit(TransformRequest::compress(self.format, self.quality))
    }
}
