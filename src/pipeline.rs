//! The transform pipeline: resize and compress.
//!
//! [`Pipeline`] wraps an [`ImageBackend`] and is the only entry point the
//! rest of the crate uses to produce images. It adds three things on top of
//! the backend:
//!
//! - **Validation**: a request with an empty axis is rejected before any
//!   decoding happens.
//! - **Uniform failure**: callers see one [`PipelineError::ProcessingFailed`]
//!   per operation; the specific [`BackendError`] kind is logged and kept as
//!   the error source for diagnostics.
//! - **Owned results**: every success is a fresh [`TransformResult`]. The
//!   caller owns it; dropping it releases the bytes.
//!
//! Failures are never papered over with a default output and nothing is
//! retried.

use crate::imaging::{
    BackendError, CompressParams, Dimensions, EncodedFormat, EncodedImage, ImageBackend,
    OutputFormat, Quality, ResizeParams, TransformRequest,
};
use crate::source::ImageSource;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Which public operation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Identify,
    Resize,
    Compress,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identify => "identify",
            Self::Resize => "resize",
            Self::Compress => "compress",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid dimensions {width}x{height}: both axes must be positive")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("failed to {operation} image")]
    ProcessingFailed {
        operation: Operation,
        #[source]
        source: BackendError,
    },
}

impl PipelineError {
    /// The backend failure behind a processing error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::ProcessingFailed { source, .. } => Some(source),
            Self::InvalidDimensions { .. } => None,
        }
    }
}

/// An encoded image produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub data: Vec<u8>,
    pub format: EncodedFormat,
    pub dimensions: Dimensions,
    pub byte_size: u64,
}

impl From<EncodedImage> for TransformResult {
    fn from(encoded: EncodedImage) -> Self {
        Self {
            byte_size: encoded.data.len() as u64,
            data: encoded.data,
            format: encoded.format,
            dimensions: encoded.dimensions,
        }
    }
}

pub struct Pipeline<B> {
    backend: B,
}

impl<B: ImageBackend> Pipeline<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Natural dimensions of the source.
    pub fn identify(&self, source: &ImageSource) -> Result<Dimensions, PipelineError> {
        self.backend
            .identify(source)
            .map_err(|e| self.failed(Operation::Identify, source, e))
    }

    /// Stretch the source to exactly `width × height`, encoded as PNG.
    pub fn resize(
        &self,
        source: &ImageSource,
        width: u32,
        height: u32,
    ) -> Result<TransformResult, PipelineError> {
        let target = Dimensions { width, height };
        if !target.is_valid() {
            return Err(PipelineError::InvalidDimensions { width, height });
        }

        let encoded = self
            .backend
            .resize(source, &ResizeParams { target })
            .map_err(|e| self.failed(Operation::Resize, source, e))?;
        debug!(
            source = %source.uri(),
            width,
            height,
            bytes = encoded.data.len(),
            "Resized image"
        );
        Ok(encoded.into())
    }

    /// Re-encode the source at its natural size.
    pub fn compress(
        &self,
        source: &ImageSource,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<TransformResult, PipelineError> {
        let encoded = self
            .backend
            .compress(source, &CompressParams { format, quality })
            .map_err(|e| self.failed(Operation::Compress, source, e))?;
        debug!(
            source = %source.uri(),
            %format,
            quality = quality.value(),
            bytes = encoded.data.len(),
            "Compressed image"
        );
        Ok(encoded.into())
    }

    /// Dispatch a request to [`resize`](Self::resize) or [`compress`](Self::compress).
    pub fn run(
        &self,
        source: &ImageSource,
        request: &TransformRequest,
    ) -> Result<TransformResult, PipelineError> {
        match request {
            TransformRequest::Resize(params) => {
                self.resize(source, params.target.width, params.target.height)
            }
            TransformRequest::Compress(params) => {
                self.compress(source, params.format, params.quality)
            }
        }
    }

    fn failed(
        &self,
        operation: Operation,
        source: &ImageSource,
        error: BackendError,
    ) -> PipelineError {
        warn!(
            %operation,
            kind = error.kind(),
            source = %source.uri(),
            error = %error,
            "Image processing failed"
        );
        PipelineError::ProcessingFailed {
            operation,
            source: error,
        }
    }
}
