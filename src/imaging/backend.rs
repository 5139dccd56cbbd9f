//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: identify, resize, and compress. Backends take an
//! [`ImageSource`] and hand back an owned [`EncodedImage`]; they never touch
//! the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, no system
//! libraries. Tests use the `MockBackend` in this module's test submodule.

use super::params::{CompressParams, EncodedFormat, ResizeParams};
use crate::source::ImageSource;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("drawing surface unavailable: {0}")]
    Surface(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("no encoder available for {}", .0.mime_type())]
    EncodeUnsupported(EncodedFormat),
}

impl BackendError {
    /// Short machine-readable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Surface(_) => "surface",
            Self::Encode(_) => "encode",
            Self::EncodeUnsupported(_) => "encode_unsupported",
        }
    }
}

/// Pixel dimensions of an image or of a requested output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Both axes are positive.
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Bytes produced by a backend, with what they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodedFormat,
    pub dimensions: Dimensions,
}

/// Trait for image processing backends.
///
/// Implementations must be shareable across worker threads: the session runs
/// resize and compress requests for the same source concurrently.
pub trait ImageBackend: Send + Sync {
    /// Natural dimensions of the source.
    fn identify(&self, source: &ImageSource) -> Result<Dimensions, BackendError>;

    /// Decode, stretch onto a `target`-sized surface, encode losslessly.
    fn resize(
        &self,
        source: &ImageSource,
        params: &ResizeParams,
    ) -> Result<EncodedImage, BackendError>;

    /// Decode, draw at natural size, encode at the requested format and quality.
    fn compress(
        &self,
        source: &ImageSource,
        params: &CompressParams,
    ) -> Result<EncodedImage, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{OutputFormat, Quality};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock backend that records operations without touching pixels.
    ///
    /// Compress output is `quality` bytes long, so tests can tell which
    /// request a result came from by its size. Uses Mutex (not RefCell) so it
    /// is Sync and works from the rayon pool.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Mutex<Option<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Artificial latency per compress quality.
        pub compress_delays: Mutex<HashMap<u32, Duration>>,
        /// Artificial latency per resize target width.
        pub resize_delays: Mutex<HashMap<u32, Duration>>,
        /// When set, every transform fails with this error.
        pub failure: Mutex<Option<BackendError>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resize {
            width: u32,
            height: u32,
        },
        Compress {
            format: OutputFormat,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            let backend = Self::default();
            *backend.dimensions.lock().unwrap() = Some(Dimensions { width, height });
            backend
        }

        pub fn delay_compress(&self, quality: u32, delay: Duration) {
            self.compress_delays.lock().unwrap().insert(quality, delay);
        }

        pub fn delay_resize(&self, width: u32, delay: Duration) {
            self.resize_delays.lock().unwrap().insert(width, delay);
        }

        pub fn fail_with(&self, error: Option<BackendError>) {
            *self.failure.lock().unwrap() = error;
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<(), BackendError> {
            match self.failure.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, source: &ImageSource) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(source.file_name().to_string()));

            self.dimensions
                .lock()
                .unwrap()
                .ok_or_else(|| BackendError::Decode("No mock dimensions".to_string()))
        }

        fn resize(
            &self,
            _source: &ImageSource,
            params: &ResizeParams,
        ) -> Result<EncodedImage, BackendError> {
            let delay = self.resize_delays.lock().unwrap().get(&params.target.width).copied();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                width: params.target.width,
                height: params.target.height,
            });
            self.check_failure()?;

            Ok(EncodedImage {
                data: format!("{}x{}", params.target.width, params.target.height).into_bytes(),
                format: EncodedFormat::RESIZE,
                dimensions: params.target,
            })
        }

        fn compress(
            &self,
            _source: &ImageSource,
            params: &CompressParams,
        ) -> Result<EncodedImage, BackendError> {
            let delay = self
                .compress_delays
                .lock()
                .unwrap()
                .get(&params.quality.value())
                .copied();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            self.operations.lock().unwrap().push(RecordedOp::Compress {
                format: params.format,
                quality: params.quality.value(),
            });
            self.check_failure()?;

            let dimensions = self.dimensions.lock().unwrap().unwrap_or(Dimensions {
                width: 1,
                height: 1,
            });
            Ok(EncodedImage {
                data: vec![0u8; params.quality.value() as usize],
                format: params.format.into(),
                dimensions,
            })
        }
    }

    fn source() -> ImageSource {
        ImageSource::from_bytes("test.png", vec![0u8; 16])
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);

        let result = backend.identify(&source()).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "test.png"));
    }

    #[test]
    fn mock_records_resize() {
        let backend = MockBackend::new();

        let out = backend
            .resize(
                &source(),
                &ResizeParams {
                    target: Dimensions {
                        width: 400,
                        height: 300,
                    },
                },
            )
            .unwrap();
        assert_eq!(out.format, EncodedFormat::Png);

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Resize {
            width: 400,
            height: 300
        }]);
    }

    #[test]
    fn mock_compress_size_tracks_quality() {
        let backend = MockBackend::new();

        let out = backend
            .compress(
                &source(),
                &CompressParams {
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(42),
                },
            )
            .unwrap();
        assert_eq!(out.data.len(), 42);
        assert_eq!(out.format, EncodedFormat::Jpeg);
    }

    #[test]
    fn mock_failure_is_returned() {
        let backend = MockBackend::new();
        backend.fail_with(Some(BackendError::Surface("no memory".into())));

        let result = backend.compress(
            &source(),
            &CompressParams {
                format: OutputFormat::WebP,
                quality: Quality::default(),
            },
        );
        assert_eq!(result, Err(BackendError::Surface("no memory".into())));
    }

    #[test]
    fn error_kinds_are_distinct() {
        let kinds = [
            BackendError::Decode(String::new()).kind(),
            BackendError::Surface(String::new()).kind(),
            BackendError::Encode(String::new()).kind(),
            BackendError::EncodeUnsupported(EncodedFormat::Avif).kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn dimensions_validity() {
        assert!(Dimensions { width: 1, height: 1 }.is_valid());
        assert!(!Dimensions { width: 0, height: 1 }.is_valid());
        assert!(!Dimensions { width: 1, height: 0 }.is_valid());
        assert_eq!(
            Dimensions {
                width: 70_000,
                height: 70_000
            }
            .pixel_count(),
            4_900_000_000
        );
    }
}
