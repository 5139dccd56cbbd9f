//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions`, `avif-parse` for AVIF |
//! | **Resize → PNG** | Lanczos3 stretch + `PngEncoder` |
//! | **Compress** | `JpegEncoder` / `WebPEncoder` / `AvifEncoder` at natural size |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for aspect-locked dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

mod avif;
pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
pub use calculations::{AspectRatio, on_height_change, on_lock_toggle, on_width_change};
pub use params::{
    CompressParams, EncodedFormat, OutputFormat, ParseFormatError, Quality, ResizeParams,
    TransformRequest,
};
pub use rust_backend::{BackendOptions, RustBackend, sniff_format};
