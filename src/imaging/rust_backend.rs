//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` + `rav1d`, see [`avif`](super::avif) |
//! | Draw stretched | `image::imageops::resize` with `Lanczos3` |
//! | Encode → PNG | `PngEncoder`, adaptive filtering |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → WebP | `WebPEncoder::new_lossless` after channel quantization |
//! | Encode → AVIF | `AvifEncoder` (rav1e) |
//!
//! Every transform decodes the source from scratch into a value owned by the
//! call, draws onto a fresh RGBA surface, and encodes that surface. Nothing
//! is shared between calls except the read-only source bytes.

use super::avif;
use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend};
use super::params::{CompressParams, EncodedFormat, Quality, ResizeParams};
use crate::source::ImageSource;
use image::buffer::ConvertBuffer;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, RgbImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// An RGBA pixel grid that operations draw onto before encoding.
pub type Surface = RgbaImage;

/// Tunables for [`RustBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// rav1e speed preset, 1 (slowest) to 10 (fastest).
    pub avif_speed: u8,
    /// Largest surface, in pixels, that may be allocated.
    pub max_pixels: u64,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            avif_speed: 6,
            max_pixels: 100_000_000,
        }
    }
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-step mapping.
#[derive(Debug, Clone, Default)]
pub struct RustBackend {
    options: BackendOptions,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BackendOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> BackendOptions {
        self.options
    }
}

/// Identify the encoding of a produced buffer by its magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<EncodedFormat> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some(EncodedFormat::Png),
        image::ImageFormat::Jpeg => Some(EncodedFormat::Jpeg),
        image::ImageFormat::WebP => Some(EncodedFormat::WebP),
        image::ImageFormat::Avif => Some(EncodedFormat::Avif),
        _ => None,
    }
}

/// Decode the source completely.
fn load_image(source: &ImageSource) -> Result<DynamicImage, BackendError> {
    let bytes = source.bytes();
    if avif::is_avif(bytes) {
        return avif::decode(bytes);
    }
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(format!("{}: {e}", source.file_name())))?
        .decode()
        .map_err(|e| BackendError::Decode(format!("{}: {e}", source.file_name())))
}

/// Refuse surfaces that are empty or larger than the configured budget.
fn check_surface(dims: Dimensions, max_pixels: u64) -> Result<(), BackendError> {
    if !dims.is_valid() {
        return Err(BackendError::Surface(format!(
            "{}x{} has an empty axis",
            dims.width, dims.height
        )));
    }
    if dims.pixel_count() > max_pixels {
        return Err(BackendError::Surface(format!(
            "{}x{} exceeds the {max_pixels} pixel limit",
            dims.width, dims.height
        )));
    }
    Ok(())
}

/// Stretch the whole image over a `dims` surface. No cropping, no letterbox.
fn draw_stretched(img: &DynamicImage, dims: Dimensions) -> Surface {
    image::imageops::resize(img, dims.width, dims.height, FilterType::Lanczos3)
}

/// Draw the image 1:1 onto a surface of its natural size.
fn draw_natural(img: DynamicImage) -> Surface {
    img.into_rgba8()
}

/// Serialize a surface.
fn encode(
    surface: &Surface,
    format: EncodedFormat,
    quality: Quality,
    avif_speed: u8,
) -> Result<Vec<u8>, BackendError> {
    if !format.image_format().writing_enabled() {
        return Err(BackendError::EncodeUnsupported(format));
    }

    let (width, height) = surface.dimensions();
    let mut buf = Vec::new();
    let result = match format {
        EncodedFormat::Png => {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Default, PngFilter::Adaptive)
                .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
        EncodedFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb: RgbImage = surface.convert();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        }
        EncodedFormat::WebP => {
            let mut pixels = surface.as_raw().clone();
            quantize_for_webp(&mut pixels, quality);
            image::codecs::webp::WebPEncoder::new_lossless(&mut buf).write_image(
                &pixels,
                width,
                height,
                ExtendedColorType::Rgba8,
            )
        }
        EncodedFormat::Avif => image::codecs::avif::AvifEncoder::new_with_speed_quality(
            &mut buf,
            avif_speed,
            quality.value() as u8,
        )
        .write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8),
    };
    result.map_err(|e| BackendError::Encode(format!("{}: {e}", format.mime_type())))?;

    if buf.is_empty() {
        return Err(BackendError::Encode(format!(
            "{} encoder produced no output",
            format.mime_type()
        )));
    }
    Ok(buf)
}

/// Number of levels per color channel kept for a WebP quality.
///
/// Quadratic in the normalized factor so high qualities stay close to
/// lossless while low ones collapse to coarse palettes.
fn webp_levels(quality: Quality) -> u16 {
    if quality.value() >= 100 {
        return 256;
    }
    let f = quality.normalized();
    (2.0 + f * f * 254.0).round().clamp(2.0, 256.0) as u16
}

/// Snap RGB channels onto `webp_levels` evenly spaced values; alpha is kept.
///
/// The pure Rust WebP encoder is lossless only, so reducing the number of
/// distinct colors is what lets the quality factor shrink the output.
fn quantize_for_webp(rgba: &mut [u8], quality: Quality) {
    let levels = webp_levels(quality);
    if levels >= 256 {
        return;
    }
    let step = 255.0 / (levels as f32 - 1.0);
    for pixel in rgba.chunks_exact_mut(4) {
        for channel in &mut pixel[..3] {
            let bucket = (*channel as f32 / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &ImageSource) -> Result<Dimensions, BackendError> {
        let bytes = source.bytes();
        if avif::is_avif(bytes) {
            return avif::identify(bytes);
        }
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("{}: {e}", source.file_name())))?;
        Ok(Dimensions { width, height })
    }

    fn resize(
        &self,
        source: &ImageSource,
        params: &ResizeParams,
    ) -> Result<EncodedImage, BackendError> {
        check_surface(params.target, self.options.max_pixels)?;
        let img = load_image(source)?;
        debug!(
            from_w = img.width(),
            from_h = img.height(),
            to_w = params.target.width,
            to_h = params.target.height,
            "Stretching image onto surface"
        );
        let surface = draw_stretched(&img, params.target);
        drop(img);

        let data = encode(
            &surface,
            EncodedFormat::RESIZE,
            Quality::new(100),
            self.options.avif_speed,
        )?;
        Ok(EncodedImage {
            data,
            format: EncodedFormat::RESIZE,
            dimensions: params.target,
        })
    }

    fn compress(
        &self,
        source: &ImageSource,
        params: &CompressParams,
    ) -> Result<EncodedImage, BackendError> {
        let img = load_image(source)?;
        let natural = Dimensions {
            width: img.width(),
            height: img.height(),
        };
        check_surface(natural, self.options.max_pixels)?;
        let surface = draw_natural(img);

        let format = EncodedFormat::from(params.format);
        debug!(
            format = format.mime_type(),
            quality = params.quality.value(),
            "Encoding surface"
        );
        let data = encode(&surface, format, params.quality, self.options.avif_speed)?;
        Ok(EncodedImage {
            data,
            format,
            dimensions: natural,
        })
    }
}
