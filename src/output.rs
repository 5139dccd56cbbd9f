//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! cat.png
//!     Format: image/png
//!     Size: 1.5 MB
//!     Dimensions: 800x600
//!     Aspect ratio: 1.3333
//! ```
//!
//! ## Resize
//!
//! ```text
//! cat.png → cat-400x300.png
//!     Dimensions: 800x600 → 400x300
//!     Size: 118.27 KB
//! ```
//!
//! ## Compress
//!
//! ```text
//! cat.png → cat-compressed.webp
//!     Format: webp, quality 80
//!     Size: 96.4 KB (41% of original)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{AspectRatio, Dimensions, OutputFormat, Quality};
use crate::size::format_file_size;
use crate::source::ImageSource;
use crate::tools::SizeReport;
use serde::Serialize;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dims(d: Dimensions) -> String {
    format!("{}x{}", d.width, d.height)
}

/// What `info` reports about a source. Also the `--json` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub file_name: String,
    pub mime_type: Option<&'static str>,
    pub byte_size: u64,
    pub dimensions: Dimensions,
    pub aspect_ratio: Option<f64>,
}

impl ImageInfo {
    pub fn new(source: &ImageSource, dimensions: Dimensions) -> Self {
        Self {
            file_name: source.file_name().to_string(),
            mime_type: source.mime_type(),
            byte_size: source.byte_size(),
            dimensions,
            aspect_ratio: AspectRatio::of(dimensions).map(AspectRatio::value),
        }
    }
}

// ============================================================================
// Info
// ============================================================================

pub fn format_info(info: &ImageInfo) -> Vec<String> {
    let mut lines = vec![info.file_name.clone()];
    lines.push(format!(
        "{}Format: {}",
        indent(1),
        info.mime_type.unwrap_or("unknown")
    ));
    lines.push(format!(
        "{}Size: {}",
        indent(1),
        format_file_size(info.byte_size)
    ));
    lines.push(format!("{}Dimensions: {}", indent(1), dims(info.dimensions)));
    if let Some(ratio) = info.aspect_ratio {
        lines.push(format!("{}Aspect ratio: {:.4}", indent(1), ratio));
    }
    lines
}

pub fn print_info(info: &ImageInfo) {
    for line in format_info(info) {
        println!("{line}");
    }
}

// ============================================================================
// Resize
// ============================================================================

pub fn format_resize_result(
    source_name: &str,
    output_name: &str,
    original: Dimensions,
    resized: Dimensions,
    byte_size: u64,
) -> Vec<String> {
    vec![
        format!("{source_name} → {output_name}"),
        format!(
            "{}Dimensions: {} → {}",
            indent(1),
            dims(original),
            dims(resized)
        ),
        format!("{}Size: {}", indent(1), format_file_size(byte_size)),
    ]
}

pub fn print_resize_result(
    source_name: &str,
    output_name: &str,
    original: Dimensions,
    resized: Dimensions,
    byte_size: u64,
) {
    for line in format_resize_result(source_name, output_name, original, resized, byte_size) {
        println!("{line}");
    }
}

// ============================================================================
// Compress
// ============================================================================

pub fn format_compress_result(
    source_name: &str,
    output_name: &str,
    format: OutputFormat,
    quality: Quality,
    report: &SizeReport,
) -> Vec<String> {
    vec![
        format!("{source_name} → {output_name}"),
        format!(
            "{}Format: {}, quality {}",
            indent(1),
            format,
            quality.value()
        ),
        format!("{}Size: {}", indent(1), report),
    ]
}

pub fn print_compress_result(
    source_name: &str,
    output_name: &str,
    format: OutputFormat,
    quality: Quality,
    report: &SizeReport,
) {
    for line in format_compress_result(source_name, output_name, format, quality, report) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn info() -> ImageInfo {
        ImageInfo {
            file_name: "cat.png".into(),
            mime_type: Some("image/png"),
            byte_size: 1536,
            dimensions: d(800, 600),
            aspect_ratio: Some(800.0 / 600.0),
        }
    }

    #[test]
    fn info_lists_format_size_and_dimensions() {
        assert_eq!(format_info(&info()), vec![
            "cat.png",
            "    Format: image/png",
            "    Size: 1.5 KB",
            "    Dimensions: 800x600",
            "    Aspect ratio: 1.3333",
        ]);
    }

    #[test]
    fn info_unknown_mime_and_no_ratio() {
        let info = ImageInfo {
            mime_type: None,
            aspect_ratio: None,
            dimensions: d(0, 10),
            ..info()
        };
        let lines = format_info(&info);
        assert_eq!(lines[1], "    Format: unknown");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn info_from_source() {
        let source = ImageSource::from_bytes("dog.jpg", vec![0u8; 10]);
        let info = ImageInfo::new(&source, d(300, 150));
        assert_eq!(info.mime_type, Some("image/jpeg"));
        assert_eq!(info.byte_size, 10);
        assert_eq!(info.aspect_ratio, Some(2.0));
    }

    #[test]
    fn info_serializes_to_json() {
        let json = serde_json::to_value(info()).unwrap();
        assert_eq!(json["file_name"], "cat.png");
        assert_eq!(json["dimensions"]["width"], 800);
        assert_eq!(json["byte_size"], 1536);
    }

    #[test]
    fn resize_result_shows_before_and_after() {
        let lines = format_resize_result("cat.png", "cat-400x300.png", d(800, 600), d(400, 300), 2048);
        assert_eq!(lines, vec![
            "cat.png → cat-400x300.png",
            "    Dimensions: 800x600 → 400x300",
            "    Size: 2 KB",
        ]);
    }

    #[test]
    fn compress_result_shows_format_and_ratio() {
        let report = SizeReport {
            original: 4096,
            compressed: 1024,
            percent: Some(25),
        };
        let lines = format_compress_result(
            "cat.png",
            "cat-compressed.webp",
            OutputFormat::WebP,
            Quality::new(80),
            &report,
        );
        assert_eq!(lines, vec![
            "cat.png → cat-compressed.webp",
            "    Format: webp, quality 80",
            "    Size: 1 KB (25% of original)",
        ]);
    }
}
