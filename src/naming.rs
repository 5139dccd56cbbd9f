//! Output file names derived from the source file name.
//!
//! Every written file keeps the source's base name and appends what was done
//! to it:
//!
//! - `holiday.photo.jpg` compressed to WebP → `holiday.photo-compressed.webp`
//! - `holiday.jpg` resized to 400×300 → `holiday-400x300.png`
//!
//! Only the final extension segment is dropped; earlier dots stay part of the
//! base name.

use crate::imaging::{Dimensions, EncodedFormat};

/// The file name with its final `.ext` segment removed.
///
/// - `"photo.jpg"` → `"photo"`
/// - `"archive.tar.gz"` → `"archive.tar"`
/// - `"README"` → `"README"` (no extension, nothing removed)
/// - `".hidden"` → `""`
pub fn base_name(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((base, _ext)) => base,
        None => file_name,
    }
}

/// Name for a compressed copy: `<base>-compressed.<format>`.
pub fn compressed_file_name(file_name: &str, format: impl Into<EncodedFormat>) -> String {
    format!(
        "{}-compressed.{}",
        base_name(file_name),
        format.into().extension()
    )
}

/// Name for a resized copy: `<base>-<width>x<height>.<ext>`.
///
/// The extension is the one of the resize encoding, not the source's.
pub fn resized_file_name(file_name: &str, dims: Dimensions) -> String {
    format!(
        "{}-{}x{}.{}",
        base_name(file_name),
        dims.width,
        dims.height,
        EncodedFormat::RESIZE.extension()
    )
}
