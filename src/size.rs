//! Human-readable byte counts for size readouts.
//!
//! ```text
//! 0        → "0 Bytes"
//! 1536     → "1.5 KB"
//! 1048576  → "1 MB"
//! ```

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const STEP: f64 = 1024.0;

/// Format a byte count with the largest binary unit that keeps the value ≥ 1.
///
/// The value is rounded to two decimals and printed without trailing zeros.
/// Anything past gigabytes stays in `GB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    // Integer search rather than log(bytes)/log(1024): the float quotient
    // lands just under the next whole number for exact powers of 1024.
    let mut index = 0;
    while index < UNITS.len() - 1 && bytes >= 1u64 << (10 * (index + 1)) {
        index += 1;
    }

    let value = bytes as f64 / STEP.powi(index as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[index])
}

/// Size of a result as a whole percentage of the original.
///
/// Returns `None` when the original size is unknown (zero).
pub fn percent_of_original(result: u64, original: u64) -> Option<u32> {
    if original == 0 {
        return None;
    }
    Some((result as f64 / original as f64 * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_bytes() {
        assert_eq!(format_file_size(0), "0 Bytes");
    }

    #[test]
    fn small_values_stay_in_bytes() {
        assert_eq!(format_file_size(1), "1 Bytes");
        assert_eq!(format_file_size(1023), "1023 Bytes");
    }

    #[test]
    fn exact_kilobyte_has_no_decimals() {
        assert_eq!(format_file_size(1024), "1 KB");
    }

    #[test]
    fn fractional_kilobytes() {
        assert_eq!(format_file_size(1536), "1.5 KB");
        // 1152 / 1024 = 1.125 → rounds half up
        assert_eq!(format_file_size(1152), "1.13 KB");
    }

    #[test]
    fn megabytes_and_gigabytes() {
        assert_eq!(format_file_size(1_048_576), "1 MB");
        assert_eq!(format_file_size(5 * 1_048_576 + 524_288), "5.5 MB");
        assert_eq!(format_file_size(1_073_741_824), "1 GB");
    }

    #[test]
    fn terabytes_clamp_to_gigabytes() {
        assert_eq!(format_file_size(1_099_511_627_776), "1024 GB");
    }

    #[test]
    fn percent_rounds_to_whole_number() {
        assert_eq!(percent_of_original(50, 200), Some(25));
        assert_eq!(percent_of_original(1, 3), Some(33));
        assert_eq!(percent_of_original(300, 200), Some(150));
    }

    #[test]
    fn percent_of_unknown_original_is_none() {
        assert_eq!(percent_of_original(10, 0), None);
    }
}
