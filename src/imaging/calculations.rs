//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images. They
//! back the width/height controls of the resize tool: editing one axis while
//! the aspect ratio is locked recomputes the other.

use super::backend::Dimensions;

/// Width divided by height of the original image.
///
/// Computed once when a source is opened and held for the whole session, so
/// repeated edits never drift away from the source's proportions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio(f64);

impl AspectRatio {
    /// Ratio of the given dimensions. `None` if either axis is zero.
    pub fn of(dims: Dimensions) -> Option<Self> {
        if dims.width == 0 || dims.height == 0 {
            return None;
        }
        Some(Self(dims.width as f64 / dims.height as f64))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Round a computed axis to whole pixels, saturating into `u32`.
fn round_axis(value: f64) -> u32 {
    value.round() as u32
}

/// Apply a width edit.
///
/// # Arguments
/// * `new_width` - Width typed by the user (not validated here)
/// * `locked` - Whether the aspect ratio lock is engaged
/// * `ratio` - Original aspect ratio
/// * `current` - Dimensions before the edit
///
/// # Examples
/// ```
/// # use pixpress::imaging::{AspectRatio, Dimensions, on_width_change};
/// let ratio = AspectRatio::of(Dimensions { width: 800, height: 600 }).unwrap();
/// let current = Dimensions { width: 800, height: 600 };
/// assert_eq!(
///     on_width_change(400, true, ratio, current),
///     Dimensions { width: 400, height: 300 }
/// );
/// ```
pub fn on_width_change(
    new_width: u32,
    locked: bool,
    ratio: AspectRatio,
    current: Dimensions,
) -> Dimensions {
    let height = if locked {
        round_axis(new_width as f64 / ratio.value())
    } else {
        current.height
    };
    Dimensions {
        width: new_width,
        height,
    }
}

/// Apply a height edit. Mirror of [`on_width_change`].
pub fn on_height_change(
    new_height: u32,
    locked: bool,
    ratio: AspectRatio,
    current: Dimensions,
) -> Dimensions {
    let width = if locked {
        round_axis(new_height as f64 * ratio.value())
    } else {
        current.width
    };
    Dimensions {
        width,
        height: new_height,
    }
}

/// Apply a lock toggle.
///
/// Re-enabling the lock snaps the height back to the ratio, keeping the
/// current width. Disabling it leaves the dimensions alone.
pub fn on_lock_toggle(enabling: bool, current: Dimensions, ratio: AspectRatio) -> Dimensions {
    if enabling {
        Dimensions {
            width: current.width,
            height: round_axis(current.width as f64 / ratio.value()),
        }
    } else {
        current
    }
}
