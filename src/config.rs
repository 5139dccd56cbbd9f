//! Tool configuration.
//!
//! Handles loading, validating, and merging `pixpress.toml`. Stock defaults
//! are serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Keys
//!
//! ```toml
//! # Every key is optional; the values below are the defaults
//!
//! [compress]
//! format = "webp"           # webp | jpeg | avif
//! quality = 80              # 1-100
//! avif_speed = 6            # 1 (slowest, smallest) - 10 (fastest)
//!
//! [resize]
//! lock_aspect_ratio = true  # Start with the aspect ratio lock engaged
//!
//! [session]
//! debounce_ms = 500         # Wait this long for further edits before processing
//!
//! [limits]
//! max_pixels = 100000000    # Largest drawing surface, in pixels
//!
//! [processing]
//! max_processes = 4         # Worker cap (omit for one per CPU core)
//! ```
//!
//! Unknown keys are an error.

use crate::imaging::{BackendOptions, OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pixpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Validation(String),
}

/// Configuration loaded from `pixpress.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default target format and quality for the compress tool.
    pub compress: CompressConfig,
    /// Resize tool defaults.
    pub resize: ResizeConfig,
    /// Request handling.
    pub session: SessionConfig,
    /// Resource limits.
    pub limits: LimitsConfig,
    /// Worker pool size.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Reject out-of-range values that parsing alone lets through.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.compress.quality) {
            return Err(ConfigError::Validation(
                "compress.quality must be 1-100".into(),
            ));
        }
        if !(1..=10).contains(&self.compress.avif_speed) {
            return Err(ConfigError::Validation(
                "compress.avif_speed must be 1-10".into(),
            ));
        }
        if self.limits.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "limits.max_pixels must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            avif_speed: self.compress.avif_speed,
            max_pixels: self.limits.max_pixels,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.session.debounce_ms)
    }

    pub fn default_quality(&self) -> Quality {
        Quality::new(self.compress.quality)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    /// Format selected when the compress tool opens.
    pub format: OutputFormat,
    /// Quality selected when the compress tool opens (1 = worst, 100 = best).
    pub quality: u32,
    /// rav1e speed preset for AVIF output.
    pub avif_speed: u8,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::WebP,
            quality: 80,
            avif_speed: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub lock_aspect_ratio: bool,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            lock_aspect_ratio: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Quiet period after an edit before the request is processed.
    pub debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Surfaces above this many pixels are refused.
    pub max_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pixels: BackendOptions::default().max_pixels,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Worker cap for the rayon pool; absent means one per core.
    pub max_processes: Option<usize>,
}

/// Worker count: every core unless `max_processes` asks for fewer.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    match config.max_processes {
        Some(n) => n.clamp(1, cores),
        None => cores,
    }
}

// =============================================================================
// Layering: stock defaults, then the user's file
// =============================================================================

/// `Config::default()` as a TOML table, the layer user files sit on.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Lay `overlay` over `base`.
///
/// Tables merge key by key, recursing into nested tables; any other overlay
/// value wins outright. Base keys the overlay does not mention survive.
pub fn merge_toml(mut base: toml::Value, overlay: toml::Value) -> toml::Value {
    let toml::Value::Table(overlay_table) = overlay else {
        return overlay;
    };
    let Some(base_table) = base.as_table_mut() else {
        return toml::Value::Table(overlay_table);
    };
    for (key, value) in overlay_table {
        let layered = match base_table.remove(&key) {
            Some(under) => merge_toml(under, value),
            None => value,
        };
        base_table.insert(key, layered);
    }
    base
}

/// Parse a config file into an untyped table. A missing file is `None`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(toml::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Type-check and validate the layered value.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let layered = match overlay {
        Some(user) => merge_toml(base, user),
        None => base,
    };
    let config: Config = layered.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Stock defaults overridden by `path`, if it exists.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock `pixpress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixpress configuration
# ======================
# Every key is optional and shows its default. Unknown keys are an error.

# ---------------------------------------------------------------------------
# Compress tool
# ---------------------------------------------------------------------------
[compress]
# Output format: "webp", "jpeg" or "avif".
format = "webp"
# Encoding quality, 1 (smallest) to 100 (best).
quality = 80
# AVIF encoder speed, 1 (slowest, smallest files) to 10 (fastest).
avif_speed = 6

# ---------------------------------------------------------------------------
# Resize tool
# ---------------------------------------------------------------------------
[resize]
# Keep width/height proportional to the original while editing.
lock_aspect_ratio = true

# ---------------------------------------------------------------------------
# Request handling
# ---------------------------------------------------------------------------
[session]
# Milliseconds to wait for further edits before processing a request.
debounce_ms = 500

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest drawing surface, in pixels, that will be allocated.
max_pixels = 100000000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Worker cap; leave unset for one worker per CPU core.
# max_processes = 4
"##
}
