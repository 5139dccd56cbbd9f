//! # pixpress
//!
//! Resize and compress images, one source at a time.
//!
//! # Architecture
//!
//! ```text
//! ImageSource ──► Tool (ResizeTool / CompressTool)
//!                   │ edits → TransformRequest
//!                   ▼
//!                 Session ── rayon ──► Pipeline ──► ImageBackend
//!                   ▲                                   │
//!                   └──── latest result only ◄──────────┘
//! ```
//!
//! A source is decoded fresh for every request and never modified. Each tool
//! keeps exactly one current result; results of superseded requests are
//! dropped however late or early they arrive.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Immutable, shared source image bytes |
//! | [`imaging`] | Decode / draw / encode backend, request parameters, aspect-ratio math |
//! | [`pipeline`] | Validated resize and compress operations with uniform errors |
//! | [`session`] | Request tokens, debounce, stale-result suppression |
//! | [`tools`] | Resize and compress tool state driving a session |
//! | [`naming`] | Download file names |
//! | [`size`] | Human-readable byte counts |
//! | [`config`] | `pixpress.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding, with `rav1d` for AVIF decoding. No system image
//! libraries are needed.
//!
//! ## No Format Substitution
//!
//! A request for a format the encoder cannot produce fails. The output is
//! never silently swapped for another encoding.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod size;
pub mod source;
pub mod tools;
